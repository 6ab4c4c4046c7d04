use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::analysis::{AnalysisConfig, DEFAULT_MIN_BARS, MIN_BARS_FLOOR};
use crate::bars::Interval;
use crate::classifier::{Rating, RatingFloor};
use crate::error::ScanError;
use crate::market_filter::MarketSegment;
use crate::ranking::ResultFilter;

// CONFIGURATION STRUCTS
// Loaded from storage/config.json; every field has a default so partial files work.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub segment: MarketSegment,
    pub symbols: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub lookback_days: u32,
    pub interval: Interval,
    /// Bars a symbol needs before it is evaluated. See [`DEFAULT_MIN_BARS`].
    pub min_bars: usize,
    pub max_concurrency: usize,
    pub requests_per_minute: u32,
    /// Deadline for the whole scan, not for single requests.
    pub timeout_secs: u64,
    /// Keep two-star candidates instead of discarding them.
    pub keep_two_star: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_days: 400,
            interval: Interval::Day1,
            min_bars: DEFAULT_MIN_BARS,
            max_concurrency: 8,
            requests_per_minute: 120,
            timeout_secs: 120,
            keep_two_star: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.min_bars < MIN_BARS_FLOOR {
            return Err(ScanError::InvalidMinBars {
                got: self.min_bars,
                floor: MIN_BARS_FLOOR,
            });
        }
        if self.max_concurrency == 0 {
            return Err(ScanError::InvalidConcurrency);
        }
        if self.timeout_secs == 0 {
            return Err(ScanError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookback_days) * 24 * 60 * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn analysis(&self) -> AnalysisConfig {
        let floor = if self.keep_two_star {
            Rating::TwoStar
        } else {
            Rating::ThreeStar
        };
        AnalysisConfig {
            min_bars: self.min_bars,
            rating_floor: RatingFloor(floor),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 900,
            max_entries: 512,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Only scan and show this market; all markets when absent.
    pub market: Option<String>,
    /// Show only this rating; every retained rating when absent.
    pub rating: Option<Rating>,
    pub limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            market: None,
            rating: None,
            limit: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub markets: BTreeMap<String, MarketConfig>,
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub display: DisplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut markets = BTreeMap::new();
        markets.insert(
            "saudi".to_string(),
            MarketConfig {
                segment: MarketSegment::LiquiditySensitive,
                symbols: ["2222.SR", "1120.SR", "2010.SR", "7010.SR", "1180.SR"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        );
        markets.insert(
            "usa".to_string(),
            MarketConfig {
                segment: MarketSegment::Unrestricted,
                symbols: ["AAPL", "MSFT", "NVDA", "AMZN", "META", "GOOGL", "TSLA", "AMD"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        );
        Self {
            log_level: "info".to_string(),
            markets,
            scan: ScanConfig::default(),
            cache: CacheConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Markets selected by `display.market`, or all of them.
    pub fn selected_markets(&self) -> Result<Vec<(&str, &MarketConfig)>, ScanError> {
        match &self.display.market {
            Some(name) => self
                .markets
                .get_key_value(name.as_str())
                .map(|(k, v)| vec![(k.as_str(), v)])
                .ok_or_else(|| ScanError::UnknownMarket(name.clone())),
            None => Ok(self.markets.iter().map(|(k, v)| (k.as_str(), v)).collect()),
        }
    }

    /// Table filter for the `display` section: the named market's segment, if
    /// any, and the requested rating.
    pub fn result_filter(&self) -> Result<ResultFilter, ScanError> {
        let segment = match &self.display.market {
            Some(name) => Some(
                self.markets
                    .get(name)
                    .map(|market| market.segment)
                    .ok_or_else(|| ScanError::UnknownMarket(name.clone()))?,
            ),
            None => None,
        };
        Ok(ResultFilter {
            segment,
            rating: self.display.rating,
        })
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the storage directory, e.g. ".../target/debug/storage"
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Storage directory next to the running executable, created if missing.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);
        Self::new(base_dir).await
    }

    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// Pretty JSON, written to a `.tmp` sibling then renamed into place so a
    /// crash mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json scans the bytes anyway, so skip the UTF-8 pass of read_to_string.
        let content = fs::read(self.path_for(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `filename`, or writes `T::default()` there first when it does not exist.
    pub async fn load_or_init<T>(&self, filename: &str) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        if !self.path_for(filename).exists() {
            let fresh = T::default();
            self.save(filename, &fresh).await?;
            return Ok(fresh);
        }
        self.load(filename).await
    }
}
