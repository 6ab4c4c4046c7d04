use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

use crate::analysis::CandidateResult;
use crate::classifier::Rating;

// Rows fade from full brightness (rank 1) down to 40% at the bottom.
fn get_visibility_ratio(position: usize, rows: usize) -> f64 {
    if rows <= 1 {
        return 1.0;
    }
    let ratio = 1.0 - 0.6 * (position as f64 / (rows - 1) as f64);
    ratio.max(0.4)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d-%m-%Y %H:%M:%S").to_string()
}

fn rating_color(rating: Rating, ratio: f64) -> Color {
    let level = (255.0 * ratio) as u8;
    match rating {
        Rating::FourStar => Color::Rgb { r: level, g: level, b: 0 },
        Rating::ThreeStar => Color::Rgb { r: level, g: (180.0 * ratio) as u8, b: 0 },
        Rating::TwoStar => Color::DarkGrey,
    }
}

fn price_cell(value: f64) -> Cell {
    Cell::new(format!("{:.2}", value)).set_alignment(CellAlignment::Right)
}

/// Builds the ranked table; rows are shown in the order given, capped at `limit`.
pub fn build_table(rows: &[&CandidateResult], limit: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Symbol").add_attribute(Attribute::Bold),
            Cell::new("Rating").add_attribute(Attribute::Bold),
            Cell::new("Entry").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("Stop").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("Target 1").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("Target 2").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("RSI").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("Volume Power").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
        ]);

    let shown = rows.len().min(limit);
    for (i, row) in rows.iter().take(shown).enumerate() {
        let ratio = get_visibility_ratio(i, shown);
        let cyan_val = (255.0 * ratio) as u8;
        let green_val = (255.0 * ratio) as u8;

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&row.symbol).fg(Color::Rgb { r: 0, g: cyan_val, b: cyan_val }),
            Cell::new(row.rating.label()).fg(rating_color(row.rating, ratio)),
            price_cell(row.entry),
            price_cell(row.stop).fg(Color::Red),
            price_cell(row.target_1).fg(Color::Rgb { r: 0, g: green_val, b: 0 }),
            price_cell(row.target_2).fg(Color::Rgb { r: 0, g: green_val, b: 0 }),
            Cell::new(format!("{:.1}", row.rsi)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}x", row.volume_power)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Full printable block: title line with the scan time, then the table.
pub fn render(rows: &[&CandidateResult], scan_time: DateTime<Utc>, limit: usize) -> String {
    if rows.is_empty() {
        return "No candidates found.".to_string();
    }
    let title = format!("(Scan taken at {} UTC)", format_timestamp(scan_time));
    format!("\n{}\n{}", title, build_table(rows, limit))
}
