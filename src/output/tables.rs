use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(success: bool) -> Cell {
    if success {
        Cell::new("✓").fg(TableColor::Green)
    } else {
        Cell::new("✗").fg(TableColor::Red)
    }
}

/// Cell for an env key; artifacts without one are shown as `-`.
pub fn env_key_cell(env_key: &str) -> Cell {
    if env_key.is_empty() {
        Cell::new("-").fg(TableColor::DarkGrey)
    } else {
        Cell::new(env_key).fg(TableColor::Yellow)
    }
}
