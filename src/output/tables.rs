use chrono::{DateTime, Utc};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::view::StageStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: StageStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        StageStatus::Success => cell.fg(TableColor::Green),
        StageStatus::Failed | StageStatus::Aborted => cell.fg(TableColor::Red),
        StageStatus::PausedPendingInput | StageStatus::Unstable => cell.fg(TableColor::Yellow),
        StageStatus::InProgress => cell.fg(TableColor::Cyan),
        StageStatus::NotStarted => cell.fg(TableColor::DarkGrey),
    }
}

/// Formats milliseconds as `1m 05s`, `12.3s` or `450ms`.
pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        #[allow(clippy::cast_precision_loss)]
        let seconds = millis as f64 / 1_000.0;
        format!("{seconds:.1}s")
    } else {
        let seconds = millis / 1_000;
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    }
}

/// Formats epoch milliseconds as a UTC wall-clock time; `-` when unset.
pub fn format_timestamp(millis: i64) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || "-".to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
