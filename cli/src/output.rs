//! Table and text formatting helpers for CLI output.

use a3s_store_runtime::RemovalReport;
use comfy_table::{ContentArrangement, Table};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a chrono timestamp as a relative "ago" string.
pub fn format_ago(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let duration = chrono::Utc::now().signed_duration_since(*dt);

    let secs = duration.num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    if secs < 60 {
        return format!("{secs} seconds ago");
    }

    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{mins} minutes ago");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours} hours ago");
    }

    let days = duration.num_days();
    if days < 30 {
        return format!("{days} days ago");
    }
    if days < 365 {
        return format!("{} months ago", days / 30);
    }

    format!("{} years ago", days / 365)
}

/// Lines printed for a removal report: untags first, then deletions.
///
/// Empty deleted entries are skipped.
pub fn removal_lines(report: &RemovalReport) -> Vec<String> {
    let untagged = report.untagged.iter().map(|name| format!("Untagged: {name}"));
    let deleted = report
        .deleted
        .iter()
        .filter(|digest| !digest.is_empty())
        .map(|digest| format!("Deleted: {digest}"));
    untagged.chain(deleted).collect()
}
