//! Output formatting for CLI commands

use serde::Serialize;

use crate::notification::{LogFormatter, NotificationRecord};

/// Format output as pretty JSON
pub fn format_output<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Render records as JSON or as numbered text
pub fn format_records(records: &[NotificationRecord], first_index: usize, json: bool) -> String {
    if json {
        format_output(&records)
    } else {
        LogFormatter::new()
            .with_max_body_chars(120)
            .format_log(records, first_index)
    }
}
