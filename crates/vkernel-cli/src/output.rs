//! Formatted output helpers for CLI commands.

use chrono::{DateTime, Utc};

/// Formats a timestamp to the second, in UTC.
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
