//! On-disk format of a group's contact list.
//!
//! ```text
//! # INC Party Contacts
//! # Total: 2
//! # Last updated: 10/19/2026, 3:04:05 PM
//!
//! 919876543210
//! 918765432109
//! ```
//!
//! Identifiers are written without their domain suffix and joined by `\n`
//! with no trailing newline. On read, blank lines and `#` lines are skipped.

use chrono::{DateTime, TimeZone};

use super::{Group, RecipientId};

/// Marker that starts a comment line.
pub const COMMENT_MARKER: char = '#';

/// Timestamp layout of the `Last updated` header (US locale style).
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Format a header timestamp, e.g. `10/19/2026, 3:04:05 PM`.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a full group file.
pub fn render<'a, I>(group: Group, members: I, updated_at: &str) -> String
where
    I: IntoIterator<Item = &'a RecipientId>,
{
    let bare: Vec<&str> = members.into_iter().map(RecipientId::bare).collect();
    format!(
        "{COMMENT_MARKER} {group} Party Contacts\n{COMMENT_MARKER} Total: {}\n{COMMENT_MARKER} Last updated: {updated_at}\n\n{}",
        bare.len(),
        bare.join("\n")
    )
}

/// Extract raw identifier lines from a group file.
pub fn parse(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .collect()
}
