// Presentation formatting for record fields

use crate::record::Record;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Shown for missing, null or blank optional fields.
pub const PLACEHOLDER: &str = "N/A";

/// How one field is turned into a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFormat {
    Text,
    /// Locale date, `M/D/YYYY`.
    Date,
    /// Locale date and time, `M/D/YYYY, h:mm:ss AM`.
    DateTime,
    /// Boolean rendered as a status badge.
    Badge { on: String, off: String },
    /// Nested JSON rendered compactly.
    Json,
}

impl FieldFormat {
    pub fn status() -> Self {
        FieldFormat::Badge {
            on: "Active".to_string(),
            off: "Inactive".to_string(),
        }
    }
}

/// A formatted value, ready for any surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    Text { text: String },
    Badge { label: String, positive: bool },
    Placeholder,
}

impl Cell {
    pub fn text(&self) -> &str {
        match self {
            Cell::Text { text } => text,
            Cell::Badge { label, .. } => label,
            Cell::Placeholder => PLACEHOLDER,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

pub fn format_field(record: &Record, field: &str, format: &FieldFormat) -> Cell {
    if !record.is_present(field) {
        return Cell::Placeholder;
    }
    let Some(value) = record.get(field) else {
        return Cell::Placeholder;
    };

    match format {
        FieldFormat::Text => Cell::Text {
            text: scalar_text(value),
        },
        FieldFormat::Date => Cell::Text {
            text: value.as_str().map(format_date).unwrap_or_else(|| scalar_text(value)),
        },
        FieldFormat::DateTime => Cell::Text {
            text: value
                .as_str()
                .map(format_datetime)
                .unwrap_or_else(|| scalar_text(value)),
        },
        FieldFormat::Badge { on, off } => match record.flag(field) {
            Some(true) => Cell::Badge {
                label: on.clone(),
                positive: true,
            },
            Some(false) => Cell::Badge {
                label: off.clone(),
                positive: false,
            },
            None => Cell::Text {
                text: scalar_text(value),
            },
        },
        FieldFormat::Json => Cell::Text {
            text: value.to_string(),
        },
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Stamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    Day(NaiveDate),
}

fn parse_stamp(raw: &str) -> Option<Stamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Stamp::Zoned(dt));
    }
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(Stamp::Naive(dt));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(Stamp::Day)
}

/// `2024-01-05T10:00:00Z` -> `1/5/2024`. The date is taken in the
/// timestamp's own offset. Unparsable input is returned unchanged.
pub fn format_date(raw: &str) -> String {
    const PATTERN: &str = "%-m/%-d/%Y";
    match parse_stamp(raw) {
        Some(Stamp::Zoned(dt)) => dt.format(PATTERN).to_string(),
        Some(Stamp::Naive(dt)) => dt.format(PATTERN).to_string(),
        Some(Stamp::Day(d)) => d.format(PATTERN).to_string(),
        None => raw.to_string(),
    }
}

/// `2024-01-05T15:04:05Z` -> `1/5/2024, 3:04:05 PM`.
pub fn format_datetime(raw: &str) -> String {
    const PATTERN: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
    match parse_stamp(raw) {
        Some(Stamp::Zoned(dt)) => dt.format(PATTERN).to_string(),
        Some(Stamp::Naive(dt)) => dt.format(PATTERN).to_string(),
        Some(Stamp::Day(d)) => d.format("%-m/%-d/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// Cut to `max_len` characters with a trailing ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
