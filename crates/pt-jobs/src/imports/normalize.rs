//! Total conversions from raw cell text to canonical typed values.
//!
//! None of these fail: input that cannot be understood yields the caller's
//! declared default so one malformed cell never aborts a batch.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::headers::is_blank;
use crate::records::Amount;

const TRUTHY: &[&str] = &["1", "true", "y", "yes", "on"];
const FALSY: &[&str] = &["0", "false", "n", "no", "off"];
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%m/%d/%Y"];

/// How a choice table compares raw input against its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceMatch {
    /// Normalized input must equal a key.
    Exact,
    /// First key (in table order) contained in the normalized input wins.
    Contains,
}

/// Literal value aliases collapsing onto canonical codes.
#[derive(Debug)]
pub struct ChoiceTable {
    pub pairs: &'static [(&'static str, &'static str)],
    pub matching: ChoiceMatch,
}

impl ChoiceTable {
    pub const fn exact(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            pairs,
            matching: ChoiceMatch::Exact,
        }
    }

    pub const fn contains(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            pairs,
            matching: ChoiceMatch::Contains,
        }
    }
}

/// Date or timestamp recovered from a loosely formatted cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ParsedDate {
    pub fn date(self) -> NaiveDate {
        match self {
            ParsedDate::Date(date) => date,
            ParsedDate::DateTime(at) => at.date(),
        }
    }

    /// Timestamps pass through; bare dates land at noon.
    pub fn at_noon(self) -> NaiveDateTime {
        match self {
            ParsedDate::Date(date) => date.and_hms_opt(12, 0, 0).unwrap_or_default(),
            ParsedDate::DateTime(at) => at,
        }
    }
}

pub fn to_boolean(raw: &str, default: bool) -> bool {
    let value = raw.trim().to_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        true
    } else if FALSY.contains(&value.as_str()) {
        false
    } else {
        default
    }
}

/// Integer with thousands separators and whitespace removed. Integral decimal
/// spellings such as `12.0` are accepted and truncate toward zero.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(value);
    }

    let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
    let truncated = value.trunc();
    if truncated.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

pub fn to_integer(raw: &str, default: i64) -> i64 {
    parse_integer(raw).unwrap_or(default)
}

/// Fixed-point amount with currency symbols and thousands separators removed.
/// Blank or unparseable input has no value rather than zero.
pub fn to_decimal(raw: &str) -> Option<Amount> {
    if is_blank(raw) {
        return None;
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    Amount::parse(&cleaned)
}

pub fn to_enumerated(
    raw: &str,
    table: &ChoiceTable,
    default: Option<&'static str>,
) -> Option<&'static str> {
    let value = normalize_choice(raw);
    if value.is_empty() {
        return default;
    }

    let hit = match table.matching {
        ChoiceMatch::Exact => table
            .pairs
            .iter()
            .find(|(key, _)| normalize_choice(key) == value),
        ChoiceMatch::Contains => table.pairs.iter().find(|(key, _)| {
            let key = normalize_choice(key);
            !key.is_empty() && value.contains(&key)
        }),
    };

    hit.map(|(_, code)| *code).or(default)
}

fn normalize_choice(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Try the known timestamp and date layouts in order; the first that parses wins.
/// A trailing `Z` is read as an explicit `+00:00` offset and converted to UTC.
pub fn to_date(raw: &str) -> Option<ParsedDate> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return None;
    }

    let offset_form = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(stem) => format!("{stem}+00:00"),
        None => trimmed.to_string(),
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(&offset_form) {
        return Some(ParsedDate::DateTime(at.naive_utc()));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(ParsedDate::DateTime)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
                .map(ParsedDate::Date)
        })
}

/// Split a combined name into (given names, family name).
pub fn split_full_name(raw: &str) -> (String, String) {
    let mut parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.len() {
        0 => (String::new(), String::new()),
        1 => (parts[0].to_string(), String::new()),
        _ => {
            let last = parts.pop().unwrap_or_default().to_string();
            (parts.join(" "), last)
        }
    }
}

/// Cut `raw` to at most `max_length` characters. The flag reports whether
/// anything was removed.
pub fn truncate_to_limit(raw: &str, max_length: Option<usize>) -> (String, bool) {
    match max_length {
        Some(limit) if raw.chars().count() > limit => (raw.chars().take(limit).collect(), true),
        _ => (raw.to_string(), false),
    }
}
