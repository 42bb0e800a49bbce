//! Value normalization against column metadata
//!
//! Values are coerced to the shape their column expects before they are
//! written. Malformed input never fails: integers and decimals that are not
//! numeric become null, and dates fall back to pattern extraction.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::column::{Column, TypeFamily};
use crate::value::FieldValue;

static DATE_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,4})(/|\.|-)(\d{2})(/|\.|-)(\d{2,4})").expect("valid date pattern")
});

static TIME_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}):(\d{2})(:(\d{2}))?").expect("valid time pattern"));

static BINARY_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[01]+$").expect("valid binary pattern"));

const DATE_TIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Storage format a date-family column expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTarget {
    Date,
    DateTime,
    Time,
    ShortYear,
    Year,
}

impl DateTarget {
    /// Target format for a column; full date-time for anything unrecognized
    pub fn for_column(column: &Column) -> Self {
        match column.family() {
            TypeFamily::Date => DateTarget::Date,
            TypeFamily::Time => DateTarget::Time,
            TypeFamily::Year if column.length() == Some("2") => DateTarget::ShortYear,
            TypeFamily::Year => DateTarget::Year,
            _ => DateTarget::DateTime,
        }
    }

    pub fn chrono_format(&self) -> &'static str {
        match self {
            DateTarget::Date => "%Y-%m-%d",
            DateTarget::DateTime => "%Y-%m-%d %H:%M:%S",
            DateTarget::Time => "%H:%M:%S",
            DateTarget::ShortYear => "%y",
            DateTarget::Year => "%Y",
        }
    }

    fn format(&self, value: &NaiveDateTime) -> String {
        value.format(self.chrono_format()).to_string()
    }

    fn assemble(&self, parts: &DateParts) -> String {
        match self {
            DateTarget::Date => format!("{}-{}-{}", parts.year, parts.month, parts.day),
            DateTarget::DateTime => format!(
                "{}-{}-{} {}:{}:{}",
                parts.year, parts.month, parts.day, parts.hour, parts.minute, parts.second
            ),
            DateTarget::Time => format!("{}:{}:{}", parts.hour, parts.minute, parts.second),
            DateTarget::ShortYear => parts.short_year.clone(),
            DateTarget::Year => parts.year.clone(),
        }
    }
}

struct DateParts {
    year: String,
    short_year: String,
    month: String,
    day: String,
    hour: String,
    minute: String,
    second: String,
}

impl DateParts {
    /// Pull date and time pieces out of free text, defaulting to the epoch
    fn extract(text: &str) -> Self {
        let mut parts = DateParts {
            year: "1970".to_string(),
            short_year: "70".to_string(),
            month: "01".to_string(),
            day: "01".to_string(),
            hour: "00".to_string(),
            minute: "00".to_string(),
            second: "00".to_string(),
        };

        if let Some(caps) = DATE_PARTS.captures(text) {
            let first = &caps[1];
            let last = &caps[5];
            let (mut year, day) = if first.len() > last.len() {
                (first.to_string(), last.to_string())
            } else {
                (last.to_string(), first.to_string())
            };
            if year.len() == 2 {
                let century = if year.parse::<u32>().unwrap_or(0) < 56 { "20" } else { "19" };
                year = format!("{}{}", century, year);
            }
            parts.short_year = year[year.len().saturating_sub(2)..].to_string();
            parts.year = year;
            parts.day = day;
            parts.month = caps[3].to_string();
        }

        if let Some(caps) = TIME_PARTS.captures(text) {
            parts.hour = caps[1].to_string();
            parts.minute = caps[2].to_string();
            if let Some(second) = caps.get(4) {
                parts.second = second.as_str().to_string();
            }
        }

        parts
    }
}

/// General-purpose date parser
///
/// Accepts ISO dates and date-times, RFC 3339, RFC 2822, common numeric and
/// month-name forms, a bare time of day (today), `now` and `today`. Zero
/// dates never parse, and neither do numeric forms whose year has fewer than
/// four digits; those are left to pattern extraction.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() || text.starts_with("0000-00-00") {
        return None;
    }

    match text.to_lowercase().as_str() {
        "now" => return Some(Utc::now().naive_utc()),
        "today" => return Utc::now().date_naive().and_hms_opt(0, 0, 0),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_utc());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .filter(|dt| dt.year() >= 1000)
        .or_else(|| {
            TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
                .map(|t| Utc::now().date_naive().and_time(t))
        })
}

/// Date value held by a field, when one can be derived
pub fn date_time_value(value: &FieldValue) -> Option<NaiveDateTime> {
    match value {
        FieldValue::DateTime(dt) => Some(*dt),
        FieldValue::Text(text) => parse_date_time(text),
        _ => None,
    }
}

/// Coerce any value into the storage format of a date-family column
pub fn coerce_date_time(column: &Column, value: &FieldValue) -> FieldValue {
    let target = DateTarget::for_column(column);

    let text = match value {
        FieldValue::DateTime(dt) => return FieldValue::Text(target.format(dt)),
        FieldValue::Int(timestamp) => match DateTime::from_timestamp(*timestamp, 0) {
            Some(dt) => return FieldValue::Text(target.format(&dt.naive_utc())),
            None => timestamp.to_string(),
        },
        other => other.render(),
    };

    match parse_date_time(&text) {
        Some(dt) => FieldValue::Text(target.format(&dt)),
        None => FieldValue::Text(target.assemble(&DateParts::extract(&text))),
    }
}

/// Normalize a value for its column
///
/// Fields with no column are nulled. Null values stay null.
pub fn normalize_field(column: Option<&Column>, value: FieldValue) -> FieldValue {
    let Some(column) = column else {
        return FieldValue::Null;
    };
    if value.is_null() {
        return value;
    }

    match column.family() {
        TypeFamily::Date | TypeFamily::DateTime | TypeFamily::Time | TypeFamily::Year => {
            coerce_date_time(column, &value)
        }
        TypeFamily::Bit => FieldValue::Text(format!("{:b}", value.to_int_lossy().unsigned_abs())),
        TypeFamily::Enum if column.is_boolean() => {
            FieldValue::from(if value.is_truthy() { "1" } else { "0" })
        }
        TypeFamily::Integer => match value.as_f64() {
            Some(n) => FieldValue::Int(n.round() as i64),
            None => FieldValue::Null,
        },
        TypeFamily::Decimal => match value.as_f64() {
            Some(n) => FieldValue::Float(n),
            None => FieldValue::Null,
        },
        _ => value,
    }
}

/// Value bound for a normalized field
pub fn bind_value(column: &Column, value: &FieldValue) -> FieldValue {
    match column.family() {
        TypeFamily::Integer => FieldValue::Int(value.to_int_lossy()),
        TypeFamily::Decimal => FieldValue::Float(value.as_f64().unwrap_or(0.0)),
        TypeFamily::Bit => match value {
            // Normalized BIT text is base 2; anything else binds as its decimal value.
            FieldValue::Text(text) if BINARY_DIGITS.is_match(text.trim()) => i64::from_str_radix(text.trim(), 2)
                .map(FieldValue::Int)
                .unwrap_or_else(|_| FieldValue::Int(value.to_int_lossy())),
            other => FieldValue::Int(other.to_int_lossy()),
        },
        _ => value.clone(),
    }
}
