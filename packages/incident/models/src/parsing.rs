//! Field parsers for raw incident exports.
//!
//! Every parser returns `Result<_, FieldDefect>` so the caller decides the
//! fallback. None of them panic on malformed input.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike as _};

use crate::{FieldDefect, Gender};

const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d", "%m/%d/%Y"];

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parses the hour of day (0-23) from a time or date-time string.
///
/// A bare integer in 0-23 is accepted as an hour.
///
/// # Errors
///
/// Returns [`FieldDefect::MissingValue`] for blank input and
/// [`FieldDefect::UnparsableTime`] when no known format matches.
pub fn parse_hour(raw: &str) -> Result<u8, FieldDefect> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FieldDefect::MissingValue);
    }

    let time = parse_datetime(s).map(|dt| dt.time()).or_else(|| {
        TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
    });

    if let Some(time) = time {
        return u8::try_from(time.hour()).map_err(|_| FieldDefect::UnparsableTime {
            value: s.to_string(),
        });
    }

    match s.parse::<u8>() {
        Ok(hour) if hour < 24 => Ok(hour),
        _ => Err(FieldDefect::UnparsableTime {
            value: s.to_string(),
        }),
    }
}

/// Parses a calendar date, accepting date-only and date-time forms.
///
/// # Errors
///
/// Returns [`FieldDefect::MissingValue`] for blank input and
/// [`FieldDefect::UnparsableDate`] when no known format matches.
pub fn parse_date(raw: &str) -> Result<NaiveDate, FieldDefect> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FieldDefect::MissingValue);
    }

    if let Some(dt) = parse_datetime(s) {
        return Ok(dt.date());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| FieldDefect::UnparsableDate {
            value: s.to_string(),
        })
}

/// Combines an occurrence date with an occurrence time.
///
/// The time field wins when it parses; otherwise the time embedded in the
/// date field (or midnight) is used.
///
/// # Errors
///
/// Returns the date's [`FieldDefect`] when the date cannot be parsed.
pub fn parse_occurrence(date: &str, time: &str) -> Result<NaiveDateTime, FieldDefect> {
    let day = parse_date(date)?;
    let embedded = parse_datetime(date.trim()).map_or(NaiveTime::MIN, |dt| dt.time());

    let t = time.trim();
    let time = parse_datetime(t)
        .map(|dt| dt.time())
        .or_else(|| {
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(t, fmt).ok())
        })
        .unwrap_or(embedded);

    Ok(day.and_time(time))
}

/// Parses a victim age in 0-120.
///
/// # Errors
///
/// Returns [`FieldDefect::UnparsableAge`] for non-integers and
/// [`FieldDefect::AgeOutOfRange`] outside 0-120.
pub fn parse_age(raw: &str) -> Result<u8, FieldDefect> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FieldDefect::MissingValue);
    }
    let age: i64 = s.parse().map_err(|_| FieldDefect::UnparsableAge {
        value: s.to_string(),
    })?;
    if !(0..=120).contains(&age) {
        return Err(FieldDefect::AgeOutOfRange { age });
    }
    u8::try_from(age).map_err(|_| FieldDefect::AgeOutOfRange { age })
}

/// Parses a victim gender code.
///
/// # Errors
///
/// Returns [`FieldDefect::MissingValue`] for blank input and
/// [`FieldDefect::UnknownGender`] for unrecognized codes.
pub fn parse_gender(raw: &str) -> Result<Gender, FieldDefect> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FieldDefect::MissingValue);
    }
    match s.to_lowercase().as_str() {
        "m" | "male" => Ok(Gender::Male),
        "f" | "female" => Ok(Gender::Female),
        "x" | "other" | "non-binary" => Ok(Gender::Other),
        _ => Err(FieldDefect::UnknownGender {
            value: s.to_string(),
        }),
    }
}
