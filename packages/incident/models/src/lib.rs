#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident record types and shared taxonomy for the crime insight engine.
//!
//! An [`IncidentRecord`] is handed to the engine by an external ingestion
//! component. Dates, times, and ages arrive as the raw text of the source
//! export; the [`parsing`] module turns them into typed values and reports a
//! [`FieldDefect`] instead of failing when a field is malformed.

pub mod parsing;

use chrono::{Datelike as _, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Hour assigned to incidents whose time of occurrence cannot be parsed.
pub const DEFAULT_HOUR: u8 = 12;

/// Number of required fields scored for data quality: occurrence date,
/// occurrence time, victim age, victim gender, and crime type.
pub const REQUIRED_FIELD_COUNT: u32 = 5;

/// Substrings (lowercase) that mark a crime-type label as violent.
pub const VIOLENT_KEYWORDS: &[&str] = &[
    "assault",
    "robbery",
    "violence",
    "murder",
    "homicide",
    "kidnap",
    "rape",
    "shooting",
    "stabbing",
    "arson",
    "extortion",
];

/// Weapon labels (lowercase) that mean no weapon was involved.
const NO_WEAPON_LABELS: &[&str] = &["", "none", "no weapon", "unknown", "n/a", "na", "nil"];

/// A single reported incident as supplied by the ingestion layer.
///
/// Free-text temporal and demographic fields are kept verbatim so that the
/// index builder can apply its fallback policy in one place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Source report identifier.
    pub report_number: String,
    /// Date the incident was reported.
    pub date_reported: String,
    /// Date the incident occurred.
    pub date_occurred: String,
    /// Time of day the incident occurred.
    pub time_occurred: String,
    /// City the incident occurred in.
    pub city: String,
    /// Free-text crime-type label (e.g. "Burglary").
    pub crime_type: String,
    /// Source crime code.
    pub crime_code: String,
    /// Victim age as exported by the source.
    pub victim_age: String,
    /// Victim gender as exported by the source.
    pub victim_gender: String,
    /// Weapon label, empty when none was recorded.
    pub weapon: String,
    /// Whether the case has been closed.
    pub case_closed: bool,
    /// Date the case was closed, if any.
    pub date_case_closed: Option<String>,
}

impl IncidentRecord {
    /// Returns `true` if the crime-type label matches a violent keyword
    /// (case-insensitive substring match).
    #[must_use]
    pub fn is_violent(&self) -> bool {
        is_violent_crime(&self.crime_type)
    }

    /// Returns `true` if a weapon was recorded for this incident.
    #[must_use]
    pub fn involves_weapon(&self) -> bool {
        let label = self.weapon.trim().to_lowercase();
        !NO_WEAPON_LABELS.contains(&label.as_str())
    }
}

/// Returns `true` if `crime_type` contains any of [`VIOLENT_KEYWORDS`].
#[must_use]
pub fn is_violent_crime(crime_type: &str) -> bool {
    let lower = crime_type.to_lowercase();
    VIOLENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// A defect in a single field of an [`IncidentRecord`].
///
/// Defects never abort analysis. They select a fallback value and lower the
/// data-quality score of the owning city.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldDefect {
    /// The field was empty.
    #[error("Missing value")]
    MissingValue,

    /// The time of occurrence could not be parsed.
    #[error("Unparsable time: {value}")]
    UnparsableTime {
        /// The raw value.
        value: String,
    },

    /// A date could not be parsed.
    #[error("Unparsable date: {value}")]
    UnparsableDate {
        /// The raw value.
        value: String,
    },

    /// The victim age was not an integer.
    #[error("Unparsable age: {value}")]
    UnparsableAge {
        /// The raw value.
        value: String,
    },

    /// The victim age was outside 0-120.
    #[error("Age {age} out of range")]
    AgeOutOfRange {
        /// The parsed age.
        age: i64,
    },

    /// The victim gender was not a recognized code.
    #[error("Unknown gender: {value}")]
    UnknownGender {
        /// The raw value.
        value: String,
    },
}

/// Discrete risk classification shared by every analytics component.
///
/// `Critical` is only ever produced by predictions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Below the low percentile / safe rating band.
    Low,
    /// Between the cut points.
    Medium,
    /// Above the high percentile / unsafe rating band.
    High,
    /// Far above the high percentile with a strong probability.
    Critical,
}

impl RiskLevel {
    /// Returns the ordinal of this level (Low = 0 .. Critical = 3).
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Creates a level from its ordinal, saturating at `Critical`.
    #[must_use]
    pub const fn from_ordinal(value: u8) -> Self {
        match value {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Victim gender.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    /// Male victim.
    Male,
    /// Female victim.
    Female,
    /// Other / non-binary victim.
    Other,
    /// Not recorded or unrecognized.
    Unknown,
}

/// Victim age bands used by the demographic model and anomaly detection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeBand {
    /// 0-17
    Minor,
    /// 18-29
    YoungAdult,
    /// 30-44
    Adult,
    /// 45-59
    MiddleAged,
    /// 60 and over
    Senior,
}

impl AgeBand {
    /// Returns the band containing `age`.
    #[must_use]
    pub const fn from_age(age: u8) -> Self {
        match age {
            0..=17 => Self::Minor,
            18..=29 => Self::YoungAdult,
            30..=44 => Self::Adult,
            45..=59 => Self::MiddleAged,
            _ => Self::Senior,
        }
    }

    /// Returns the position of this band in [`Self::all`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Minor,
            Self::YoungAdult,
            Self::Adult,
            Self::MiddleAged,
            Self::Senior,
        ]
    }
}

/// Meteorological season of a calendar month (northern hemisphere).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    /// December-February
    Winter,
    /// March-May
    Spring,
    /// June-August
    Summer,
    /// September-November
    Autumn,
}

impl Season {
    /// Returns the season of a 1-based month. Out-of-range months map to
    /// `Winter`.
    #[must_use]
    pub const fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Autumn,
            _ => Self::Winter,
        }
    }

    /// Returns the season of `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }
}

/// Returns `true` for Saturday and Sunday.
#[must_use]
pub const fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violent_keywords_match_case_insensitively() {
        assert!(is_violent_crime("ASSAULT"));
        assert!(is_violent_crime("Armed Robbery"));
        assert!(is_violent_crime("Domestic Violence"));
        assert!(!is_violent_crime("Burglary"));
        assert!(!is_violent_crime(""));
    }

    #[test]
    fn weapon_involvement_ignores_placeholder_labels() {
        let mut record = IncidentRecord::default();
        assert!(!record.involves_weapon());
        record.weapon = "None".to_string();
        assert!(!record.involves_weapon());
        record.weapon = " unknown ".to_string();
        assert!(!record.involves_weapon());
        record.weapon = "Knife".to_string();
        assert!(record.involves_weapon());
    }

    #[test]
    fn risk_level_ordinal_roundtrip() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            assert_eq!(RiskLevel::from_ordinal(level.ordinal()), level);
        }
        assert_eq!(RiskLevel::from_ordinal(9), RiskLevel::Critical);
    }

    #[test]
    fn age_bands_cover_boundaries() {
        assert_eq!(AgeBand::from_age(0), AgeBand::Minor);
        assert_eq!(AgeBand::from_age(17), AgeBand::Minor);
        assert_eq!(AgeBand::from_age(18), AgeBand::YoungAdult);
        assert_eq!(AgeBand::from_age(44), AgeBand::Adult);
        assert_eq!(AgeBand::from_age(59), AgeBand::MiddleAged);
        assert_eq!(AgeBand::from_age(60), AgeBand::Senior);
        for (i, band) in AgeBand::all().iter().enumerate() {
            assert_eq!(band.index(), i);
        }
    }

    #[test]
    fn seasons_follow_months() {
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(7), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
    }

    #[test]
    fn risk_level_serializes_screaming_snake() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(RiskLevel::High.to_string(), "HIGH");
    }
}
