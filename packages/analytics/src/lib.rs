#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analytics and prediction engine for incident records.
//!
//! The engine builds a [`index::RecordIndex`] over an incident set in a
//! single pass and derives everything else from it: city safety ratings and
//! percentile-based hour classifications ([`risk`]), frequency-based
//! predictions ([`predict`]), a three-model heuristic ensemble with
//! anomaly and pattern detection ([`ensemble`], [`anomaly`], [`patterns`]).
//!
//! Heavy work runs on a background worker pool through [`jobs`]; the
//! [`engine::AnalyticsEngine`] context object owns that pool.

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod ensemble;
pub mod index;
pub mod jobs;
pub mod patterns;
pub mod predict;
pub mod risk;

use thiserror::Error;

pub use config::EngineConfig;
pub use engine::AnalyticsEngine;
pub use index::RecordIndex;

/// Errors that can occur while configuring or driving the engine.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Configuration failed validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration file was not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool rejected or failed a job.
    #[error("Task error: {0}")]
    Task(#[from] crime_insight_worker::TaskError),

    /// The worker pool no longer accepts work.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] crime_insight_worker::SchedulerError),

    /// A job returned a result of an unexpected kind.
    #[error("Unexpected job output: expected {expected}")]
    UnexpectedOutput {
        /// The output kind the caller asked for.
        expected: &'static str,
    },
}

#[cfg(test)]
pub(crate) mod test_support {
    use crime_insight_incident_models::IncidentRecord;

    /// Builds a fully well-formed record.
    pub fn record(city: &str, crime_type: &str, date: &str, time: &str) -> IncidentRecord {
        IncidentRecord {
            report_number: format!("{city}-{date}-{time}"),
            date_reported: date.to_string(),
            date_occurred: date.to_string(),
            time_occurred: time.to_string(),
            city: city.to_string(),
            crime_type: crime_type.to_string(),
            crime_code: "100".to_string(),
            victim_age: "30".to_string(),
            victim_gender: "M".to_string(),
            weapon: "None".to_string(),
            case_closed: false,
            date_case_closed: None,
        }
    }

    /// Builds a well-formed record at `hour` on 2023-03-15 (a Wednesday).
    pub fn at_hour(city: &str, crime_type: &str, hour: u8) -> IncidentRecord {
        record(city, crime_type, "2023-03-15", &format!("{hour:02}:00"))
    }
}
