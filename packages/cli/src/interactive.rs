//! Interactive menu shown when no subcommand is given.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use crime_insight_analytics::EngineConfig;
use crime_insight_analytics::config::HourSplit;
use crime_insight_analytics::ensemble::DemographicProfile;
use crime_insight_analytics::jobs::{AnalyticsJob, Dataset};
use crime_insight_cli_utils::MultiProgress;
use crime_insight_incident_models::Gender;
use dialoguer::{Input, Select};

use crate::{CliError, execute, load_dataset};

enum Action {
    Report,
    Cities,
    Hours,
    CrimeTypes,
    Predict,
    Ensemble,
    Patterns,
    Trends,
    Anomalies,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Report,
        Self::Cities,
        Self::Hours,
        Self::CrimeTypes,
        Self::Predict,
        Self::Ensemble,
        Self::Patterns,
        Self::Trends,
        Self::Anomalies,
    ];

    const fn label(&self) -> &'static str {
        match self {
            Self::Report => "Full analysis report",
            Self::Cities => "City safety ratings",
            Self::Hours => "Hourly risk classification",
            Self::CrimeTypes => "Crime type breakdown",
            Self::Predict => "Predict (frequency model)",
            Self::Ensemble => "Predict (ensemble)",
            Self::Patterns => "Detect patterns",
            Self::Trends => "Half-year trends",
            Self::Anomalies => "Compare two exports for anomalies",
        }
    }
}

const GENDERS: &[(&str, Gender)] = &[
    ("Not specified", Gender::Unknown),
    ("Male", Gender::Male),
    ("Female", Gender::Female),
    ("Other", Gender::Other),
];

fn prompt_path(prompt: &str) -> Result<PathBuf, CliError> {
    let path: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(PathBuf::from(path.trim()))
}

fn prompt_city(dataset: &Dataset) -> Result<String, CliError> {
    let cities: Vec<&str> = dataset
        .records()
        .iter()
        .map(|record| record.city.trim())
        .filter(|city| !city.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if cities.is_empty() {
        return Ok(Input::new().with_prompt("City").interact_text()?);
    }

    let idx = Select::new()
        .with_prompt("City")
        .items(&cities)
        .default(0)
        .interact()?;
    Ok(cities[idx].to_string())
}

fn prompt_hour() -> Result<u8, CliError> {
    Ok(Input::new()
        .with_prompt("Hour of day (0-23)")
        .default(12u8)
        .validate_with(|hour: &u8| {
            if *hour < 24 {
                Ok(())
            } else {
                Err("hour must be between 0 and 23")
            }
        })
        .interact_text()?)
}

fn prompt_date() -> Result<NaiveDate, CliError> {
    let today = chrono::Local::now().date_naive();
    let raw: String = Input::new()
        .with_prompt("Date (YYYY-MM-DD)")
        .default(today.format("%Y-%m-%d").to_string())
        .interact_text()?;
    raw.trim()
        .parse()
        .map_err(|_| CliError::InvalidDate(raw.trim().to_string()))
}

fn prompt_profile() -> Result<DemographicProfile, CliError> {
    let age: String = Input::new()
        .with_prompt("Victim age (blank to skip)")
        .allow_empty(true)
        .interact_text()?;

    let labels: Vec<&str> = GENDERS.iter().map(|(label, _)| *label).collect();
    let idx = Select::new()
        .with_prompt("Victim gender")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(DemographicProfile {
        age: age.trim().parse().ok(),
        gender: GENDERS[idx].1,
    })
}

/// Prompts for an analysis and its inputs, then runs it.
///
/// # Errors
///
/// Returns [`CliError::Prompt`] if a prompt fails, plus the errors of
/// [`load_dataset`] and [`execute`].
pub async fn run(config: EngineConfig, multi: &MultiProgress) -> Result<(), CliError> {
    println!("Crime Insight");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to analyze?")
        .items(&labels)
        .default(0)
        .interact()?;

    let dataset = load_dataset(&prompt_path("Incident CSV export")?)?;
    let job = match Action::ALL[idx] {
        Action::Report => AnalyticsJob::FullReport { dataset },
        Action::Cities => AnalyticsJob::ScoreCities { dataset },
        Action::Hours => {
            let splits = ["Standard (10th / 90th)", "Wide (15th / 85th)"];
            let split = Select::new()
                .with_prompt("Percentile split")
                .items(&splits)
                .default(0)
                .interact()?;
            AnalyticsJob::ClassifyHours {
                dataset,
                split: Some(if split == 0 {
                    HourSplit::Standard
                } else {
                    HourSplit::Wide
                }),
            }
        }
        Action::CrimeTypes => AnalyticsJob::CrimeTypes { dataset },
        Action::Predict => {
            let city = prompt_city(&dataset)?;
            let hour = prompt_hour()?;
            AnalyticsJob::Predict {
                dataset,
                city,
                hour,
            }
        }
        Action::Ensemble => {
            let city = prompt_city(&dataset)?;
            let hour = prompt_hour()?;
            let date = prompt_date()?;
            let profile = prompt_profile()?;
            AnalyticsJob::Ensemble {
                dataset,
                city,
                hour,
                date,
                profile,
            }
        }
        Action::Patterns => AnalyticsJob::DetectPatterns { dataset },
        Action::Trends => AnalyticsJob::AnalyzeTrends { dataset },
        Action::Anomalies => {
            let baseline = load_dataset(&prompt_path("Baseline CSV export")?)?;
            AnalyticsJob::DetectAnomalies {
                current: dataset,
                baseline,
            }
        }
    };

    execute(config, job, multi).await
}
