#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crime insight analytics engine.
//!
//! Each subcommand loads one or two CSV exports, submits a single job to
//! the engine's worker pool, and prints the result as JSON. Running without
//! a subcommand opens an interactive menu. Set `RUST_LOG=debug` to see
//! per-task scheduling.

mod csv_source;
mod interactive;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use crime_insight_analytics::config::HourSplit;
use crime_insight_analytics::ensemble::DemographicProfile;
use crime_insight_analytics::jobs::{AnalyticsJob, Dataset};
use crime_insight_analytics::{AnalyticsEngine, AnalyticsError, EngineConfig};
use crime_insight_cli_utils::{MultiProgress, TaskProgress};
use crime_insight_incident_models::Gender;
use crime_insight_incident_models::parsing::parse_gender;
use thiserror::Error;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading an export failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An export's header row could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// A result could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// An interactive prompt failed.
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    /// The engine rejected its configuration or the job failed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    /// A date was not in `YYYY-MM-DD` form.
    #[error("Invalid date {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

#[derive(Parser)]
#[command(name = "crime_insight", about = "Crime incident analytics and prediction")]
struct Cli {
    /// Engine configuration file (TOML). Falls back to `CRIME_INSIGHT_CONFIG`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Number of worker units, overriding the configuration
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitArg {
    /// 10th / 90th percentile
    Standard,
    /// 15th / 85th percentile
    Wide,
}

impl From<SplitArg> for HourSplit {
    fn from(value: SplitArg) -> Self {
        match value {
            SplitArg::Standard => Self::Standard,
            SplitArg::Wide => Self::Wide,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Per-city totals, safety ratings, and risk levels
    Cities {
        /// Incident CSV export
        data: PathBuf,
    },
    /// Classify each hour of the day as high, medium, or low risk
    Hours {
        /// Incident CSV export
        data: PathBuf,
        /// Percentile split (defaults to the configured one)
        #[arg(long, value_enum)]
        split: Option<SplitArg>,
    },
    /// Per-crime-type counts and shares
    CrimeTypes {
        /// Incident CSV export
        data: PathBuf,
    },
    /// Frequency-based prediction for a city and hour
    Predict {
        /// Incident CSV export
        data: PathBuf,
        #[arg(long)]
        city: String,
        /// Hour of day (0-23)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: u8,
    },
    /// Ensemble of temporal, spatial, and demographic models
    Ensemble {
        /// Incident CSV export
        data: PathBuf,
        #[arg(long)]
        city: String,
        /// Hour of day (0-23)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: u8,
        /// Date to predict for (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Victim age
        #[arg(long)]
        age: Option<u8>,
        /// Victim gender (M, F, X)
        #[arg(long)]
        gender: Option<String>,
    },
    /// Compare the distributions of two exports
    Anomalies {
        /// Export to test
        current: PathBuf,
        /// Export to compare against
        baseline: PathBuf,
    },
    /// Weekend and summer pattern rules
    Patterns {
        /// Incident CSV export
        data: PathBuf,
    },
    /// First versus second half-year trends
    Trends {
        /// Incident CSV export
        data: PathBuf,
    },
    /// Full analysis report
    Report {
        /// Incident CSV export
        data: PathBuf,
    },
}

/// Reads a CSV export into a shareable [`Dataset`].
///
/// # Errors
///
/// See [`csv_source::load_records`].
pub fn load_dataset(path: &Path) -> Result<Dataset, CliError> {
    Ok(Dataset::new(csv_source::load_records(path)?))
}

fn demographic_profile(age: Option<u8>, gender: Option<&str>) -> DemographicProfile {
    DemographicProfile {
        age,
        gender: gender.map_or(Gender::Unknown, |g| parse_gender(g).unwrap_or(Gender::Unknown)),
    }
}

fn into_job(command: Commands) -> Result<AnalyticsJob, CliError> {
    Ok(match command {
        Commands::Cities { data } => AnalyticsJob::ScoreCities {
            dataset: load_dataset(&data)?,
        },
        Commands::Hours { data, split } => AnalyticsJob::ClassifyHours {
            dataset: load_dataset(&data)?,
            split: split.map(HourSplit::from),
        },
        Commands::CrimeTypes { data } => AnalyticsJob::CrimeTypes {
            dataset: load_dataset(&data)?,
        },
        Commands::Predict { data, city, hour } => AnalyticsJob::Predict {
            dataset: load_dataset(&data)?,
            city,
            hour,
        },
        Commands::Ensemble {
            data,
            city,
            hour,
            date,
            age,
            gender,
        } => AnalyticsJob::Ensemble {
            dataset: load_dataset(&data)?,
            city,
            hour,
            date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
            profile: demographic_profile(age, gender.as_deref()),
        },
        Commands::Anomalies { current, baseline } => AnalyticsJob::DetectAnomalies {
            current: load_dataset(&current)?,
            baseline: load_dataset(&baseline)?,
        },
        Commands::Patterns { data } => AnalyticsJob::DetectPatterns {
            dataset: load_dataset(&data)?,
        },
        Commands::Trends { data } => AnalyticsJob::AnalyzeTrends {
            dataset: load_dataset(&data)?,
        },
        Commands::Report { data } => AnalyticsJob::FullReport {
            dataset: load_dataset(&data)?,
        },
    })
}

/// Runs `job` on a fresh engine and prints its output as JSON.
///
/// # Errors
///
/// Returns [`CliError::Analytics`] if the engine cannot start or the job
/// fails, and [`CliError::Json`] if the output cannot be serialized.
pub async fn execute(
    config: EngineConfig,
    job: AnalyticsJob,
    multi: &MultiProgress,
) -> Result<(), CliError> {
    let engine = AnalyticsEngine::new(config)?;
    log::info!("Running {} on {} worker unit(s)", job.name(), engine.pool_size());

    let progress = TaskProgress::task_bar(multi, job.name());
    let result = engine.run(job, progress).await;
    engine.terminate().await;

    let json = serde_json::to_string_pretty(&result?)?;
    multi.suspend(|| println!("{json}"));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_insight_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = EngineConfig::resolve(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.pool.size = workers;
    }

    let Some(command) = cli.command else {
        return Ok(interactive::run(config, &multi).await?);
    };

    execute(config, into_job(command)?, &multi).await?;
    Ok(())
}
