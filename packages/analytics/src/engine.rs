//! Context object tying the analytics executor to a worker pool.

use std::sync::Arc;

use chrono::NaiveDate;
use crime_insight_analytics_models::{
    AnalysisReport, Anomaly, CityStats, CrimeTypeStats, EnsemblePrediction, HourRisk, Pattern,
    Prediction, TrendReport,
};
use crime_insight_worker::{PoolStats, ProgressCallback, TaskHandle, WorkerPool, null_progress};

use crate::AnalyticsError;
use crate::config::{EngineConfig, HourSplit};
use crate::ensemble::DemographicProfile;
use crate::jobs::{AnalyticsExecutor, AnalyticsJob, AnalyticsOutput, Dataset};

/// Owns the worker pool that runs analytics jobs.
///
/// Construct one per process (or per test) and pass it where needed.
pub struct AnalyticsEngine {
    config: Arc<EngineConfig>,
    pool: WorkerPool<AnalyticsExecutor>,
}

impl AnalyticsEngine {
    /// Validates `config` and starts the pool.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Config`] if `config` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let config = Arc::new(config);
        let pool = WorkerPool::new(AnalyticsExecutor::new(Arc::clone(&config)), &config.pool);
        Ok(Self { config, pool })
    }

    /// The validated configuration shared with every execution unit.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of execution units.
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Submits a job and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Scheduler`] after [`Self::terminate`].
    pub fn submit(&self, job: AnalyticsJob) -> Result<TaskHandle<AnalyticsOutput>, AnalyticsError> {
        log::debug!("Submitting {} job", job.name());
        Ok(self.pool.submit(job)?)
    }

    /// Submits a job and waits for it, forwarding progress.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Scheduler`] if the pool is terminated and
    /// [`AnalyticsError::Task`] if the task fails.
    pub async fn run(
        &self,
        job: AnalyticsJob,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<AnalyticsOutput, AnalyticsError> {
        Ok(self.submit(job)?.watch(progress).await?)
    }

    /// Snapshot of idle, busy and queued counts.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Scheduler`] after [`Self::terminate`].
    pub async fn stats(&self) -> Result<PoolStats, AnalyticsError> {
        Ok(self.pool.stats().await?)
    }

    /// Fails all outstanding work and stops the pool.
    pub async fn terminate(&self) {
        log::info!("Terminating analytics engine");
        self.pool.terminate().await;
    }

    async fn run_quiet(&self, job: AnalyticsJob) -> Result<AnalyticsOutput, AnalyticsError> {
        self.run(job, null_progress()).await
    }

    /// Per-city totals and safety ratings.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn city_stats(&self, dataset: &Dataset) -> Result<Vec<CityStats>, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::ScoreCities {
                dataset: dataset.clone(),
            })
            .await?
        {
            AnalyticsOutput::Cities(stats) => Ok(stats),
            _ => Err(unexpected("cities")),
        }
    }

    /// Risk level of each hour; `None` uses the configured split.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn hour_risks(
        &self,
        dataset: &Dataset,
        split: Option<HourSplit>,
    ) -> Result<Vec<HourRisk>, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::ClassifyHours {
                dataset: dataset.clone(),
                split,
            })
            .await?
        {
            AnalyticsOutput::Hours(hours) => Ok(hours),
            _ => Err(unexpected("hours")),
        }
    }

    /// Per-crime-type counts and shares.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn crime_types(
        &self,
        dataset: &Dataset,
    ) -> Result<Vec<CrimeTypeStats>, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::CrimeTypes {
                dataset: dataset.clone(),
            })
            .await?
        {
            AnalyticsOutput::CrimeTypes(stats) => Ok(stats),
            _ => Err(unexpected("crimeTypes")),
        }
    }

    /// Frequency-based prediction for `city` at `hour`.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn predict(
        &self,
        dataset: &Dataset,
        city: &str,
        hour: u8,
    ) -> Result<Prediction, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::Predict {
                dataset: dataset.clone(),
                city: city.to_string(),
                hour,
            })
            .await?
        {
            AnalyticsOutput::Prediction(prediction) => Ok(prediction),
            _ => Err(unexpected("prediction")),
        }
    }

    /// Weighted ensemble of the temporal, spatial and demographic models.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn ensemble(
        &self,
        dataset: &Dataset,
        city: &str,
        hour: u8,
        date: NaiveDate,
        profile: DemographicProfile,
    ) -> Result<EnsemblePrediction, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::Ensemble {
                dataset: dataset.clone(),
                city: city.to_string(),
                hour,
                date,
                profile,
            })
            .await?
        {
            AnalyticsOutput::Ensemble(prediction) => Ok(prediction),
            _ => Err(unexpected("ensemble")),
        }
    }

    /// Distribution shifts of `current` relative to `baseline`.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn anomalies(
        &self,
        current: &Dataset,
        baseline: &Dataset,
    ) -> Result<Vec<Anomaly>, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::DetectAnomalies {
                current: current.clone(),
                baseline: baseline.clone(),
            })
            .await?
        {
            AnalyticsOutput::Anomalies(anomalies) => Ok(anomalies),
            _ => Err(unexpected("anomalies")),
        }
    }

    /// Weekend and summer pattern rules that fire on `dataset`.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn patterns(&self, dataset: &Dataset) -> Result<Vec<Pattern>, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::DetectPatterns {
                dataset: dataset.clone(),
            })
            .await?
        {
            AnalyticsOutput::Patterns(patterns) => Ok(patterns),
            _ => Err(unexpected("patterns")),
        }
    }

    /// First versus second half-year trends, overall and per city.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn trends(&self, dataset: &Dataset) -> Result<TrendReport, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::AnalyzeTrends {
                dataset: dataset.clone(),
            })
            .await?
        {
            AnalyticsOutput::Trends(trends) => Ok(trends),
            _ => Err(unexpected("trends")),
        }
    }

    /// Every analysis over `dataset` in one pass.
    ///
    /// # Errors
    ///
    /// See [`Self::run`].
    pub async fn report(&self, dataset: &Dataset) -> Result<AnalysisReport, AnalyticsError> {
        match self
            .run_quiet(AnalyticsJob::FullReport {
                dataset: dataset.clone(),
            })
            .await?
        {
            AnalyticsOutput::Report(report) => Ok(report),
            _ => Err(unexpected("report")),
        }
    }
}

const fn unexpected(expected: &'static str) -> AnalyticsError {
    AnalyticsError::UnexpectedOutput { expected }
}

#[cfg(test)]
mod tests {
    use crime_insight_incident_models::RiskLevel;
    use crime_insight_worker::{SchedulerError, TaskError, TaskEvent};

    use super::*;
    use crate::config::EnsembleConfig;
    use crate::test_support::at_hour;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            at_hour("A", "Theft", 10),
            at_hour("A", "Theft", 10),
            at_hour("A", "Theft", 22),
        ])
    }

    #[tokio::test]
    async fn predicts_through_the_pool() {
        let engine = AnalyticsEngine::new(EngineConfig::default()).unwrap();
        let prediction = engine.predict(&dataset(), "A", 10).await.unwrap();

        assert_eq!(prediction.predicted_crime_type.as_deref(), Some("Theft"));
        assert_eq!(prediction.historical_evidence.same_hour_crimes, 2);
        assert_eq!(prediction.historical_evidence.based_on_records, 3);
        engine.terminate().await;
    }

    #[tokio::test]
    async fn empty_dataset_predicts_no_data() {
        let engine = AnalyticsEngine::new(EngineConfig::default()).unwrap();
        let prediction = engine.predict(&Dataset::new(Vec::new()), "A", 10).await.unwrap();

        assert!(prediction.probability.abs() < f64::EPSILON);
        assert!(prediction.confidence.abs() < f64::EPSILON);
        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert!(prediction.recommendations[0].contains("No historical data"));
        engine.terminate().await;
    }

    #[tokio::test]
    async fn typed_helpers_cover_every_job() {
        let engine = AnalyticsEngine::new(EngineConfig::default()).unwrap();
        let data = dataset();
        let date = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();

        assert_eq!(engine.city_stats(&data).await.unwrap().len(), 1);
        assert_eq!(engine.hour_risks(&data, None).await.unwrap().len(), 24);
        assert_eq!(engine.crime_types(&data).await.unwrap()[0].crime_type, "Theft");
        let ensemble = engine
            .ensemble(&data, "A", 10, date, DemographicProfile::default())
            .await
            .unwrap();
        assert_eq!(ensemble.models.len(), 3);
        assert!(engine.anomalies(&data, &data).await.unwrap().is_empty());
        assert!(engine.patterns(&data).await.unwrap().is_empty());
        assert_eq!(engine.trends(&data).await.unwrap().overall.first_half, 3);
        assert_eq!(engine.report(&data).await.unwrap().total_records, 3);
        engine.terminate().await;
    }

    #[tokio::test]
    async fn submit_reports_progress_before_completion() {
        let engine = AnalyticsEngine::new(EngineConfig::default()).unwrap();
        let mut handle = engine
            .submit(AnalyticsJob::FullReport { dataset: dataset() })
            .unwrap();

        let mut saw_progress = false;
        while let Some(event) = handle.next_event().await {
            match event {
                TaskEvent::Progress { fraction, .. } => {
                    assert!((0.0..=1.0).contains(&fraction));
                    saw_progress = true;
                }
                TaskEvent::Completed(AnalyticsOutput::Report(report)) => {
                    assert_eq!(report.total_records, 3);
                    break;
                }
                TaskEvent::Completed(other) => panic!("unexpected output {other:?}"),
                TaskEvent::Failed(error) => panic!("task failed: {error}"),
                TaskEvent::Queued { .. } | TaskEvent::Dispatched { .. } => {}
            }
        }
        assert!(saw_progress);
        engine.terminate().await;
    }

    #[tokio::test]
    async fn terminated_engine_rejects_work() {
        let engine = AnalyticsEngine::new(EngineConfig::default()).unwrap();
        engine.terminate().await;

        let err = engine.predict(&dataset(), "A", 10).await.unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::Scheduler(SchedulerError::Terminated)
                | AnalyticsError::Task(TaskError::Shutdown)
        ));
        assert!(engine.stats().await.is_err());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            ensemble: EnsembleConfig {
                temporal_weight: 1.0,
                spatial_weight: 1.0,
                demographic_weight: 1.0,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            AnalyticsEngine::new(config),
            Err(AnalyticsError::Config { .. })
        ));
    }
}
