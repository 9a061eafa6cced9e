//! Analytics work packaged as worker-pool jobs.
//!
//! Every job carries a shared, immutable [`Dataset`]. Execution units keep a
//! small per-unit cache of [`RecordIndex`]es keyed by dataset id, so a
//! sequence of jobs over the same dataset indexes it only once per unit.

use std::sync::Arc;

use chrono::NaiveDate;
use crime_insight_analytics_models::{
    AnalysisReport, Anomaly, CityStats, CrimeTypeStats, EnsemblePrediction, HourRisk, Pattern,
    Prediction, TrendReport,
};
use crime_insight_incident_models::IncidentRecord;
use crime_insight_worker::{JobContext, JobError, JobExecutor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anomaly::detect_anomalies;
use crate::config::{EngineConfig, HourSplit};
use crate::ensemble::{DemographicProfile, EnsembleEngine, FeatureBundle};
use crate::index::RecordIndex;
use crate::patterns::{analyze_trends, detect_patterns};
use crate::predict::FrequencyPredictor;
use crate::risk::{city_stats, classify_hours, crime_type_stats};

/// Number of indexes each execution unit keeps.
pub const UNIT_CACHE_CAPACITY: usize = 4;

/// An immutable, cheaply clonable incident set.
#[derive(Debug, Clone)]
pub struct Dataset {
    id: Uuid,
    records: Arc<[IncidentRecord]>,
}

impl Dataset {
    /// Wraps `records` under a fresh id.
    #[must_use]
    pub fn new(records: Vec<IncidentRecord>) -> Self {
        Self {
            id: Uuid::new_v4(),
            records: records.into(),
        }
    }

    /// Key of this dataset in the per-unit index caches.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The raw records.
    #[must_use]
    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A unit of analytics work.
#[derive(Debug, Clone)]
pub enum AnalyticsJob {
    /// Per-city statistics.
    ScoreCities { dataset: Dataset },
    /// Hour classification with an explicit split, or the configured one.
    ClassifyHours {
        dataset: Dataset,
        split: Option<HourSplit>,
    },
    /// Per-crime-type statistics.
    CrimeTypes { dataset: Dataset },
    /// Frequency prediction for one cell.
    Predict {
        dataset: Dataset,
        city: String,
        hour: u8,
    },
    /// Ensemble prediction for one cell on a given date.
    Ensemble {
        dataset: Dataset,
        city: String,
        hour: u8,
        date: NaiveDate,
        profile: DemographicProfile,
    },
    /// Distribution comparison of two datasets.
    DetectAnomalies { current: Dataset, baseline: Dataset },
    /// Weekend and summer rules.
    DetectPatterns { dataset: Dataset },
    /// Half-year trends.
    AnalyzeTrends { dataset: Dataset },
    /// Everything above except predictions and anomalies, with the wide
    /// hour split.
    FullReport { dataset: Dataset },
}

impl AnalyticsJob {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScoreCities { .. } => "score-cities",
            Self::ClassifyHours { .. } => "classify-hours",
            Self::CrimeTypes { .. } => "crime-types",
            Self::Predict { .. } => "predict",
            Self::Ensemble { .. } => "ensemble",
            Self::DetectAnomalies { .. } => "detect-anomalies",
            Self::DetectPatterns { .. } => "detect-patterns",
            Self::AnalyzeTrends { .. } => "analyze-trends",
            Self::FullReport { .. } => "full-report",
        }
    }
}

/// Result of an [`AnalyticsJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "camelCase")]
pub enum AnalyticsOutput {
    Cities(Vec<CityStats>),
    Hours(Vec<HourRisk>),
    CrimeTypes(Vec<CrimeTypeStats>),
    Prediction(Prediction),
    Ensemble(EnsemblePrediction),
    Anomalies(Vec<Anomaly>),
    Patterns(Vec<Pattern>),
    Trends(TrendReport),
    Report(AnalysisReport),
}

/// Indexes built by one execution unit, most recently used last.
#[derive(Default)]
pub struct UnitCache {
    entries: Vec<(Uuid, Arc<RecordIndex>)>,
}

impl UnitCache {
    fn get(&mut self, id: Uuid) -> Option<Arc<RecordIndex>> {
        let pos = self.entries.iter().position(|(key, _)| *key == id)?;
        let entry = self.entries.remove(pos);
        let index = Arc::clone(&entry.1);
        self.entries.push(entry);
        Some(index)
    }

    fn insert(&mut self, id: Uuid, index: Arc<RecordIndex>) {
        if self.entries.len() >= UNIT_CACHE_CAPACITY {
            self.entries.remove(0);
        }
        self.entries.push((id, index));
    }

    /// Number of cached indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs [`AnalyticsJob`]s on the worker pool.
#[derive(Clone)]
pub struct AnalyticsExecutor {
    config: Arc<EngineConfig>,
}

impl AnalyticsExecutor {
    /// Executor sharing `config` with the engine.
    #[must_use]
    pub const fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Returns the cached index for `dataset`, building it if needed.
    ///
    /// Index construction reports progress on `[from, to]` and checks for
    /// cancellation per chunk. A cancellation requested before scoring
    /// starts is observed on return, including on a cache hit.
    fn index(
        &self,
        cache: &mut UnitCache,
        dataset: &Dataset,
        ctx: &JobContext,
        (from, to): (f64, f64),
    ) -> Result<Arc<RecordIndex>, JobError> {
        if let Some(index) = cache.get(dataset.id()) {
            log::debug!("Reusing index for dataset {}", dataset.id());
            ctx.report(to, "Indexing records");
            ctx.checkpoint()?;
            return Ok(index);
        }

        ctx.checkpoint()?;
        let index = RecordIndex::build_with_progress(dataset.records(), |done, total| {
            ctx.checkpoint()?;
            #[allow(clippy::cast_precision_loss)]
            let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
            ctx.report(from + (to - from) * fraction, "Indexing records");
            Ok::<(), JobError>(())
        })?;

        let index = Arc::new(index);
        cache.insert(dataset.id(), Arc::clone(&index));
        ctx.checkpoint()?;
        Ok(index)
    }

    fn full_report(
        &self,
        cache: &mut UnitCache,
        dataset: &Dataset,
        ctx: &JobContext,
    ) -> Result<AnalysisReport, JobError> {
        let index = self.index(cache, dataset, ctx, (0.0, 0.5))?;

        ctx.report(0.6, "Scoring cities");
        let cities = city_stats(&index);
        ctx.checkpoint()?;

        ctx.report(0.7, "Classifying hours");
        let hours = classify_hours(&index.hour_counts(), HourSplit::Wide);
        let crime_types = crime_type_stats(&index);
        ctx.checkpoint()?;

        ctx.report(0.85, "Detecting patterns");
        let patterns = detect_patterns(&index, &self.config.patterns);
        let trends = analyze_trends(&index, &self.config.patterns);

        Ok(AnalysisReport {
            total_records: index.total(),
            data_quality: index.data_quality(),
            cities,
            hours,
            crime_types,
            patterns,
            trends,
        })
    }
}

impl JobExecutor for AnalyticsExecutor {
    type Job = AnalyticsJob;
    type Output = AnalyticsOutput;
    type UnitState = UnitCache;

    fn execute(
        &self,
        cache: &mut UnitCache,
        job: AnalyticsJob,
        ctx: &JobContext,
    ) -> Result<AnalyticsOutput, JobError> {
        log::debug!("Task {} running {} job", ctx.task_id(), job.name());
        let config = &self.config;
        let whole = (0.0, 0.9);

        let output = match job {
            AnalyticsJob::ScoreCities { dataset } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                AnalyticsOutput::Cities(city_stats(&index))
            }
            AnalyticsJob::ClassifyHours { dataset, split } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                let split = split.unwrap_or(config.hour_split);
                AnalyticsOutput::Hours(classify_hours(&index.hour_counts(), split))
            }
            AnalyticsJob::CrimeTypes { dataset } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                AnalyticsOutput::CrimeTypes(crime_type_stats(&index))
            }
            AnalyticsJob::Predict {
                dataset,
                city,
                hour,
            } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                let predictor = FrequencyPredictor::new(&index, &config.prediction);
                AnalyticsOutput::Prediction(predictor.predict(&city, hour))
            }
            AnalyticsJob::Ensemble {
                dataset,
                city,
                hour,
                date,
                profile,
            } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                let engine = EnsembleEngine::new(&config.ensemble, &config.prediction);
                let features = FeatureBundle::new(&index, &city, hour, date, profile);
                AnalyticsOutput::Ensemble(engine.predict(&features))
            }
            AnalyticsJob::DetectAnomalies { current, baseline } => {
                let current = self.index(cache, &current, ctx, (0.0, 0.45))?;
                let baseline = self.index(cache, &baseline, ctx, (0.45, 0.9))?;
                AnalyticsOutput::Anomalies(detect_anomalies(&current, &baseline, &config.anomaly))
            }
            AnalyticsJob::DetectPatterns { dataset } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                AnalyticsOutput::Patterns(detect_patterns(&index, &config.patterns))
            }
            AnalyticsJob::AnalyzeTrends { dataset } => {
                let index = self.index(cache, &dataset, ctx, whole)?;
                AnalyticsOutput::Trends(analyze_trends(&index, &config.patterns))
            }
            AnalyticsJob::FullReport { dataset } => {
                AnalyticsOutput::Report(self.full_report(cache, &dataset, ctx)?)
            }
        };

        ctx.report(1.0, "Done");
        Ok(output)
    }
}
