//! Engine configuration.
//!
//! Every tunable has a default matching the engine's documented behavior,
//! so an empty TOML document (or no file at all) yields a working
//! configuration. Sections and keys use `snake_case`:
//!
//! ```toml
//! hour_split = "wide"
//!
//! [prediction]
//! min_sample_size = 30
//!
//! [ensemble]
//! temporal_weight = 0.5
//! spatial_weight = 0.3
//! demographic_weight = 0.2
//!
//! [pool]
//! size = 4
//! ```

use std::path::Path;

use crime_insight_worker::PoolConfig;
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;

/// Environment variable naming a TOML configuration file.
pub const CONFIG_ENV: &str = "CRIME_INSIGHT_CONFIG";

/// Percentile split used when classifying hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourSplit {
    /// 10th / 90th percentile.
    #[default]
    Standard,
    /// 15th / 85th percentile, used by the full analysis report.
    Wide,
}

impl HourSplit {
    /// Returns the `(low, high)` percentile fractions.
    #[must_use]
    pub const fn percentiles(self) -> (f64, f64) {
        match self {
            Self::Standard => (0.10, 0.90),
            Self::Wide => (0.15, 0.85),
        }
    }
}

/// Frequency prediction tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// City sample size at which confidence stops growing.
    pub min_sample_size: u64,
    /// Pseudo-count weight of the global hour share in the smoothed
    /// probability.
    pub prior_strength: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 20,
            prior_strength: 5.0,
        }
    }
}

/// Consensus weights of the ensemble models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight of the temporal model.
    pub temporal_weight: f64,
    /// Weight of the spatial model.
    pub spatial_weight: f64,
    /// Weight of the demographic model.
    pub demographic_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            temporal_weight: 0.40,
            spatial_weight: 0.35,
            demographic_weight: 0.25,
        }
    }
}

/// Deviation thresholds for anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Summed hour-distribution deviation.
    pub temporal_threshold: f64,
    /// Summed city-distribution deviation.
    pub spatial_threshold: f64,
    /// Age-band deviation averaged over the age bands.
    pub demographic_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            temporal_threshold: 0.30,
            spatial_threshold: 0.50,
            demographic_threshold: 0.40,
        }
    }
}

/// Pattern rules and trend deadband.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Weekend share above which the weekend rule fires.
    pub weekend_share_threshold: f64,
    /// Confidence reported by the weekend rule.
    pub weekend_confidence: f64,
    /// Summer share above which the summer rule fires.
    pub summer_share_threshold: f64,
    /// Confidence reported by the summer rule.
    pub summer_confidence: f64,
    /// Percentage change treated as stable.
    pub trend_deadband_percent: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            weekend_share_threshold: 0.6,
            weekend_confidence: 0.80,
            summer_share_threshold: 0.7,
            summer_confidence: 0.75,
            trend_deadband_percent: 5.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Percentile split for the hour classification job.
    pub hour_split: HourSplit,
    /// Frequency prediction tunables.
    pub prediction: PredictionConfig,
    /// Ensemble consensus weights.
    pub ensemble: EnsembleConfig,
    /// Anomaly thresholds.
    pub anomaly: AnomalyConfig,
    /// Pattern rules.
    pub patterns: PatternConfig,
    /// Worker pool sizing.
    pub pool: PoolConfig,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Toml`] for malformed TOML and
    /// [`AnalyticsError::Config`] if validation fails.
    pub fn from_toml_str(s: &str) -> Result<Self, AnalyticsError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Io`] if the file cannot be read, plus the
    /// errors of [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loaded engine config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Loads the file named by `path`, else by [`CONFIG_ENV`], else returns
    /// the defaults. The pool size honors the worker environment override.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::load`].
    pub fn resolve(path: Option<&Path>) -> Result<Self, AnalyticsError> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(std::path::PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.pool = config.pool.with_env_override();
        Ok(config)
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let EnsembleConfig {
            temporal_weight,
            spatial_weight,
            demographic_weight,
        } = self.ensemble;

        for (name, weight) in [
            ("temporal_weight", temporal_weight),
            ("spatial_weight", spatial_weight),
            ("demographic_weight", demographic_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(invalid(format!("ensemble.{name} must be in [0, 1], got {weight}")));
            }
        }

        let sum = temporal_weight + spatial_weight + demographic_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(invalid(format!("ensemble weights must sum to 1.0, got {sum}")));
        }

        for (name, value) in [
            ("anomaly.temporal_threshold", self.anomaly.temporal_threshold),
            ("anomaly.spatial_threshold", self.anomaly.spatial_threshold),
            ("anomaly.demographic_threshold", self.anomaly.demographic_threshold),
            ("prediction.prior_strength", self.prediction.prior_strength),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }

        if self.prediction.min_sample_size == 0 {
            return Err(invalid("prediction.min_sample_size must be at least 1".to_string()));
        }

        for (name, value) in [
            ("patterns.weekend_share_threshold", self.patterns.weekend_share_threshold),
            ("patterns.summer_share_threshold", self.patterns.summer_share_threshold),
            ("patterns.weekend_confidence", self.patterns.weekend_confidence),
            ("patterns.summer_confidence", self.patterns.summer_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }

        if self.patterns.trend_deadband_percent < 0.0 {
            return Err(invalid("patterns.trend_deadband_percent must not be negative".to_string()));
        }

        Ok(())
    }
}

const fn invalid(message: String) -> AnalyticsError {
    AnalyticsError::Config { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.hour_split, HourSplit::Standard);
        assert_eq!(config.prediction.min_sample_size, 20);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            hour_split = "wide"

            [prediction]
            min_sample_size = 50

            [pool]
            size = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.hour_split, HourSplit::Wide);
        assert_eq!(config.prediction.min_sample_size, 50);
        assert!((config.prediction.prior_strength - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.pool.size, 3);
        assert_eq!(config.ensemble, EnsembleConfig::default());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let err = EngineConfig::from_toml_str(
            r"
            [ensemble]
            temporal_weight = 0.5
            spatial_weight = 0.5
            demographic_weight = 0.5
            ",
        )
        .unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn rejects_non_positive_thresholds() {
        let err = EngineConfig::from_toml_str(
            r"
            [anomaly]
            temporal_threshold = 0.0
            ",
        )
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::Config { .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("hour_split = [").unwrap_err();
        assert!(matches!(err, AnalyticsError::Toml(_)));
    }

    #[test]
    fn hour_split_percentiles() {
        assert_eq!(HourSplit::Standard.percentiles(), (0.10, 0.90));
        assert_eq!(HourSplit::Wide.percentiles(), (0.15, 0.85));
    }
}
