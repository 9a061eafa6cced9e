#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types produced by the analytics engine.
//!
//! Everything here is a plain, immutable value object consumed by the
//! presentation layer. A new value replaces the old one whenever the input
//! record set changes; nothing is mutated in place.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use crime_insight_incident_models::RiskLevel;

/// Summary statistics for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityStats {
    /// City name.
    pub city: String,
    /// Total incidents recorded in the city.
    pub total_incidents: u64,
    /// Incidents whose case is closed.
    pub closed_cases: u64,
    /// Mean victim age over well-formed ages.
    pub average_victim_age: Option<f64>,
    /// Most frequent crime type.
    pub most_common_crime: Option<String>,
    /// Composite safety rating in `[1.0, 5.0]`.
    pub safety_rating: f64,
    /// Risk level derived from the safety rating.
    pub risk_level: RiskLevel,
    /// Occurrence timestamp of the latest incident.
    pub latest_incident: Option<NaiveDateTime>,
    /// Fraction of closed cases.
    pub closure_rate: f64,
    /// Fraction of incidents involving a weapon.
    pub weapon_rate: f64,
    /// Fraction of incidents with a violent crime type.
    pub violent_rate: f64,
    /// Fraction of required fields present and well-formed.
    pub data_quality: f64,
}

/// Risk classification of a single hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourRisk {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Incidents that occurred during this hour.
    pub incident_count: u64,
    /// Percentile-based risk level.
    pub risk_level: RiskLevel,
}

/// Summary statistics for one crime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeTypeStats {
    /// Crime-type label.
    pub crime_type: String,
    /// Number of incidents.
    pub count: u64,
    /// Share of the whole dataset.
    pub share: f64,
    /// Fraction of closed cases.
    pub closure_rate: f64,
    /// City with the most incidents of this type.
    pub most_affected_city: Option<String>,
    /// Hour with the most incidents of this type.
    pub peak_hour: Option<u8>,
}

/// Counts backing a [`Prediction`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEvidence {
    /// Incidents in the same city during the same hour.
    pub same_hour_crimes: u64,
    /// Incidents in the same city with the predicted crime type.
    pub same_crime_type_crimes: u64,
    /// Total incidents in the city.
    pub based_on_records: u64,
    /// Incidents in the same city during the same hour involving a weapon.
    pub weapon_incidents: u64,
    /// Data quality of the city's records in `[0, 1]`.
    pub data_quality: f64,
}

/// A frequency-based estimate for a (city, hour) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// City the prediction is for.
    pub city: String,
    /// Hour of day the prediction is for.
    pub hour: u8,
    /// Most likely crime type, `None` without evidence.
    pub predicted_crime_type: Option<String>,
    /// Probability in `[0, 1]`.
    pub probability: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Supporting counts.
    pub historical_evidence: HistoricalEvidence,
    /// Short descriptions of what drove the estimate.
    pub factors: Vec<String>,
    /// Human-readable recommendations.
    pub recommendations: Vec<String>,
}

impl Prediction {
    /// Returns the "no evidence" answer for a city without records.
    #[must_use]
    pub fn no_data(city: &str, hour: u8) -> Self {
        Self {
            city: city.to_string(),
            hour,
            predicted_crime_type: None,
            probability: 0.0,
            confidence: 0.0,
            risk_level: RiskLevel::Low,
            historical_evidence: HistoricalEvidence::default(),
            factors: Vec::new(),
            recommendations: vec![format!(
                "No historical data available for {city}; insufficient evidence for a prediction."
            )],
        }
    }
}

/// The heuristic models that make up the ensemble, in priority order.
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
pub enum ModelKind {
    /// Hour / weekday / month distribution with seasonal multipliers.
    Temporal,
    /// City density plus neighboring-city proximity risk.
    Spatial,
    /// Victim age and gender profile matching.
    Demographic,
}

impl ModelKind {
    /// Returns all variants in tie-break priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Temporal, Self::Spatial, Self::Demographic]
    }
}

/// One model's contribution to an [`EnsemblePrediction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrediction {
    /// Which model produced this prediction.
    pub model: ModelKind,
    /// Consensus weight of the model.
    pub weight: f64,
    /// The model's own prediction.
    pub prediction: Prediction,
}

/// Per-model predictions plus their weighted consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsemblePrediction {
    /// Individual model outputs in priority order.
    pub models: Vec<ModelPrediction>,
    /// The merged result.
    pub consensus: Prediction,
}

/// Distribution dimension compared by anomaly detection.
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
pub enum AnomalyDimension {
    /// Hour-of-day distribution.
    Temporal,
    /// City distribution.
    Spatial,
    /// Victim age-band distribution.
    Demographic,
}

/// A distributional deviation between a current and a baseline slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    /// Dimension that deviated.
    pub dimension: AnomalyDimension,
    /// The deviation itself.
    pub score: f64,
    /// Threshold the score exceeded.
    pub threshold: f64,
    /// Score normalized by the threshold, capped at 1.0.
    pub significance: f64,
    /// Bucket with the largest absolute deviation.
    pub bucket: String,
    /// Human-readable summary.
    pub description: String,
}

/// Rule-based patterns the engine recognizes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    /// Most incidents happen on weekends.
    WeekendSpike,
    /// Most incidents happen in summer months.
    SummerSurge,
}

/// A triggered pattern rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Which rule fired.
    pub kind: PatternKind,
    /// Display name.
    pub name: String,
    /// Human-readable summary.
    pub description: String,
    /// Fixed rule confidence.
    pub confidence: f64,
    /// Observed share that triggered the rule.
    pub share: f64,
    /// Cities contributing to the pattern, most incidents first.
    pub cities: Vec<String>,
}

/// Direction of a half-year trend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    /// More than the deadband above zero.
    Increasing,
    /// More than the deadband below zero.
    Decreasing,
    /// Within the deadband.
    Stable,
}

/// First-half versus second-half comparison for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    /// City name, or `None` for the whole dataset.
    pub city: Option<String>,
    /// Dated incidents in January-June.
    pub first_half: u64,
    /// Dated incidents in July-December.
    pub second_half: u64,
    /// Percentage change from first to second half.
    pub percent_change: f64,
    /// Direction label.
    pub direction: TrendDirection,
}

/// Overall and per-city trends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    /// Whole-dataset trend.
    pub overall: Trend,
    /// Per-city trends, sorted by city name.
    pub by_city: Vec<Trend>,
}

/// Everything the dashboard needs from one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Total records analyzed.
    pub total_records: u64,
    /// Data quality of the whole dataset.
    pub data_quality: f64,
    /// Per-city statistics.
    pub cities: Vec<CityStats>,
    /// Hour classification over the full distribution.
    pub hours: Vec<HourRisk>,
    /// Per-crime-type statistics.
    pub crime_types: Vec<CrimeTypeStats>,
    /// Triggered pattern rules.
    pub patterns: Vec<Pattern>,
    /// Half-year trends.
    pub trends: TrendReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_prediction_is_zeroed() {
        let p = Prediction::no_data("Springfield", 10);
        assert!(p.probability.abs() < f64::EPSILON);
        assert!(p.confidence.abs() < f64::EPSILON);
        assert!(p.predicted_crime_type.is_none());
        assert_eq!(p.historical_evidence.based_on_records, 0);
        assert_eq!(p.recommendations.len(), 1);
        assert!(p.recommendations[0].contains("No historical data"));
    }

    #[test]
    fn prediction_serializes_camel_case() {
        let p = Prediction::no_data("A", 3);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("predictedCrimeType").is_some());
        assert_eq!(json["historicalEvidence"]["sameHourCrimes"], 0);
        assert_eq!(json["riskLevel"], "LOW");
    }

    #[test]
    fn model_priority_order() {
        assert_eq!(
            ModelKind::all(),
            &[ModelKind::Temporal, ModelKind::Spatial, ModelKind::Demographic]
        );
        assert!(ModelKind::Temporal < ModelKind::Demographic);
    }
}
