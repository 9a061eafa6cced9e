//! Heuristic three-model ensemble.
//!
//! Each [`PredictionModel`] scores a [`FeatureBundle`] independently and
//! emits a full [`Prediction`]. [`EnsembleEngine`] merges them with fixed
//! weights into a consensus.
//!
//! Models turn a non-negative lift score `s` into a probability with
//! `s / (1 + s)`, so a lift of `1.0` (exactly average) maps to `0.5`.

pub mod demographic;
pub mod spatial;
pub mod temporal;

use chrono::{Datelike as _, NaiveDate, Weekday};
use crime_insight_analytics_models::{
    EnsemblePrediction, HistoricalEvidence, ModelKind, ModelPrediction, Prediction, RiskLevel,
};
use crime_insight_incident_models::{Gender, Season};

use crate::config::{EnsembleConfig, PredictionConfig};
use crate::index::{CityId, RecordIndex};
use crate::predict::sample_factor;

pub use demographic::DemographicModel;
pub use spatial::SpatialModel;
pub use temporal::TemporalModel;

/// Victim profile to predict for. Missing fields fall back to the city's
/// modal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemographicProfile {
    pub age: Option<u8>,
    pub gender: Gender,
}

impl Default for DemographicProfile {
    fn default() -> Self {
        Self {
            age: None,
            gender: Gender::Unknown,
        }
    }
}

/// Everything the models need to score one (city, hour, date) query.
#[derive(Clone, Copy)]
pub struct FeatureBundle<'a> {
    /// City as given by the caller.
    pub city: &'a str,
    /// Hour of day, 0-23.
    pub hour: u8,
    pub day_of_week: Weekday,
    /// Month, 1-12.
    pub month: u32,
    pub season: Season,
    /// Indexed history the models score against.
    pub history: &'a RecordIndex,
    pub demographics: DemographicProfile,
}

impl<'a> FeatureBundle<'a> {
    /// Derives the calendar features from `date`.
    #[must_use]
    pub fn new(
        history: &'a RecordIndex,
        city: &'a str,
        hour: u8,
        date: NaiveDate,
        demographics: DemographicProfile,
    ) -> Self {
        Self {
            city,
            hour,
            day_of_week: date.weekday(),
            month: date.month(),
            season: Season::of(date),
            history,
            demographics,
        }
    }

    /// The queried city, if it has any records and the hour is valid.
    #[must_use]
    pub fn city_id(&self) -> Option<CityId> {
        if self.hour < 24 {
            self.history.city_id(self.city)
        } else {
            None
        }
    }
}

/// A single heuristic scorer.
pub trait PredictionModel: Send + Sync {
    /// Which model this is.
    fn kind(&self) -> ModelKind;

    /// Scores `features`. Cities without history yield
    /// [`Prediction::no_data`].
    fn predict(&self, features: &FeatureBundle<'_>) -> Prediction;
}

/// Probability cut points of a model: `(high, medium)`.
#[derive(Debug, Clone, Copy)]
pub struct CutPoints {
    /// Lowest High probability.
    pub high: f64,
    /// Lowest Medium probability.
    pub medium: f64,
}

impl CutPoints {
    /// At or above `high` is High, at or above `medium` Medium, else Low.
    #[must_use]
    pub fn classify(self, probability: f64) -> RiskLevel {
        if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Maps a non-negative lift score onto `[0, 1)`.
#[must_use]
pub fn squash(score: f64) -> f64 {
    let score = score.max(0.0);
    score / (1.0 + score)
}

/// Parts of a model result that differ between models.
pub(crate) struct ModelScore<'a> {
    pub score: f64,
    pub crime_type: Option<&'a str>,
    pub specificity: f64,
    pub factors: Vec<String>,
}

/// Turns a model score into a full prediction with evidence for the cell.
pub(crate) fn scored_prediction(
    features: &FeatureBundle<'_>,
    city: CityId,
    cuts: CutPoints,
    min_sample_size: u64,
    advice: impl Fn(RiskLevel) -> &'static str,
    result: ModelScore<'_>,
) -> Prediction {
    let index = features.history;
    let city_total = index.city_total(city);
    let data_quality = index.city_data_quality(city);
    let probability = squash(result.score);
    let risk_level = cuts.classify(probability);
    let confidence = (sample_factor(city_total, min_sample_size) * result.specificity * data_quality)
        .clamp(0.0, 1.0);

    let crime_type_id = result.crime_type.and_then(|label| index.crime_type_id(label));
    let mut evidence = HistoricalEvidence {
        based_on_records: city_total,
        data_quality,
        ..HistoricalEvidence::default()
    };
    for incident in index.city_incidents(city) {
        if incident.hour == features.hour {
            evidence.same_hour_crimes += 1;
            evidence.weapon_incidents += u64::from(incident.weapon);
        }
        if Some(incident.crime_type) == crime_type_id {
            evidence.same_crime_type_crimes += 1;
        }
    }

    Prediction {
        city: index.city_name(city).to_string(),
        hour: features.hour,
        predicted_crime_type: result.crime_type.map(str::to_string),
        probability,
        confidence,
        risk_level,
        historical_evidence: evidence,
        factors: result.factors,
        recommendations: vec![advice(risk_level).to_string()],
    }
}

/// Weighted combination of the temporal, spatial, and demographic models.
pub struct EnsembleEngine {
    models: Vec<(Box<dyn PredictionModel>, f64)>,
}

impl EnsembleEngine {
    /// Creates the standard three-model ensemble.
    #[must_use]
    pub fn new(weights: &EnsembleConfig, prediction: &PredictionConfig) -> Self {
        let min_sample_size = prediction.min_sample_size;
        Self {
            models: vec![
                (
                    Box::new(TemporalModel::new(min_sample_size)),
                    weights.temporal_weight,
                ),
                (
                    Box::new(SpatialModel::new(min_sample_size)),
                    weights.spatial_weight,
                ),
                (
                    Box::new(DemographicModel::new(min_sample_size)),
                    weights.demographic_weight,
                ),
            ],
        }
    }

    /// Runs every model and merges the results.
    #[must_use]
    pub fn predict(&self, features: &FeatureBundle<'_>) -> EnsemblePrediction {
        let models: Vec<ModelPrediction> = self
            .models
            .iter()
            .map(|(model, weight)| ModelPrediction {
                model: model.kind(),
                weight: *weight,
                prediction: model.predict(features),
            })
            .collect();

        let consensus = consensus(features.city.trim(), features.hour, &models);
        log::debug!(
            "Ensemble for city={} hour={}: {:?} p={:.3}",
            consensus.city,
            consensus.hour,
            consensus.predicted_crime_type,
            consensus.probability
        );

        EnsemblePrediction { models, consensus }
    }
}

/// Merges model outputs, which must be in priority order.
///
/// The crime type is the weighted-vote winner; on a tie the label backed by
/// the higher-priority model wins. Probability and confidence are weighted
/// sums. The risk level is the weighted mean ordinal, rounded half up.
#[must_use]
pub fn consensus(city: &str, hour: u8, models: &[ModelPrediction]) -> Prediction {
    let mut votes: Vec<(&str, f64)> = Vec::new();
    let mut probability = 0.0;
    let mut confidence = 0.0;
    let mut ordinal = 0.0;
    let mut factors: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();

    for ModelPrediction {
        weight, prediction, ..
    } in models
    {
        if let Some(label) = prediction.predicted_crime_type.as_deref() {
            match votes.iter_mut().find(|(existing, _)| *existing == label) {
                Some((_, total)) => *total += weight,
                None => votes.push((label, *weight)),
            }
        }
        probability += weight * prediction.probability;
        confidence += weight * prediction.confidence;
        ordinal += weight * f64::from(prediction.risk_level.ordinal());
        push_unique(&mut factors, &prediction.factors);
        push_unique(&mut recommendations, &prediction.recommendations);
    }

    let mut winner: Option<(&str, f64)> = None;
    for &(label, total) in &votes {
        if winner.is_none_or(|(_, best)| total > best) {
            winner = Some((label, total));
        }
    }

    let historical_evidence = models
        .iter()
        .find(|m| m.model == ModelKind::Temporal)
        .or_else(|| models.first())
        .map(|m| m.prediction.historical_evidence.clone())
        .unwrap_or_default();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let risk_level = RiskLevel::from_ordinal((ordinal + 0.5).floor().max(0.0) as u8);

    Prediction {
        city: city.to_string(),
        hour,
        predicted_crime_type: winner.map(|(label, _)| label.to_string()),
        probability: probability.clamp(0.0, 1.0),
        confidence: confidence.clamp(0.0, 1.0),
        risk_level,
        historical_evidence,
        factors,
        recommendations,
    }
}

fn push_unique(into: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at_hour, record};

    fn model(kind: ModelKind, weight: f64, crime: Option<&str>, p: f64, risk: RiskLevel) -> ModelPrediction {
        let mut prediction = Prediction::no_data("A", 10);
        prediction.predicted_crime_type = crime.map(str::to_string);
        prediction.probability = p;
        prediction.confidence = p;
        prediction.risk_level = risk;
        prediction.recommendations = vec![format!("{kind} advice"), "shared".to_string()];
        prediction.historical_evidence.based_on_records = u64::from(kind == ModelKind::Temporal);
        ModelPrediction {
            model: kind,
            weight,
            prediction,
        }
    }

    #[test]
    fn consensus_picks_weighted_vote_winner() {
        let models = vec![
            model(ModelKind::Temporal, 0.40, Some("Theft"), 0.6, RiskLevel::High),
            model(ModelKind::Spatial, 0.35, Some("Assault"), 0.4, RiskLevel::Low),
            model(ModelKind::Demographic, 0.25, Some("Assault"), 0.2, RiskLevel::Low),
        ];
        let merged = consensus("A", 10, &models);

        assert_eq!(merged.predicted_crime_type.as_deref(), Some("Assault"));
        assert!((merged.probability - (0.24 + 0.14 + 0.05)).abs() < 1e-9);
        assert_eq!(merged.risk_level, RiskLevel::Medium);
        assert_eq!(merged.historical_evidence.based_on_records, 1);
        assert_eq!(
            merged.recommendations,
            vec![
                "TEMPORAL advice".to_string(),
                "shared".to_string(),
                "SPATIAL advice".to_string(),
                "DEMOGRAPHIC advice".to_string(),
            ]
        );
    }

    #[test]
    fn consensus_ties_go_to_higher_priority_model() {
        let models = vec![
            model(ModelKind::Temporal, 0.5, Some("Theft"), 0.5, RiskLevel::Low),
            model(ModelKind::Spatial, 0.5, Some("Assault"), 0.5, RiskLevel::High),
            model(ModelKind::Demographic, 0.0, None, 0.0, RiskLevel::Low),
        ];
        let merged = consensus("A", 10, &models);
        assert_eq!(merged.predicted_crime_type.as_deref(), Some("Theft"));
        // 0.5 * 0 + 0.5 * 2 = 1.0
        assert_eq!(merged.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn risk_ordinal_rounds_half_up() {
        let models = vec![
            model(ModelKind::Temporal, 0.5, None, 0.0, RiskLevel::Low),
            model(ModelKind::Spatial, 0.5, None, 0.0, RiskLevel::Medium),
        ];
        assert_eq!(consensus("A", 1, &models).risk_level, RiskLevel::Medium);
    }

    #[test]
    fn ensemble_predicts_for_known_city() {
        let mut records: Vec<_> = (0..12).map(|_| at_hour("Delhi", "Theft", 21)).collect();
        records.push(at_hour("Delhi", "Assault", 9));
        records.push(at_hour("Ghaziabad", "Theft", 21));
        records.push(record("Mumbai", "Fraud", "2023-07-01", "14:00"));

        let index = RecordIndex::build(&records);
        let engine = EnsembleEngine::new(&EnsembleConfig::default(), &PredictionConfig::default());
        let date = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        let features = FeatureBundle::new(&index, "Delhi", 21, date, DemographicProfile::default());
        let result = engine.predict(&features);

        assert_eq!(result.models.len(), 3);
        assert_eq!(
            result.models.iter().map(|m| m.model).collect::<Vec<_>>(),
            ModelKind::all().to_vec()
        );
        let weight_sum: f64 = result.models.iter().map(|m| m.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);

        let consensus = &result.consensus;
        assert_eq!(consensus.predicted_crime_type.as_deref(), Some("Theft"));
        assert_eq!(consensus.historical_evidence.same_hour_crimes, 12);
        assert_eq!(consensus.historical_evidence.based_on_records, 13);
        assert!((0.0..=1.0).contains(&consensus.probability));
        assert!((0.0..=1.0).contains(&consensus.confidence));
        for m in &result.models {
            assert!((0.0..=1.0).contains(&m.prediction.probability));
            assert!((0.0..=1.0).contains(&m.prediction.confidence));
        }
    }

    #[test]
    fn ensemble_for_unknown_city_has_no_evidence() {
        let index = RecordIndex::build(&[at_hour("Delhi", "Theft", 1)]);
        let engine = EnsembleEngine::new(&EnsembleConfig::default(), &PredictionConfig::default());
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let features = FeatureBundle::new(&index, "Atlantis", 1, date, DemographicProfile::default());
        let result = engine.predict(&features);

        assert_eq!(result.consensus.predicted_crime_type, None);
        assert!(result.consensus.confidence.abs() < f64::EPSILON);
        assert_eq!(result.consensus.risk_level, RiskLevel::Low);
        assert_eq!(result.consensus.recommendations.len(), 1);
    }

    #[test]
    fn squash_maps_average_lift_to_half() {
        assert!((squash(1.0) - 0.5).abs() < f64::EPSILON);
        assert!(squash(0.0).abs() < f64::EPSILON);
        assert!(squash(-3.0).abs() < f64::EPSILON);
        assert!(squash(1e9) < 1.0);
    }
}
