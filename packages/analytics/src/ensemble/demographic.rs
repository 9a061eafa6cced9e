//! Victim profile matching against a city's (gender, age band) distribution.
//!
//! Only incidents with a recorded age and gender form buckets. The lift of
//! the queried profile is its bucket share times the number of occupied
//! buckets.
//!
//! Cut points: probability `>= 0.55` is High, `>= 0.40` Medium.

use std::collections::BTreeMap;

use crime_insight_analytics_models::{ModelKind, Prediction, RiskLevel};
use crime_insight_incident_models::{AgeBand, Gender};

use super::{CutPoints, FeatureBundle, ModelScore, PredictionModel, scored_prediction};
use crate::index::{CityId, IndexedIncident, RecordIndex, mode, modal_crime_type, ratio};
use crate::predict::{CELL_SPECIFICITY, CITY_SPECIFICITY};

const CUTS: CutPoints = CutPoints {
    high: 0.55,
    medium: 0.40,
};

type Bucket = (Gender, AgeBand);

fn bucket_of(incident: &IndexedIncident) -> Option<Bucket> {
    match (incident.victim_gender, incident.victim_age) {
        (Gender::Unknown, _) | (_, None) => None,
        (gender, Some(age)) => Some((gender, AgeBand::from_age(age))),
    }
}

fn city_buckets(index: &RecordIndex, city: CityId) -> BTreeMap<Bucket, u64> {
    let mut buckets = BTreeMap::new();
    for bucket in index.city_incidents(city).filter_map(bucket_of) {
        *buckets.entry(bucket).or_default() += 1;
    }
    buckets
}

/// Fills missing profile fields with the city's modal gender and age band.
fn resolve_profile(
    buckets: &BTreeMap<Bucket, u64>,
    age: Option<u8>,
    gender: Gender,
) -> Option<Bucket> {
    let gender = match gender {
        Gender::Unknown => {
            let mut genders = BTreeMap::new();
            for (&(g, _), &n) in buckets {
                *genders.entry(g).or_default() += n;
            }
            mode(&genders)?
        }
        known => known,
    };
    let band = match age {
        Some(age) => AgeBand::from_age(age),
        None => {
            let mut bands = BTreeMap::new();
            for (&(_, band), &n) in buckets {
                *bands.entry(band).or_default() += n;
            }
            mode(&bands)?
        }
    };
    Some((gender, band))
}

/// Scores how often a victim profile is targeted in a city.
pub struct DemographicModel {
    min_sample_size: u64,
}

impl DemographicModel {
    /// See [`TemporalModel::new`](super::temporal::TemporalModel::new).
    #[must_use]
    pub const fn new(min_sample_size: u64) -> Self {
        Self { min_sample_size }
    }
}

impl PredictionModel for DemographicModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Demographic
    }

    fn predict(&self, features: &FeatureBundle<'_>) -> Prediction {
        let Some(city) = features.city_id() else {
            return Prediction::no_data(features.city.trim(), features.hour);
        };
        let index = features.history;
        let buckets = city_buckets(index, city);
        let profiled: u64 = buckets.values().sum();
        let profile = features.demographics;

        let resolved = if profiled == 0 {
            None
        } else {
            resolve_profile(&buckets, profile.age, profile.gender)
        };
        let Some(bucket) = resolved else {
            return scored_prediction(
                features,
                city,
                CUTS,
                self.min_sample_size,
                advice,
                ModelScore {
                    score: 1.0,
                    crime_type: modal_crime_type(index, index.city_incidents(city)),
                    specificity: CITY_SPECIFICITY,
                    factors: vec!["No victim demographics recorded for this city".to_string()],
                },
            );
        };

        let in_bucket = buckets.get(&bucket).copied().unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let lift = ratio(in_bucket, profiled) * buckets.len() as f64;

        let bucket_crime = modal_crime_type(
            index,
            index
                .city_incidents(city)
                .filter(|incident| bucket_of(incident) == Some(bucket)),
        );
        let (crime_type, specificity) = match bucket_crime {
            Some(label) => (Some(label), CELL_SPECIFICITY),
            None => (modal_crime_type(index, index.city_incidents(city)), CITY_SPECIFICITY),
        };

        let (gender, band) = bucket;
        let mut factors = vec![format!(
            "{in_bucket} of {profiled} profiled victims were {gender} / {band} (lift {lift:.2})"
        )];
        if profile.age.is_none() || profile.gender == Gender::Unknown {
            factors.push("Profile completed from the city's most common victim group".to_string());
        }

        scored_prediction(
            features,
            city,
            CUTS,
            self.min_sample_size,
            advice,
            ModelScore {
                score: lift,
                crime_type,
                specificity,
                factors,
            },
        )
    }
}

const fn advice(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Critical | RiskLevel::High => {
            "People matching this profile are frequently targeted here; take extra care."
        }
        RiskLevel::Medium => "This profile is targeted at about the city average.",
        RiskLevel::Low => "This profile is rarely targeted in this city.",
    }
}
