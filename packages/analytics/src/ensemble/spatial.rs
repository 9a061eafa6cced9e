//! City density plus proximity risk from neighboring cities.
//!
//! The density lift of a city is its share of all incidents times the
//! number of cities. The score blends the city's own lift with the mean
//! lift of its neighbors that appear in the data.
//!
//! Cut points: probability `>= 0.65` is High, `>= 0.50` Medium.

use crime_insight_analytics_models::{ModelKind, Prediction, RiskLevel};

use super::{CutPoints, FeatureBundle, ModelScore, PredictionModel, scored_prediction};
use crate::index::{CityId, RecordIndex, modal_crime_type, ratio};

const CUTS: CutPoints = CutPoints {
    high: 0.65,
    medium: 0.50,
};

const OWN_WEIGHT: f64 = 0.7;
const NEIGHBOR_WEIGHT: f64 = 0.3;

/// Undirected adjacency between cities, as pairs. Lookups treat each pair
/// in both directions.
pub const ADJACENT_CITIES: &[(&str, &str)] = &[
    ("Agra", "Delhi"),
    ("Agra", "Jaipur"),
    ("Agra", "Kanpur"),
    ("Ahmedabad", "Indore"),
    ("Ahmedabad", "Rajkot"),
    ("Ahmedabad", "Surat"),
    ("Bangalore", "Chennai"),
    ("Bangalore", "Hyderabad"),
    ("Bhopal", "Indore"),
    ("Bhopal", "Nagpur"),
    ("Chennai", "Visakhapatnam"),
    ("Delhi", "Faridabad"),
    ("Delhi", "Ghaziabad"),
    ("Delhi", "Jaipur"),
    ("Delhi", "Ludhiana"),
    ("Delhi", "Meerut"),
    ("Faridabad", "Ghaziabad"),
    ("Ghaziabad", "Meerut"),
    ("Hyderabad", "Nagpur"),
    ("Hyderabad", "Visakhapatnam"),
    ("Kalyan", "Mumbai"),
    ("Kalyan", "Thane"),
    ("Kanpur", "Lucknow"),
    ("Kolkata", "Patna"),
    ("Lucknow", "Varanasi"),
    ("Ludhiana", "Srinagar"),
    ("Mumbai", "Nashik"),
    ("Mumbai", "Pune"),
    ("Mumbai", "Thane"),
    ("Mumbai", "Vasai"),
    ("Nashik", "Pune"),
    ("Nashik", "Surat"),
    ("Patna", "Varanasi"),
    ("Thane", "Vasai"),
];

/// Cities adjacent to `city` (case-insensitive), sorted.
#[must_use]
pub fn neighbors(city: &str) -> Vec<&'static str> {
    let city = city.trim();
    let mut out: Vec<&'static str> = ADJACENT_CITIES
        .iter()
        .filter_map(|&(a, b)| {
            if a.eq_ignore_ascii_case(city) {
                Some(b)
            } else if b.eq_ignore_ascii_case(city) {
                Some(a)
            } else {
                None
            }
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Share of all incidents in `city` times the number of cities.
#[must_use]
pub fn density_lift(index: &RecordIndex, city: CityId) -> f64 {
    ratio(index.city_total(city), index.total()) * count_f64(index.city_count())
}

#[allow(clippy::cast_precision_loss)]
const fn count_f64(n: usize) -> f64 {
    n as f64
}

/// Scores a city by its share of incidents and that of its neighbors.
pub struct SpatialModel {
    min_sample_size: u64,
}

impl SpatialModel {
    /// See [`TemporalModel::new`](super::temporal::TemporalModel::new).
    #[must_use]
    pub const fn new(min_sample_size: u64) -> Self {
        Self { min_sample_size }
    }
}

impl PredictionModel for SpatialModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Spatial
    }

    fn predict(&self, features: &FeatureBundle<'_>) -> Prediction {
        let Some(city) = features.city_id() else {
            return Prediction::no_data(features.city.trim(), features.hour);
        };
        let index = features.history;
        let own = density_lift(index, city);

        let nearby: Vec<(&str, f64)> = neighbors(index.city_name(city))
            .into_iter()
            .filter_map(|name| index.city_id(name).map(|id| (name, density_lift(index, id))))
            .collect();

        let mut factors = vec![format!("City density lift {own:.2}")];
        let score = if nearby.is_empty() {
            own
        } else {
            let neighbor_mean =
                nearby.iter().map(|(_, lift)| lift).sum::<f64>() / count_f64(nearby.len());
            let names: Vec<&str> = nearby.iter().map(|(name, _)| *name).collect();
            factors.push(format!(
                "Neighboring cities ({}) density lift {neighbor_mean:.2}",
                names.join(", ")
            ));
            OWN_WEIGHT * own + NEIGHBOR_WEIGHT * neighbor_mean
        };

        scored_prediction(
            features,
            city,
            CUTS,
            self.min_sample_size,
            advice,
            ModelScore {
                score,
                crime_type: modal_crime_type(index, index.city_incidents(city)),
                specificity: 1.0,
                factors,
            },
        )
    }
}

const fn advice(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Critical | RiskLevel::High => {
            "This area and its surroundings report many incidents; stay on busy, well-known routes."
        }
        RiskLevel::Medium => "Incident density in this area is near average.",
        RiskLevel::Low => "This area reports comparatively few incidents.",
    }
}
