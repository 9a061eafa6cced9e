//! Frequency-based prediction for a (city, hour) cell.

use crime_insight_analytics_models::{HistoricalEvidence, Prediction, RiskLevel};

use crate::config::PredictionConfig;
use crate::index::{CityId, RecordIndex, modal_crime_type, ratio};

/// Specificity weight when the cell itself has evidence.
pub const CELL_SPECIFICITY: f64 = 1.0;
/// Specificity weight when the prediction falls back to city-wide data.
pub const CITY_SPECIFICITY: f64 = 0.5;

/// Returns `true` for hours between 20:00 and 05:59.
#[must_use]
pub const fn is_night_hour(hour: u8) -> bool {
    hour >= 20 || hour < 6
}

/// Predicts the most likely crime for a city and hour from historical
/// frequencies.
pub struct FrequencyPredictor<'a> {
    index: &'a RecordIndex,
    config: &'a PredictionConfig,
}

impl<'a> FrequencyPredictor<'a> {
    /// Predictor over `index`.
    #[must_use]
    pub const fn new(index: &'a RecordIndex, config: &'a PredictionConfig) -> Self {
        Self { index, config }
    }

    /// Predicts for `city` at `hour`.
    ///
    /// Unknown cities and hours outside `0..=23` yield
    /// [`Prediction::no_data`].
    #[must_use]
    pub fn predict(&self, city: &str, hour: u8) -> Prediction {
        match self.index.city_id(city) {
            Some(id) if hour < 24 => self.predict_cell(id, hour),
            _ => {
                log::debug!("No evidence for city={city} hour={hour}");
                Prediction::no_data(city.trim(), hour)
            }
        }
    }

    fn predict_cell(&self, city: CityId, hour: u8) -> Prediction {
        let index = self.index;
        let city_name = index.city_name(city);
        let city_total = index.city_total(city);
        let cell_count = index.cell_count(city, hour);

        let (predicted, specificity) = match modal_crime_type(index, index.cell_incidents(city, hour)) {
            Some(label) => (Some(label), CELL_SPECIFICITY),
            None => (modal_crime_type(index, index.city_incidents(city)), CITY_SPECIFICITY),
        };

        let probability = self.smoothed_probability(cell_count, city_total, hour);
        let data_quality = index.city_data_quality(city);
        let confidence = (sample_factor(city_total, self.config.min_sample_size)
            * specificity
            * data_quality)
            .clamp(0.0, 1.0);
        let risk_level = cell_risk(index, cell_count, probability);

        let same_crime_type_crimes = predicted
            .and_then(|label| index.crime_type_id(label))
            .map_or(0, |crime_type| {
                index
                    .city_incidents(city)
                    .filter(|incident| incident.crime_type == crime_type)
                    .count() as u64
            });
        let weapon_incidents = index
            .cell_incidents(city, hour)
            .filter(|incident| incident.weapon)
            .count() as u64;

        let evidence = HistoricalEvidence {
            same_hour_crimes: cell_count,
            same_crime_type_crimes,
            based_on_records: city_total,
            weapon_incidents,
            data_quality,
        };

        let mut factors = vec![format!(
            "{cell_count} of {city_total} incidents in {city_name} occurred at {hour:02}:00"
        )];
        if let Some(label) = predicted {
            factors.push(if specificity < CELL_SPECIFICITY {
                format!("No incidents at this hour; {label} is the most common crime city-wide")
            } else {
                format!("{label} is the most common crime at this hour")
            });
        }
        if weapon_incidents > 0 {
            factors.push(format!("{weapon_incidents} incident(s) at this hour involved a weapon"));
        }

        Prediction {
            city: city_name.to_string(),
            hour,
            predicted_crime_type: predicted.map(str::to_string),
            probability,
            confidence,
            risk_level,
            recommendations: recommendations(
                city_name,
                hour,
                risk_level,
                &evidence,
                self.config.min_sample_size,
            ),
            historical_evidence: evidence,
            factors,
        }
    }

    /// Cell frequency shrunk toward the hour's global share.
    ///
    /// With `k` the prior strength this is
    /// `(cell + k * hour_share) / (city_total + k)`, which stays in `[0, 1]`
    /// and approaches the raw cell frequency as the city sample grows.
    fn smoothed_probability(&self, cell_count: u64, city_total: u64, hour: u8) -> f64 {
        let k = self.config.prior_strength;
        let hour_share = ratio(self.index.hour_count(hour), self.index.total());
        #[allow(clippy::cast_precision_loss)]
        let (cell, total) = (cell_count as f64, city_total as f64);
        ((cell + k * hour_share) / (total + k)).clamp(0.0, 1.0)
    }
}

/// Grows linearly to `1.0` at `min_sample_size` records.
#[must_use]
pub fn sample_factor(sample_size: u64, min_sample_size: u64) -> f64 {
    ratio(sample_size, min_sample_size.max(1)).min(1.0)
}

#[allow(clippy::cast_precision_loss)]
fn cell_risk(index: &RecordIndex, cell_count: u64, probability: f64) -> RiskLevel {
    let (p25, p75) = index.cell_percentiles();
    let count = cell_count as f64;
    if count >= 2.0 * p75 && probability >= 0.5 {
        RiskLevel::Critical
    } else if count >= p75 {
        RiskLevel::High
    } else if count <= p25 {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    }
}

fn recommendations(
    city: &str,
    hour: u8,
    risk_level: RiskLevel,
    evidence: &HistoricalEvidence,
    min_sample_size: u64,
) -> Vec<String> {
    let mut out = Vec::new();

    if evidence.based_on_records < min_sample_size {
        out.push(format!(
            "Limited data: only {} record(s) for {city}; treat this estimate with caution.",
            evidence.based_on_records
        ));
    }
    if evidence.weapon_incidents > 0 {
        out.push(format!(
            "Weapons were involved in {} past incident(s) at this hour; avoid confrontation.",
            evidence.weapon_incidents
        ));
    }
    if is_night_hour(hour) {
        out.push("Night hours: stay in well-lit areas and travel in groups.".to_string());
    }

    out.push(
        match risk_level {
            RiskLevel::Critical => {
                "Critical risk: avoid the area at this hour if possible and keep emergency contacts ready."
            }
            RiskLevel::High => "High risk: stay alert and keep valuables out of sight.",
            RiskLevel::Medium => "Moderate risk: take standard precautions.",
            RiskLevel::Low => "Low risk: normal precautions are sufficient.",
        }
        .to_string(),
    );

    out
}
