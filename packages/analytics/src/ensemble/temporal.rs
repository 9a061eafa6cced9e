//! Hour, weekday and month distribution of a city's incidents.
//!
//! Each dimension contributes a lift: the share of the city's incidents
//! falling in the queried bucket times the number of buckets, so `1.0` is
//! average. The mean lift is scaled by a seasonal and a weekend multiplier.
//!
//! Cut points: probability `>= 0.60` is High, `>= 0.45` Medium.

use chrono::{Datelike as _, Weekday};
use crime_insight_analytics_models::{ModelKind, Prediction, RiskLevel};
use crime_insight_incident_models::{Season, is_weekend};

use super::{CutPoints, FeatureBundle, ModelScore, PredictionModel, scored_prediction};
use crate::index::{modal_crime_type, ratio};
use crate::predict::{CELL_SPECIFICITY, CITY_SPECIFICITY};

const CUTS: CutPoints = CutPoints {
    high: 0.60,
    medium: 0.45,
};

const WEEKEND_MULTIPLIER: f64 = 1.20;

/// Seasonal scaling of the temporal score.
#[must_use]
pub const fn season_multiplier(season: Season) -> f64 {
    match season {
        Season::Winter => 0.90,
        Season::Spring => 1.00,
        Season::Summer => 1.15,
        Season::Autumn => 1.05,
    }
}

/// Weekend days score higher than weekdays.
#[must_use]
pub const fn day_multiplier(day: Weekday) -> f64 {
    if is_weekend(day) {
        WEEKEND_MULTIPLIER
    } else {
        1.0
    }
}

fn lift(in_bucket: u64, total: u64, buckets: u32) -> f64 {
    if total == 0 {
        1.0
    } else {
        ratio(in_bucket, total) * f64::from(buckets)
    }
}

/// Scores when the queried hour, weekday and month sit in a city's
/// incident history.
pub struct TemporalModel {
    min_sample_size: u64,
}

impl TemporalModel {
    /// Cities with fewer than `min_sample_size` incidents get reduced
    /// confidence.
    #[must_use]
    pub const fn new(min_sample_size: u64) -> Self {
        Self { min_sample_size }
    }
}

impl PredictionModel for TemporalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Temporal
    }

    fn predict(&self, features: &FeatureBundle<'_>) -> Prediction {
        let Some(city) = features.city_id() else {
            return Prediction::no_data(features.city.trim(), features.hour);
        };
        let index = features.history;

        let mut same_hour = 0u64;
        let mut dated = 0u64;
        let mut same_day = 0u64;
        let mut same_month = 0u64;
        for incident in index.city_incidents(city) {
            same_hour += u64::from(incident.hour == features.hour);
            if let Some(date) = incident.date {
                dated += 1;
                same_day += u64::from(date.weekday() == features.day_of_week);
                same_month += u64::from(date.month() == features.month);
            }
        }

        let hour_lift = lift(same_hour, index.city_total(city), 24);
        let day_lift = lift(same_day, dated, 7);
        let month_lift = lift(same_month, dated, 12);
        let mean_lift = (hour_lift + day_lift + month_lift) / 3.0;
        let season = season_multiplier(features.season);
        let day = day_multiplier(features.day_of_week);

        let (crime_type, specificity) =
            match modal_crime_type(index, index.cell_incidents(city, features.hour)) {
                Some(label) => (Some(label), CELL_SPECIFICITY),
                None => (modal_crime_type(index, index.city_incidents(city)), CITY_SPECIFICITY),
            };

        let mut factors = vec![
            format!("Hour {:02}:00 lift {hour_lift:.2}", features.hour),
            format!("{} lift {day_lift:.2}", features.day_of_week),
            format!("Month {} lift {month_lift:.2}", features.month),
        ];
        if (season - 1.0).abs() > f64::EPSILON {
            factors.push(format!("{} seasonal multiplier x{season:.2}", features.season));
        }
        if is_weekend(features.day_of_week) {
            factors.push(format!("Weekend multiplier x{WEEKEND_MULTIPLIER:.2}"));
        }

        scored_prediction(
            features,
            city,
            CUTS,
            self.min_sample_size,
            advice,
            ModelScore {
                score: mean_lift * season * day,
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
            "This time slot is historically busy; plan travel outside peak hours."
        }
        RiskLevel::Medium => "Activity at this time is near the city average.",
        RiskLevel::Low => "This time slot is historically quiet.",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::ensemble::DemographicProfile;
    use crate::index::RecordIndex;
    use crate::test_support::{at_hour, record};

    #[test]
    fn multipliers() {
        assert!((season_multiplier(Season::Summer) - 1.15).abs() < f64::EPSILON);
        assert!((season_multiplier(Season::Winter) - 0.90).abs() < f64::EPSILON);
        assert!((day_multiplier(Weekday::Sat) - 1.20).abs() < f64::EPSILON);
        assert!((day_multiplier(Weekday::Tue) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concentrated_hour_is_high_risk() {
        let records: Vec<_> = (0..10).map(|_| at_hour("A", "Theft", 22)).collect();
        let index = RecordIndex::build(&records);
        // 2023-03-15 is the same Wednesday in March every record uses.
        let date = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        let features = FeatureBundle::new(&index, "A", 22, date, DemographicProfile::default());
        let prediction = TemporalModel::new(20).predict(&features);

        // (24 + 7 + 12) / 3 = 14.33, spring x1.0, weekday x1.0
        assert!((prediction.probability - 14.333_333 / 15.333_333).abs() < 1e-5);
        assert_eq!(prediction.risk_level, RiskLevel::High);
        assert_eq!(prediction.predicted_crime_type.as_deref(), Some("Theft"));
        assert!((prediction.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn quiet_slot_is_low_risk() {
        let records = vec![
            record("A", "Theft", "2023-03-15", "10:00"),
            record("A", "Theft", "2023-03-15", "11:00"),
        ];
        let index = RecordIndex::build(&records);
        let date = NaiveDate::from_ymd_opt(2023, 12, 3).unwrap();
        let features = FeatureBundle::new(&index, "A", 3, date, DemographicProfile::default());
        let prediction = TemporalModel::new(20).predict(&features);

        assert!(prediction.probability.abs() < f64::EPSILON);
        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert_eq!(prediction.historical_evidence.same_hour_crimes, 0);
    }
}
