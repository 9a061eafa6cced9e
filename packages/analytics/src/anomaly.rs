//! Distributional anomaly detection between two incident slices.

use std::collections::BTreeMap;

use crime_insight_analytics_models::{Anomaly, AnomalyDimension};
use crime_insight_incident_models::AgeBand;

use crate::config::AnomalyConfig;
use crate::index::{RecordIndex, ratio};

struct Deviation {
    sum: f64,
    buckets: usize,
    max: f64,
    bucket: String,
}

/// Compares two count vectors over the same labeled buckets after
/// normalizing each to a distribution.
fn deviation(labels: &[String], current: &[u64], baseline: &[u64]) -> Deviation {
    let current_total: u64 = current.iter().sum();
    let baseline_total: u64 = baseline.iter().sum();

    let mut result = Deviation {
        sum: 0.0,
        buckets: labels.len(),
        max: 0.0,
        bucket: String::new(),
    };
    for ((label, &c), &b) in labels.iter().zip(current).zip(baseline) {
        let diff = (ratio(c, current_total) - ratio(b, baseline_total)).abs();
        result.sum += diff;
        if diff > result.max || result.bucket.is_empty() {
            result.max = diff;
            result.bucket.clone_from(label);
        }
    }
    result
}

impl Deviation {
    #[allow(clippy::cast_precision_loss)]
    fn average(&self) -> f64 {
        if self.buckets == 0 {
            0.0
        } else {
            self.sum / self.buckets as f64
        }
    }
}

fn age_band_counts(index: &RecordIndex) -> Vec<u64> {
    let mut counts = vec![0; AgeBand::all().len()];
    for age in index.incidents().iter().filter_map(|incident| incident.victim_age) {
        counts[AgeBand::from_age(age).index()] += 1;
    }
    counts
}

fn city_counts(index: &RecordIndex) -> BTreeMap<&str, u64> {
    index
        .city_names()
        .into_iter()
        .filter_map(|name| index.city_id(name).map(|id| (name, index.city_total(id))))
        .collect()
}

fn anomaly(
    dimension: AnomalyDimension,
    score: f64,
    threshold: f64,
    bucket: String,
    what: &str,
) -> Option<Anomaly> {
    (score > threshold).then(|| Anomaly {
        dimension,
        score,
        threshold,
        significance: (score / threshold).min(1.0),
        description: format!(
            "{what} deviates from the baseline by {score:.2} \
             (threshold {threshold:.2}); largest shift in {bucket}"
        ),
        bucket,
    })
}

/// Compares the hour, city, and victim age-band distributions of
/// `current` against `baseline`.
///
/// Hour and city deviations are summed over all buckets; the age-band
/// deviation is averaged over the age bands. An empty slice yields no
/// anomalies, as does the age-band dimension when either slice has no
/// recorded ages.
#[must_use]
pub fn detect_anomalies(
    current: &RecordIndex,
    baseline: &RecordIndex,
    config: &AnomalyConfig,
) -> Vec<Anomaly> {
    if current.is_empty() || baseline.is_empty() {
        return Vec::new();
    }

    let mut anomalies = Vec::new();

    let hours: Vec<String> = (0..24).map(|h| format!("{h:02}:00")).collect();
    let temporal = deviation(&hours, &current.hour_counts(), &baseline.hour_counts());
    anomalies.extend(anomaly(
        AnomalyDimension::Temporal,
        temporal.sum,
        config.temporal_threshold,
        temporal.bucket,
        "Hour-of-day distribution",
    ));

    let current_cities = city_counts(current);
    let baseline_cities = city_counts(baseline);
    let mut cities: Vec<&str> = current_cities
        .keys()
        .chain(baseline_cities.keys())
        .copied()
        .collect();
    cities.sort_unstable();
    cities.dedup();
    let counts = |by_city: &BTreeMap<&str, u64>| -> Vec<u64> {
        cities.iter().map(|city| by_city.get(*city).copied().unwrap_or(0)).collect()
    };
    let labels: Vec<String> = cities.iter().map(ToString::to_string).collect();
    let spatial = deviation(&labels, &counts(&current_cities), &counts(&baseline_cities));
    anomalies.extend(anomaly(
        AnomalyDimension::Spatial,
        spatial.sum,
        config.spatial_threshold,
        spatial.bucket,
        "City distribution",
    ));

    let current_ages = age_band_counts(current);
    let baseline_ages = age_band_counts(baseline);
    if current_ages.iter().any(|&n| n > 0) && baseline_ages.iter().any(|&n| n > 0) {
        let bands: Vec<String> = AgeBand::all().iter().map(ToString::to_string).collect();
        let demographic = deviation(&bands, &current_ages, &baseline_ages);
        anomalies.extend(anomaly(
            AnomalyDimension::Demographic,
            demographic.average(),
            config.demographic_threshold,
            demographic.bucket,
            "Victim age distribution",
        ));
    }

    for found in &anomalies {
        log::info!("Detected {} anomaly: score {:.3}", found.dimension, found.score);
    }

    anomalies
}
