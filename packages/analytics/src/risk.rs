//! Safety ratings and percentile-based risk classification.

use std::collections::BTreeMap;

use crime_insight_analytics_models::{CityStats, CrimeTypeStats, HourRisk, RiskLevel};

use crate::config::HourSplit;
use crate::index::{CityId, CrimeTypeId, IndexedIncident, RecordIndex, mode, modal_crime_type, ratio};

/// Rating of a city with no penalties at all.
pub const BASELINE_RATING: f64 = 5.0;
/// Lowest possible rating.
pub const MIN_RATING: f64 = 1.0;

const LOW_RISK_RATING: f64 = 3.5;
const MEDIUM_RISK_RATING: f64 = 2.5;

/// Linear-interpolation percentile over an ascending slice.
///
/// `fraction` is in `[0, 1]`. Returns `0.0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = fraction.clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Penalty for the city's share of all incidents, capped at 1.5.
#[must_use]
pub fn share_penalty(share: f64) -> f64 {
    (share * 10.0).min(1.5)
}

/// Signed closure term: positive is a bonus, negative a penalty.
#[must_use]
pub fn closure_adjustment(closure_rate: f64) -> f64 {
    if closure_rate > 0.5 {
        (closure_rate - 0.5).min(0.5)
    } else if closure_rate < 0.5 {
        -((0.5 - closure_rate) * 2.0).min(1.0)
    } else {
        0.0
    }
}

/// Penalty for the share of incidents involving a weapon, capped at 1.0.
#[must_use]
pub fn weapon_penalty(weapon_rate: f64) -> f64 {
    (weapon_rate * 1.5).min(1.0)
}

/// Penalty for the share of violent incidents, capped at 1.5.
#[must_use]
pub fn violent_penalty(violent_rate: f64) -> f64 {
    (violent_rate * 2.0).min(1.5)
}

/// Rates on `[1.0, 5.0]`, higher is safer. All arguments are fractions
/// in `[0, 1]`.
#[must_use]
pub fn safety_rating(share: f64, closure_rate: f64, weapon_rate: f64, violent_rate: f64) -> f64 {
    let rating = BASELINE_RATING - share_penalty(share) + closure_adjustment(closure_rate)
        - weapon_penalty(weapon_rate)
        - violent_penalty(violent_rate);
    rating.clamp(MIN_RATING, BASELINE_RATING)
}

/// Maps a safety rating to a discrete risk level.
#[must_use]
pub fn risk_from_rating(rating: f64) -> RiskLevel {
    if rating >= LOW_RISK_RATING {
        RiskLevel::Low
    } else if rating >= MEDIUM_RISK_RATING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Rates and classifies one city.
#[must_use]
pub fn score_city<'a>(
    incidents: impl IntoIterator<Item = &'a IndexedIncident>,
    dataset_total: u64,
) -> (f64, RiskLevel) {
    let tally = Tally::of(incidents);
    let rating = tally.rating(dataset_total);
    (rating, risk_from_rating(rating))
}

#[derive(Default)]
struct Tally {
    total: u64,
    closed: u64,
    weapon: u64,
    violent: u64,
}

impl Tally {
    fn of<'a>(incidents: impl IntoIterator<Item = &'a IndexedIncident>) -> Self {
        incidents.into_iter().fold(Self::default(), |mut tally, incident| {
            tally.total += 1;
            tally.closed += u64::from(incident.closed);
            tally.weapon += u64::from(incident.weapon);
            tally.violent += u64::from(incident.violent);
            tally
        })
    }

    fn rating(&self, dataset_total: u64) -> f64 {
        safety_rating(
            ratio(self.total, dataset_total),
            ratio(self.closed, self.total),
            ratio(self.weapon, self.total),
            ratio(self.violent, self.total),
        )
    }
}

/// Largest band that stays within `fraction` of `buckets`, rounding up.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn band_size(fraction: f64, buckets: usize) -> usize {
    (fraction.clamp(0.0, 1.0) * buckets as f64 - 1e-9).ceil().max(0.0) as usize
}

/// Number of leading tiers whose combined length fits in `limit`.
fn tiers_within(tier_lengths: impl Iterator<Item = usize>, limit: usize) -> usize {
    let mut size = 0;
    tier_lengths
        .take_while(|&len| {
            size += len;
            size <= limit
        })
        .count()
}

/// Classifies buckets by the rank of their count.
///
/// The top `1 - high` and bottom `low` fractions of the buckets are High and
/// Low, everything else Medium. Equal counts never land in different bands:
/// a tier of tied buckets joins a band only if the whole tier fits, so
/// neither band grows past its fraction rounded up. All-equal counts are
/// Medium.
#[must_use]
pub fn classify_buckets(counts: &[u64], (low, high): (f64, f64)) -> Vec<RiskLevel> {
    let mut levels = vec![RiskLevel::Medium; counts.len()];

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by_key(|&i| counts[i]);
    let tiers: Vec<&[usize]> = order.chunk_by(|&a, &b| counts[a] == counts[b]).collect();
    if tiers.len() < 2 {
        return levels;
    }

    let high_tiers = tiers_within(
        tiers.iter().rev().map(|tier| tier.len()),
        band_size(1.0 - high, counts.len()),
    );
    let rest = tiers.len() - high_tiers;
    let low_tiers = tiers_within(
        tiers[..rest].iter().map(|tier| tier.len()),
        band_size(low, counts.len()),
    );

    for &bucket in tiers[rest..].iter().copied().flatten() {
        levels[bucket] = RiskLevel::High;
    }
    for &bucket in tiers[..low_tiers].iter().copied().flatten() {
        levels[bucket] = RiskLevel::Low;
    }
    levels
}

/// Classifies every hour of the day by incident count.
#[must_use]
pub fn classify_hours(hour_counts: &[u64; 24], split: HourSplit) -> Vec<HourRisk> {
    classify_buckets(hour_counts, split.percentiles())
        .into_iter()
        .zip(hour_counts)
        .zip(0u8..)
        .map(|((risk_level, &incident_count), hour)| HourRisk {
            hour,
            incident_count,
            risk_level,
        })
        .collect()
}

/// Summaries for every city, sorted by total incidents descending then name.
#[must_use]
pub fn city_stats(index: &RecordIndex) -> Vec<CityStats> {
    let mut stats: Vec<CityStats> = index
        .city_names()
        .into_iter()
        .filter_map(|name| index.city_id(name))
        .map(|city| city_summary(index, city))
        .collect();
    stats.sort_by(|a, b| {
        b.total_incidents
            .cmp(&a.total_incidents)
            .then_with(|| a.city.cmp(&b.city))
    });
    stats
}

#[allow(clippy::cast_precision_loss)]
fn city_summary(index: &RecordIndex, city: CityId) -> CityStats {
    let tally = Tally::of(index.city_incidents(city));
    let rating = tally.rating(index.total());

    let (age_sum, age_count) = index
        .city_incidents(city)
        .filter_map(|incident| incident.victim_age)
        .fold((0u64, 0u64), |(sum, n), age| (sum + u64::from(age), n + 1));

    CityStats {
        city: index.city_name(city).to_string(),
        total_incidents: tally.total,
        closed_cases: tally.closed,
        average_victim_age: (age_count > 0).then(|| age_sum as f64 / age_count as f64),
        most_common_crime: modal_crime_type(index, index.city_incidents(city)).map(str::to_string),
        safety_rating: rating,
        risk_level: risk_from_rating(rating),
        latest_incident: index
            .city_incidents(city)
            .filter_map(|incident| incident.occurred_at)
            .max(),
        closure_rate: ratio(tally.closed, tally.total),
        weapon_rate: ratio(tally.weapon, tally.total),
        violent_rate: ratio(tally.violent, tally.total),
        data_quality: index.city_data_quality(city),
    }
}

/// Summaries for every crime type, sorted by count descending then label.
#[must_use]
pub fn crime_type_stats(index: &RecordIndex) -> Vec<CrimeTypeStats> {
    let mut stats: Vec<CrimeTypeStats> = index
        .crime_type_names()
        .into_iter()
        .filter_map(|name| index.crime_type_id(name))
        .map(|crime_type| crime_type_summary(index, crime_type))
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.crime_type.cmp(&b.crime_type)));
    stats
}

fn crime_type_summary(index: &RecordIndex, crime_type: CrimeTypeId) -> CrimeTypeStats {
    let mut count = 0u64;
    let mut closed = 0u64;
    let mut cities: BTreeMap<&str, u64> = BTreeMap::new();
    let mut hours: BTreeMap<u8, u64> = BTreeMap::new();

    for incident in index.crime_type_incidents(crime_type) {
        count += 1;
        closed += u64::from(incident.closed);
        *cities.entry(index.city_name(incident.city)).or_default() += 1;
        *hours.entry(incident.hour).or_default() += 1;
    }

    CrimeTypeStats {
        crime_type: index.crime_type_name(crime_type).to_string(),
        count,
        share: ratio(count, index.total()),
        closure_rate: ratio(closed, count),
        most_affected_city: mode(&cities).map(str::to_string),
        peak_hour: mode(&hours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at_hour, record};

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.5) - 3.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 1.0) - 5.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.1) - 1.4).abs() < 1e-9);
        assert!(percentile(&[], 0.5).abs() < f64::EPSILON);
        assert!((percentile(&[7.0], 0.9) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rating_is_bounded() {
        assert!((safety_rating(0.0, 1.0, 0.0, 0.0) - BASELINE_RATING).abs() < f64::EPSILON);
        assert!((safety_rating(1.0, 0.0, 1.0, 1.0) - MIN_RATING).abs() < f64::EPSILON);

        for step in 0..=10 {
            let x = f64::from(step) / 10.0;
            for &(share, closure, weapon, violent) in
                &[(x, x, x, x), (x, 1.0 - x, x, 0.0), (0.0, x, 1.0 - x, x)]
            {
                let rating = safety_rating(share, closure, weapon, violent);
                assert!((MIN_RATING..=BASELINE_RATING).contains(&rating));
            }
        }
    }

    #[test]
    fn rating_is_monotone_in_every_penalty() {
        let base = (0.05, 0.5, 0.1, 0.1);
        let rating = |(s, c, w, v): (f64, f64, f64, f64)| safety_rating(s, c, w, v);
        let r0 = rating(base);
        assert!(rating((0.1, 0.5, 0.1, 0.1)) <= r0);
        assert!(rating((0.05, 0.3, 0.1, 0.1)) <= r0);
        assert!(rating((0.05, 0.5, 0.3, 0.1)) <= r0);
        assert!(rating((0.05, 0.5, 0.1, 0.3)) <= r0);
        assert!(rating((0.05, 0.8, 0.1, 0.1)) >= r0);
    }

    #[test]
    fn closure_term_is_capped_both_ways() {
        assert!((closure_adjustment(1.0) - 0.5).abs() < f64::EPSILON);
        assert!((closure_adjustment(0.0) + 1.0).abs() < f64::EPSILON);
        assert!(closure_adjustment(0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_level_is_a_function_of_rating() {
        assert_eq!(risk_from_rating(5.0), RiskLevel::Low);
        assert_eq!(risk_from_rating(3.5), RiskLevel::Low);
        assert_eq!(risk_from_rating(3.49), RiskLevel::Medium);
        assert_eq!(risk_from_rating(2.5), RiskLevel::Medium);
        assert_eq!(risk_from_rating(2.49), RiskLevel::High);
        assert_eq!(risk_from_rating(1.0), RiskLevel::High);
    }

    #[test]
    fn uniform_hours_are_all_medium() {
        let hours = classify_hours(&[4; 24], HourSplit::Standard);
        assert_eq!(hours.len(), 24);
        assert!(hours.iter().all(|h| h.risk_level == RiskLevel::Medium));
    }

    #[test]
    fn distinct_hours_respect_split_fractions() {
        let counts: [u64; 24] = std::array::from_fn(|h| h as u64 * 3 + 1);
        for split in [HourSplit::Standard, HourSplit::Wide] {
            let (low, high) = split.percentiles();
            let hours = classify_hours(&counts, split);
            let highs = hours.iter().filter(|h| h.risk_level == RiskLevel::High).count() as f64;
            let lows = hours.iter().filter(|h| h.risk_level == RiskLevel::Low).count() as f64;
            assert!((highs - 24.0 * (1.0 - high)).abs() <= 1.0 + 1e-9, "{split:?} highs {highs}");
            assert!((lows - 24.0 * low).abs() <= 1.0 + 1e-9, "{split:?} lows {lows}");
            assert_eq!(hours[23].risk_level, RiskLevel::High);
            assert_eq!(hours[0].risk_level, RiskLevel::Low);
        }
    }

    #[test]
    fn oversized_tie_stays_medium() {
        let mut counts = [0u64; 24];
        counts[20] = 9;
        let hours = classify_hours(&counts, HourSplit::Standard);
        assert_eq!(hours[20].risk_level, RiskLevel::High);
        assert!(hours.iter().filter(|h| h.hour != 20).all(|h| h.risk_level == RiskLevel::Medium));
    }

    #[test]
    fn tied_counts_never_overfill_a_band() {
        let mut counts = [5u64; 24];
        counts[3] = 0;
        let levels = classify_buckets(&counts, (0.10, 0.90));
        let lows = levels.iter().filter(|&&l| l == RiskLevel::Low).count();
        let highs = levels.iter().filter(|&&l| l == RiskLevel::High).count();
        assert_eq!((lows, highs), (1, 0));
        assert_eq!(levels[3], RiskLevel::Low);

        let mut counts: [u64; 24] = std::array::from_fn(|h| h as u64);
        counts[22] = 23;
        let levels = classify_buckets(&counts, (0.10, 0.90));
        assert_eq!(levels[22], RiskLevel::High);
        assert_eq!(levels[23], RiskLevel::High);
        assert_eq!(levels[21], RiskLevel::High);
        assert_eq!(levels[20], RiskLevel::Medium);
        for (low, high) in [(0.10, 0.90), (0.15, 0.85)] {
            let levels = classify_buckets(&[1, 1, 2, 2, 2, 3, 3, 3, 3, 9], (low, high));
            let lows = levels.iter().filter(|&&l| l == RiskLevel::Low).count() as f64;
            let highs = levels.iter().filter(|&&l| l == RiskLevel::High).count() as f64;
            assert!(lows <= 10.0 * low + 1.0);
            assert!(highs <= 10.0 * (1.0 - high) + 1.0);
        }
    }

    #[test]
    fn bands_never_overlap_on_tiny_inputs() {
        assert_eq!(classify_buckets(&[], (0.10, 0.90)), Vec::new());
        assert_eq!(classify_buckets(&[7], (0.10, 0.90)), vec![RiskLevel::Medium]);
        assert_eq!(
            classify_buckets(&[2, 1], (0.10, 0.90)),
            vec![RiskLevel::High, RiskLevel::Low]
        );
    }

    #[test]
    fn city_stats_sorted_and_summarized() {
        let mut closed = at_hour("B", "Assault", 9);
        closed.case_closed = true;
        closed.weapon = "Knife".to_string();
        let records = vec![
            at_hour("A", "Theft", 1),
            closed,
            at_hour("B", "Theft", 2),
            record("C", "Fraud", "bad", "bad"),
        ];
        let index = RecordIndex::build(&records);
        let stats = city_stats(&index);

        assert_eq!(
            stats.iter().map(|s| s.city.as_str()).collect::<Vec<_>>(),
            vec!["B", "A", "C"]
        );
        let b = &stats[0];
        assert_eq!(b.total_incidents, 2);
        assert_eq!(b.closed_cases, 1);
        assert_eq!(b.most_common_crime.as_deref(), Some("Assault"));
        assert!((b.weapon_rate - 0.5).abs() < f64::EPSILON);
        assert!((b.violent_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(b.average_victim_age, Some(30.0));
        assert!(b.latest_incident.is_some());
        assert_eq!(stats[2].latest_incident, None);
        assert!(stats.iter().all(|s| (MIN_RATING..=BASELINE_RATING).contains(&s.safety_rating)));
        assert!(stats.iter().all(|s| s.risk_level == risk_from_rating(s.safety_rating)));
    }

    #[test]
    fn crime_type_stats_report_peaks() {
        let records = vec![
            at_hour("A", "Theft", 1),
            at_hour("B", "Theft", 1),
            at_hour("B", "Theft", 5),
            at_hour("A", "Fraud", 3),
        ];
        let index = RecordIndex::build(&records);
        let stats = crime_type_stats(&index);

        assert_eq!(stats[0].crime_type, "Theft");
        assert_eq!(stats[0].count, 3);
        assert!((stats[0].share - 0.75).abs() < f64::EPSILON);
        assert_eq!(stats[0].most_affected_city.as_deref(), Some("B"));
        assert_eq!(stats[0].peak_hour, Some(1));
        assert_eq!(stats[1].crime_type, "Fraud");
    }

    #[test]
    fn score_city_matches_city_stats() {
        let records = vec![at_hour("A", "Robbery", 1), at_hour("A", "Theft", 2)];
        let index = RecordIndex::build(&records);
        let a = index.city_id("A").unwrap();
        let (rating, level) = score_city(index.city_incidents(a), index.total());
        let stats = city_stats(&index);
        assert!((stats[0].safety_rating - rating).abs() < f64::EPSILON);
        assert_eq!(stats[0].risk_level, level);
    }
}
