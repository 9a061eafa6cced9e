//! Rule-based pattern recognition and half-year trend analysis.
//!
//! Both work on dated records only; records whose occurrence date does not
//! parse are ignored here.

use chrono::{Datelike as _, NaiveDate};
use crime_insight_analytics_models::{Pattern, PatternKind, Trend, TrendDirection, TrendReport};
use crime_insight_incident_models::is_weekend;

use crate::config::PatternConfig;
use crate::index::{CityId, IndexedIncident, RecordIndex, ratio};

fn is_summer(date: NaiveDate) -> bool {
    (6..=8).contains(&date.month())
}

/// Counts `(matching, dated)` records.
fn share_of<'a>(
    incidents: impl Iterator<Item = &'a IndexedIncident>,
    rule: fn(NaiveDate) -> bool,
) -> (u64, u64) {
    incidents
        .filter_map(|incident| incident.date)
        .fold((0, 0), |(hits, dated), date| (hits + u64::from(rule(date)), dated + 1))
}

struct Rule {
    kind: PatternKind,
    name: &'static str,
    what: &'static str,
    matches: fn(NaiveDate) -> bool,
    threshold: f64,
    confidence: f64,
}

fn evaluate(index: &RecordIndex, rule: &Rule) -> Option<Pattern> {
    let (hits, dated) = share_of(index.incidents().iter(), rule.matches);
    let share = ratio(hits, dated);
    if dated == 0 || share <= rule.threshold {
        return None;
    }

    let mut cities: Vec<(&str, u64)> = index
        .city_names()
        .into_iter()
        .filter_map(|name| {
            let city = index.city_id(name)?;
            let (hits, dated) = share_of(index.city_incidents(city), rule.matches);
            (dated > 0 && ratio(hits, dated) > rule.threshold).then_some((name, hits))
        })
        .collect();
    cities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    log::debug!("Pattern {} fired with share {share:.3}", rule.kind);

    Some(Pattern {
        kind: rule.kind,
        name: rule.name.to_string(),
        description: format!(
            "{:.0}% of dated incidents occurred {}",
            share * 100.0,
            rule.what
        ),
        confidence: rule.confidence,
        share,
        cities: cities.into_iter().map(|(name, _)| name.to_string()).collect(),
    })
}

/// Runs the weekend and summer rules over the whole dataset.
#[must_use]
pub fn detect_patterns(index: &RecordIndex, config: &PatternConfig) -> Vec<Pattern> {
    let rules = [
        Rule {
            kind: PatternKind::WeekendSpike,
            name: "Weekend Crime Spike",
            what: "on weekends",
            matches: |date| is_weekend(date.weekday()),
            threshold: config.weekend_share_threshold,
            confidence: config.weekend_confidence,
        },
        Rule {
            kind: PatternKind::SummerSurge,
            name: "Summer Seasonal Surge",
            what: "in June-August",
            matches: is_summer,
            threshold: config.summer_share_threshold,
            confidence: config.summer_confidence,
        },
    ];

    rules.iter().filter_map(|rule| evaluate(index, rule)).collect()
}

/// Percentage change from `first` to `second`. A zero first half counts as
/// a 100% increase when the second half is non-zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent_change(first: u64, second: u64) -> f64 {
    if first == 0 {
        if second > 0 { 100.0 } else { 0.0 }
    } else {
        (second as f64 - first as f64) / first as f64 * 100.0
    }
}

/// Changes within `deadband` percent either way are Stable.
#[must_use]
pub fn direction(percent_change: f64, deadband: f64) -> TrendDirection {
    if percent_change > deadband {
        TrendDirection::Increasing
    } else if percent_change < -deadband {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

fn trend<'a>(
    city: Option<String>,
    incidents: impl Iterator<Item = &'a IndexedIncident>,
    deadband: f64,
) -> Trend {
    let (first_half, second_half) = incidents
        .filter_map(|incident| incident.date)
        .fold((0, 0), |(first, second), date| {
            if date.month() <= 6 {
                (first + 1, second)
            } else {
                (first, second + 1)
            }
        });
    let change = percent_change(first_half, second_half);
    Trend {
        city,
        first_half,
        second_half,
        percent_change: change,
        direction: direction(change, deadband),
    }
}

/// Compares January-June against July-December, overall and per city.
#[must_use]
pub fn analyze_trends(index: &RecordIndex, config: &PatternConfig) -> TrendReport {
    let deadband = config.trend_deadband_percent;
    let city_trend = |name: &str, city: CityId| {
        trend(Some(name.to_string()), index.city_incidents(city), deadband)
    };

    TrendReport {
        overall: trend(None, index.incidents().iter(), deadband),
        by_city: index
            .city_names()
            .into_iter()
            .filter_map(|name| index.city_id(name).map(|city| city_trend(name, city)))
            .collect(),
    }
}
