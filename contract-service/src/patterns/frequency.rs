//! Frequency classification and confidence scoring.

use crate::models::PatternFrequency;
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Day gaps between consecutive dates. Expects sorted input.
pub fn intervals_in_days(dates: &[NaiveDate]) -> Vec<f64> {
    dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days() as f64)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation. Zero for fewer than two values.
fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Classify by mean interval between occurrences.
pub fn detect_frequency(dates: &[NaiveDate]) -> PatternFrequency {
    let Some(avg) = mean(&intervals_in_days(dates)) else {
        return PatternFrequency::Irregular;
    };
    match avg {
        d if (25.0..=35.0).contains(&d) => PatternFrequency::Monthly,
        d if (80.0..=100.0).contains(&d) => PatternFrequency::Quarterly,
        d if (170.0..=190.0).contains(&d) => PatternFrequency::SemiAnnual,
        d if (350.0..=380.0).contains(&d) => PatternFrequency::Annual,
        _ => PatternFrequency::Irregular,
    }
}

/// Mean day of month, rounded half to even.
pub fn typical_day_of_month(dates: &[NaiveDate]) -> i32 {
    let days: Vec<f64> = dates.iter().map(|d| d.day() as f64).collect();
    mean(&days).map(|m| m.round_ties_even() as i32).unwrap_or(1)
}

/// Confidence in 0.0..=1.0 from occurrence count, interval regularity and
/// amount regularity.
pub fn calculate_confidence(dates: &[NaiveDate], amounts: &[Decimal]) -> f64 {
    let count_score = (dates.len() as f64 / 10.0).min(0.4);

    let timing_score = (0.3 - sample_stdev(&intervals_in_days(dates)) / 100.0).max(0.0);

    let values: Vec<f64> = amounts.iter().filter_map(|a| a.abs().to_f64()).collect();
    let amount_score = match mean(&values) {
        Some(m) if m > 0.0 => (0.3 - sample_stdev(&values) / m).max(0.0),
        _ => 0.0,
    };

    (count_score + timing_score + amount_score).min(1.0)
}
