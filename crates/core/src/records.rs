//! Personal-record rules.
//!
//! Pure comparisons between a performed set and the stored bests; persistence
//! lives in the services layer.

use crate::model::{NewRecord, PersonalRecord, RecordCategory};

/// Epley one-rep-max estimate. A single rep is its own maximum.
#[must_use]
pub fn estimated_one_rep_max(weight: f64, reps: u32) -> f64 {
    match reps {
        0 => 0.0,
        1 => weight,
        r => weight * (1.0 + f64::from(r) / 30.0),
    }
}

/// Value a set scores in `category`.
#[must_use]
pub fn category_value(category: RecordCategory, weight: f64, reps: u32) -> f64 {
    match category {
        RecordCategory::MaxWeight => weight,
        RecordCategory::MaxReps => f64::from(reps),
        RecordCategory::MaxVolume => weight * f64::from(reps),
        RecordCategory::EstimatedOneRepMax => estimated_one_rep_max(weight, reps),
    }
}

/// Categories in which `(weight, reps)` strictly beats `bests`.
///
/// A category with no stored best counts as broken, so the first performance
/// of an exercise establishes every record.
#[must_use]
pub fn broken_records(bests: &[PersonalRecord], weight: f64, reps: u32) -> Vec<NewRecord> {
    if weight <= 0.0 || reps == 0 {
        return Vec::new();
    }

    RecordCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let value = category_value(category, weight, reps);
            let previous = bests
                .iter()
                .filter(|r| r.category == category)
                .map(|r| r.value)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
            match previous {
                Some(best) if value <= best => None,
                _ => Some(NewRecord {
                    category,
                    value,
                    previous,
                }),
            }
        })
        .collect()
}
