use serde::Serialize;

/// Mean, median and range of a set of millisecond samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize `samples`, or `None` if there are none.
pub fn summarize(samples: &[f64]) -> Option<Summary> {
    if samples.is_empty() {
        return None;
    }

    Some(Summary {
        mean: calculate_mean(samples),
        median: calculate_median(samples),
        min: calculate_min(samples),
        max: calculate_max(samples),
    })
}

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn calculate_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Middle element of the sorted samples, or the average of the two middle
/// elements when the count is even. Returns 0.0 for an empty slice.
pub fn calculate_median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let len = sorted.len();
    if len.is_multiple_of(2) {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// Smallest sample. Returns 0.0 for an empty slice.
pub fn calculate_min(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest sample. Returns 0.0 for an empty slice.
pub fn calculate_max(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}
