//! Small descriptive statistics over aggregated values.

use serde::Serialize;

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        0.0
    } else {
        data.iter().sum::<f64>() / data.len() as f64
    }
}

/// Linear interpolation between closest ranks of a sorted slice.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    if sorted.len() == 1 {
        return sorted[0];
    }

    let clamped_pct = pct.clamp(0.0, 1.0);
    let rank = clamped_pct * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }
}

/// Axis extent as `[min, 97th percentile, max]`. Starts empty and widens as
/// panels are merged in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub p97: f64,
    pub max: f64,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            p97: f64::NEG_INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl AxisRange {
    /// Range of the finite values in `values`; empty when there are none.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);
        Self {
            min: sorted[0],
            p97: percentile(&sorted, 0.97),
            max: sorted[sorted.len() - 1],
        }
    }

    pub fn merge(&mut self, other: &AxisRange) {
        self.min = self.min.min(other.min);
        self.p97 = self.p97.max(other.p97);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}
