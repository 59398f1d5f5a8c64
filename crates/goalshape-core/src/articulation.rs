//! Open/closed thresholds for articulated objects

use serde::{Deserialize, Serialize};

/// Joint-position bounds for "fully open" and "fully closed".
///
/// Each range is a small leeway interval. Whether opening moves the joint
/// towards smaller or larger values differs between assets, so the
/// direction is derived from the ranges rather than assumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticulationRange {
    /// Joint positions considered fully open
    pub default_open_ranges: Vec<f64>,
    /// Joint positions considered fully closed
    pub default_close_ranges: Vec<f64>,
}

/// The innermost ends of the open and closed leeway intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenExtrema {
    /// End of the open range nearest to the closed side
    pub fully_open: f64,
    /// End of the closed range nearest to the open side
    pub fully_closed: f64,
}

impl OpenExtrema {
    /// Joint position separating "open by `amount`" from "not yet"
    #[must_use]
    pub fn threshold(&self, amount: f64) -> f64 {
        amount * self.fully_open + (1.0 - amount) * self.fully_closed
    }

    /// Whether `qpos` lies strictly on the open side of the threshold
    #[must_use]
    pub fn is_open(&self, qpos: f64, amount: f64) -> bool {
        let threshold = self.threshold(amount);
        if self.fully_open < self.fully_closed {
            qpos < threshold
        } else {
            qpos > threshold
        }
    }
}

impl ArticulationRange {
    /// Create a range from open and closed bounds
    #[must_use]
    pub fn new(open: impl Into<Vec<f64>>, close: impl Into<Vec<f64>>) -> Self {
        Self {
            default_open_ranges: open.into(),
            default_close_ranges: close.into(),
        }
    }

    /// Whether both ranges carry at least one bound
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.default_open_ranges.is_empty() && !self.default_close_ranges.is_empty()
    }

    /// Innermost extrema, or `None` when either range is empty
    #[must_use]
    pub fn extrema(&self) -> Option<OpenExtrema> {
        if !self.is_defined() {
            return None;
        }
        let open = &self.default_open_ranges;
        let close = &self.default_close_ranges;
        let min = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let max = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if open[0] < close[0] {
            Some(OpenExtrema {
                fully_open: max(open),
                fully_closed: min(close),
            })
        } else {
            Some(OpenExtrema {
                fully_open: min(open),
                fully_closed: max(close),
            })
        }
    }

    /// Whether a joint at `qpos` is open by `amount` in [0, 1].
    ///
    /// An object without ranges is treated as closed.
    #[must_use]
    pub fn is_partially_open(&self, qpos: f64, amount: f64) -> bool {
        self.extrema().is_some_and(|e| e.is_open(qpos, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cabinet() -> ArticulationRange {
        ArticulationRange::new(vec![-0.16, -0.14], vec![0.0, 0.01])
    }

    #[test]
    fn test_negative_opening_extrema() {
        let e = cabinet().extrema().unwrap();
        assert_eq!(e.fully_open, -0.14);
        assert_eq!(e.fully_closed, 0.0);
    }

    #[test]
    fn test_cabinet_scenario() {
        let range = cabinet();
        assert!(range.is_partially_open(-0.15, 1.0));
        assert!(!range.is_partially_open(-0.13, 1.0));
        assert!(range.is_partially_open(-0.08, 0.5));
        // at the closed end nothing counts as open
        assert!(!range.is_partially_open(0.005, 0.0));
    }

    #[test]
    fn test_positive_opening_direction() {
        let microwave = ArticulationRange::new(vec![2.0, 2.5], vec![0.0, 0.1]);
        let e = microwave.extrema().unwrap();
        assert_eq!(e.fully_open, 2.0);
        assert_eq!(e.fully_closed, 0.1);
        assert!(microwave.is_partially_open(2.1, 1.0));
        assert!(!microwave.is_partially_open(1.9, 1.0));
    }

    #[test]
    fn test_open_range_above_close_range() {
        // open values numerically larger than the closed ones
        let drawer = ArticulationRange::new(vec![0.14, 0.16], vec![-0.01, 0.0]);
        let e = drawer.extrema().unwrap();
        assert_eq!(e.fully_open, 0.14);
        assert_eq!(e.fully_closed, 0.0);
        assert!(drawer.is_partially_open(0.15, 1.0));
    }

    #[test]
    fn test_undefined_ranges_are_closed() {
        let range = ArticulationRange::new(Vec::new(), vec![0.0]);
        assert!(range.extrema().is_none());
        assert!(!range.is_partially_open(-1.0, 0.0));
    }
}
