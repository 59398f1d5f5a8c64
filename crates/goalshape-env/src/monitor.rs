//! Early-stopping on evaluation success rate

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Tracks recent episode outcomes and signals when training can stop.
///
/// Call [`SuccessRateMonitor::record`] for every finished evaluation episode
/// and [`SuccessRateMonitor::evaluate`] once per evaluation round. Training
/// should stop once the success rate has been strictly above `threshold`
/// for `n_times` consecutive rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessRateMonitor {
    threshold: f64,
    n_times: usize,
    window: usize,
    outcomes: VecDeque<bool>,
    met_threshold_count: usize,
}

impl SuccessRateMonitor {
    /// Default number of outcomes kept
    pub const DEFAULT_WINDOW: usize = 100;

    /// Create a monitor with the default window
    #[must_use]
    pub fn new(threshold: f64, n_times: usize) -> Self {
        Self::with_window(threshold, n_times, Self::DEFAULT_WINDOW)
    }

    /// Create a monitor keeping the last `window` outcomes
    #[must_use]
    pub fn with_window(threshold: f64, n_times: usize, window: usize) -> Self {
        let window = window.max(1);
        Self {
            threshold,
            n_times: n_times.max(1),
            window,
            outcomes: VecDeque::with_capacity(window),
            met_threshold_count: 0,
        }
    }

    /// Record one episode outcome
    pub fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.window {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    /// Fraction of successes in the window, `None` before any outcome
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let successes = self.outcomes.iter().filter(|&&s| s).count();
        #[allow(clippy::cast_precision_loss)]
        let rate = successes as f64 / self.outcomes.len() as f64;
        Some(rate)
    }

    /// Rounds in a row the threshold has been met
    #[must_use]
    pub fn met_threshold_count(&self) -> usize {
        self.met_threshold_count
    }

    /// Close an evaluation round; returns whether training should continue
    pub fn evaluate(&mut self) -> bool {
        let rate = self.success_rate().unwrap_or(0.0);
        if rate > self.threshold {
            self.met_threshold_count += 1;
            info!(
                rate,
                threshold = self.threshold,
                count = self.met_threshold_count,
                "success rate above threshold"
            );
        } else {
            self.met_threshold_count = 0;
        }
        let keep_going = self.met_threshold_count < self.n_times;
        if !keep_going {
            info!(threshold = self.threshold, n_times = self.n_times, "success rate target reached");
        }
        keep_going
    }
}
