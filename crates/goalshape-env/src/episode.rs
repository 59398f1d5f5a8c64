//! Episode bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reward::StepReward;

/// Episode information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode ID
    pub id: Uuid,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether the goal held on any step
    pub succeeded: bool,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
}

impl Episode {
    /// Start a new episode now
    #[must_use]
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            total_reward: 0.0,
            steps: 0,
            succeeded: false,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Account for one step
    pub fn record_step(&mut self, reward: &StepReward) {
        self.steps += 1;
        self.total_reward += reward.value();
        self.succeeded |= reward.success;
    }

    /// Close the episode; later calls keep the first end time
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Whether [`Episode::finish`] has been called
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}
