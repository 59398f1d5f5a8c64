//! Per-step reward assembly

use serde::{Deserialize, Serialize};

/// How the per-step reward is assembled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Paid on every step the goal holds
    pub sparse_success: f64,
    /// Multiplies the whole reward when set
    pub reward_scale: Option<f64>,
    /// Add the shaped reward of the goal's first predicate
    pub dense: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            sparse_success: 1.0,
            reward_scale: None,
            dense: true,
        }
    }
}

impl RewardConfig {
    /// Combine one step's success flag and shaped reward
    #[must_use]
    pub fn assemble(&self, success: bool, shaped: f64) -> StepReward {
        let sparse = if success { self.sparse_success } else { 0.0 };
        let dense = if self.dense { shaped } else { 0.0 };
        StepReward {
            success,
            shaped,
            total: (sparse + dense) * self.reward_scale.unwrap_or(1.0),
        }
    }
}

/// Reward for one environment step, with the parts it was built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReward {
    /// Whether every goal held
    pub success: bool,
    /// Unscaled dense reward, reported even when not paid out
    pub shaped: f64,
    /// Reward handed to the learner
    pub total: f64,
}

impl StepReward {
    /// Get the reward value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.total
    }
}

impl From<StepReward> for f64 {
    fn from(reward: StepReward) -> Self {
        reward.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reward_combination() {
        let reward = RewardConfig::default();
        assert_relative_eq!(reward.assemble(true, 0.05).value(), 1.05, epsilon = 1e-12);
        assert_relative_eq!(reward.assemble(false, 0.05).value(), 0.05);

        let sparse_only = RewardConfig {
            dense: false,
            reward_scale: Some(0.5),
            ..Default::default()
        };
        let step = sparse_only.assemble(true, 0.3);
        assert_relative_eq!(step.value(), 0.5);
        assert_relative_eq!(step.shaped, 0.3);
        assert_relative_eq!(f64::from(sparse_only.assemble(false, 0.3)), 0.0);
    }

    #[test]
    fn test_scale_applies_to_dense_part() {
        let scaled = RewardConfig {
            reward_scale: Some(10.0),
            ..Default::default()
        };
        assert_relative_eq!(scaled.assemble(false, 0.02).value(), 0.2, epsilon = 1e-12);
    }
}
