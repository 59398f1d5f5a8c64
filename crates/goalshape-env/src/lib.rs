//! Task-level hooks for goal-conditioned manipulation environments
//!
//! This crate wraps the goal interpreter and reward shaper from
//! `goalshape-core` into what an environment's step loop needs:
//! - JSON task configuration
//! - per-step success and reward ([`GoalTask`])
//! - episode bookkeeping and a success-rate stopping rule

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod episode;
pub mod monitor;
pub mod reward;
pub mod task;

pub use config::{GripperConfig, TaskConfig};
pub use episode::Episode;
pub use monitor::SuccessRateMonitor;
pub use reward::{RewardConfig, StepReward};
pub use task::GoalTask;

// Re-export core types
pub use goalshape_core::{GoalError, GoalExpression, Pose, SceneSnapshot, Simulator};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Episode, GoalTask, RewardConfig, StepReward, SuccessRateMonitor, TaskConfig};
    pub use goalshape_core::prelude::*;
}
