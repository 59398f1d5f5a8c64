//! Task configuration, loaded from JSON

use std::path::Path;

use anyhow::{Context, Result};
use goalshape_core::{DefinitionCatalog, GoalExpression, Gripper, ObjectManifest, Simulator};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::reward::RewardConfig;

/// Gripper geometry groups, by geometry name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperConfig {
    /// Left finger pad geometries
    pub left_pad: Vec<String>,
    /// Right finger pad geometries
    pub right_pad: Vec<String>,
    /// Every gripper collision geometry
    pub all: Vec<String>,
}

impl GripperConfig {
    /// Look up every named geometry; names the simulator lacks are skipped
    pub fn resolve(&self, sim: &dyn Simulator) -> Gripper {
        let ids = |names: &[String]| {
            names
                .iter()
                .filter_map(|name| {
                    let id = sim.geom_id(name);
                    if id.is_none() {
                        warn!(geom = %name, "gripper geom not found in simulator");
                    }
                    id
                })
                .collect::<Vec<_>>()
        };
        Gripper {
            left_pad: ids(&self.left_pad),
            right_pad: ids(&self.right_pad),
            all: ids(&self.all),
        }
    }
}

/// Everything needed to set up one goal-conditioned task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Human readable task name
    pub name: String,
    /// Goals that must all hold for success
    pub goal: Vec<GoalExpression>,
    /// Rigid objects and sites registered in the scene
    #[serde(flatten)]
    pub manifest: ObjectManifest,
    /// Per-type object definitions
    pub definitions: DefinitionCatalog,
    /// Gripper geometry groups
    pub gripper: GripperConfig,
    /// Reward assembly
    pub reward: RewardConfig,
    /// Geometries (or bodies) whose centroid replaces the reach target
    pub reward_geoms: Option<Vec<String>>,
}

impl TaskConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse task config")
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid task config {}", path.display()))
    }

    /// Every object name the goals refer to
    #[must_use]
    pub fn goal_objects(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for name in self.goal.iter().flat_map(GoalExpression::object_names) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}
