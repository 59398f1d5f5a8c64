//! The per-environment goal task the step loop talks to

use goalshape_core::{
    Atom, BoundGoal, DenseRewardShaper, EvalContext, GoalExpression, Gripper, ObjectRegistry,
    Result, Simulator,
};
use tracing::{debug, info, trace, warn};

use crate::config::TaskConfig;
use crate::episode::Episode;
use crate::reward::StepReward;

/// Goal checking and reward for one environment instance.
///
/// Built once per environment from a [`TaskConfig`]; every malformed goal
/// is rejected here, so per-step evaluation only fails when the simulator
/// lacks an entity the goal reads.
#[derive(Debug)]
pub struct GoalTask {
    config: TaskConfig,
    registry: ObjectRegistry,
    gripper: Gripper,
    goals: Vec<BoundGoal>,
    shaper: Option<DenseRewardShaper>,
    episode: Episode,
    step: usize,
}

impl GoalTask {
    /// Resolve the goal's objects and validate every goal against `sim`
    pub fn new(config: TaskConfig, sim: &dyn Simulator) -> Result<Self> {
        if config.goal.is_empty() {
            warn!(task = %config.name, "task has no goals; success holds trivially");
        }
        let mut task = Self {
            config,
            registry: ObjectRegistry::new(),
            gripper: Gripper::default(),
            goals: Vec::new(),
            shaper: None,
            episode: Episode::start(),
            step: 0,
        };
        task.bind(sim)?;
        info!(
            task = %task.config.name,
            goals = task.goals.len(),
            objects = task.registry.len(),
            dense = task.shaper.is_some(),
            "goal task ready"
        );
        Ok(task)
    }

    fn bind(&mut self, sim: &dyn Simulator) -> Result<()> {
        let mut registry = ObjectRegistry::new();
        registry.resolve(
            self.config.goal_objects(),
            &self.config.manifest,
            sim,
            &self.config.definitions,
        )?;
        let goals = self
            .config
            .goal
            .iter()
            .map(|goal| BoundGoal::bind(goal, &registry))
            .collect::<Result<Vec<_>>>()?;
        let gripper = self.config.gripper.resolve(sim);

        self.shaper = self.shaping_atom().map(|atom| {
            let ctx = EvalContext::new(sim, &registry, &gripper);
            DenseRewardShaper::new(atom, &ctx, self.config.reward_geoms.clone())
        });
        self.registry = registry;
        self.goals = goals;
        self.gripper = gripper;
        Ok(())
    }

    /// The predicate call dense shaping follows
    #[must_use]
    pub fn shaping_atom(&self) -> Option<&Atom> {
        self.config.goal.first().and_then(GoalExpression::first_atom)
    }

    /// The configuration this task was built from
    #[must_use]
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Resolved goal objects
    #[must_use]
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The episode in progress
    #[must_use]
    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    /// Steps taken since the last reset
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step
    }

    /// Whether every goal holds at the current step
    pub fn success(&self, sim: &dyn Simulator) -> Result<bool> {
        let ctx = EvalContext::new(sim, &self.registry, &self.gripper);
        for goal in &self.goals {
            if !goal.evaluate(&ctx)? {
                return Ok(false);
            }
        }
        trace!(step = self.step, "all goals hold");
        Ok(true)
    }

    /// Dense reward for step `step` of the current episode; 0.0 when the
    /// goal has no shaping rule
    pub fn shaped_reward(&mut self, sim: &dyn Simulator, step: usize) -> f64 {
        let Some(shaper) = self.shaper.as_mut() else {
            return 0.0;
        };
        let ctx = EvalContext::new(sim, &self.registry, &self.gripper);
        shaper.step(&ctx, step)
    }

    /// Evaluate one step: success, shaped reward, and the assembled total
    pub fn step(&mut self, sim: &dyn Simulator) -> Result<StepReward> {
        let success = self.success(sim)?;
        let shaped = self.shaped_reward(sim, self.step);
        let reward = self.config.reward.assemble(success, shaped);
        self.episode.record_step(&reward);
        self.step += 1;
        debug!(step = self.step, success, shaped, total = reward.total, "task step");
        Ok(reward)
    }

    /// Close the current episode and start a new one from `sim`'s state.
    ///
    /// Objects are resolved again, since a reset may rebuild the scene, and
    /// shaping starts from fresh memory. Returns the finished episode.
    ///
    /// If `sim` no longer resolves, the current episode stays open and dense
    /// shaping is switched off until a later reset succeeds.
    pub fn reset(&mut self, sim: &dyn Simulator) -> Result<Episode> {
        if let Err(err) = self.bind(sim) {
            warn!(task = %self.config.name, error = %err, "reset failed to resolve scene");
            self.shaper = None;
            return Err(err);
        }
        self.episode.finish();
        let finished = std::mem::replace(&mut self.episode, Episode::start());
        info!(
            task = %self.config.name,
            episode = %finished.id,
            steps = finished.steps,
            total_reward = finished.total_reward,
            succeeded = finished.succeeded,
            "episode finished"
        );
        self.step = 0;
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::RewardConfig;
    use approx::assert_relative_eq;
    use goalshape_core::{DefinitionCatalog, GoalError, Pose, SceneSnapshot};
    use nalgebra::{Point3, Vector3};

    const DRAWER_TASK: &str = r#"{
        "name": "open the top drawer of the cabinet",
        "goal": [["Open", "wooden_cabinet_1_top_region"]],
        "objects": [
            { "name": "wooden_cabinet_1", "contact_geoms": ["wooden_cabinet_1_g0"], "joints": ["wooden_cabinet_1_top_level"] }
        ],
        "sites": [
            { "name": "wooden_cabinet_1_top_region", "parent": "wooden_cabinet_1", "joints": ["wooden_cabinet_1_top_level"] }
        ],
        "definitions": {
            "wooden_cabinet": {
                "articulation": { "default_open_ranges": [-0.16, -0.14], "default_close_ranges": [0.0, 0.01] },
                "sites": { "top_region": { "body": "cabinet_top", "geom_offsets": [[0.0, 0.0, 0.0]] } }
            }
        },
        "gripper": {
            "left_pad": ["gripper0_finger1_pad_collision"],
            "right_pad": ["gripper0_finger2_pad_collision"]
        }
    }"#;

    fn drawer_scene(qpos: f64) -> SceneSnapshot {
        let mut sim = SceneSnapshot::new();
        sim.set_body("wooden_cabinet_1_main", Pose::at(Point3::new(0.0, -0.2, 0.9)));
        sim.set_body("wooden_cabinet_1_cabinet_top", Pose::at(Point3::new(0.0, -0.2, 1.1)));
        sim.add_geom("wooden_cabinet_1_g0", "wooden_cabinet_1_main", Vector3::new(0.0, 0.0, 0.05));
        sim.add_geom("wooden_cabinet_1_g1", "wooden_cabinet_1_cabinet_top", Vector3::zeros());
        sim.add_geom("gripper0_finger1_pad_collision", "gripper0_left", Vector3::zeros());
        sim.add_geom("gripper0_finger2_pad_collision", "gripper0_right", Vector3::zeros());
        sim.set_site("wooden_cabinet_1_top_region", Pose::at(Point3::new(0.0, -0.2, 1.1)));
        sim.set_joint("wooden_cabinet_1_top_level", qpos);
        sim.set_grip_site(Point3::new(0.0, 0.3, 1.3));
        sim
    }

    fn drawer_task(sim: &SceneSnapshot) -> GoalTask {
        GoalTask::new(TaskConfig::from_json_str(DRAWER_TASK).unwrap(), sim).unwrap()
    }

    #[test]
    fn test_open_drawer_episode() {
        let mut sim = drawer_scene(0.0);
        let mut task = drawer_task(&sim);
        assert_eq!(task.registry().len(), 1);
        assert_eq!(task.shaping_atom().unwrap().predicate, "Open");

        let first = task.step(&sim).unwrap();
        assert!(!first.success);
        assert_eq!(first.total, 0.0);

        sim.set_joint("wooden_cabinet_1_top_level", -0.05);
        let second = task.step(&sim).unwrap();
        assert!(!second.success);
        assert_relative_eq!(second.shaped, 0.05, epsilon = 1e-12);

        sim.set_joint("wooden_cabinet_1_top_level", -0.15);
        let third = task.step(&sim).unwrap();
        assert!(third.success);
        assert_relative_eq!(third.total, 1.0 + 0.15, epsilon = 1e-12);

        assert_eq!(task.episode().steps, 3);
        assert!(task.episode().succeeded);
    }

    #[test]
    fn test_reset_starts_fresh_episode() {
        let mut sim = drawer_scene(0.0);
        let mut task = drawer_task(&sim);
        sim.set_joint("wooden_cabinet_1_top_level", -0.1);
        task.step(&sim).unwrap();

        let finished = task.reset(&sim).unwrap();
        assert!(finished.is_finished());
        assert_eq!(finished.steps, 1);
        assert_ne!(finished.id, task.episode().id);
        assert_eq!(task.step_index(), 0);

        // shaping memory now starts from the open drawer
        assert_eq!(task.shaped_reward(&sim, 0), 0.0);
        sim.set_joint("wooden_cabinet_1_top_level", -0.12);
        assert_relative_eq!(task.shaped_reward(&sim, 1), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_failed_reset_keeps_episode() {
        let mut sim = drawer_scene(0.0);
        let mut task = drawer_task(&sim);
        sim.set_joint("wooden_cabinet_1_top_level", -0.05);
        task.step(&sim).unwrap();
        let id = task.episode().id;

        // the site can no longer be resolved
        task.config.definitions = DefinitionCatalog::new();
        let err = task.reset(&sim).unwrap_err();
        assert!(matches!(err, GoalError::UnknownDefinition(_)));

        assert_eq!(task.episode().id, id);
        assert_eq!(task.episode().steps, 1);
        assert!(!task.episode().is_finished());
        assert_eq!(task.step_index(), 1);
        sim.set_joint("wooden_cabinet_1_top_level", -0.1);
        assert_eq!(task.shaped_reward(&sim, 1), 0.0);
    }

    #[test]
    fn test_sparse_reward_scaled_without_dense() {
        let sim = drawer_scene(-0.15);
        let mut config = TaskConfig::from_json_str(DRAWER_TASK).unwrap();
        config.reward = RewardConfig {
            sparse_success: 1.0,
            reward_scale: Some(5.0),
            dense: false,
        };
        let mut task = GoalTask::new(config, &sim).unwrap();
        assert_relative_eq!(task.step(&sim).unwrap().total, 5.0);
    }

    #[test]
    fn test_setup_rejects_bad_goals() {
        let sim = drawer_scene(0.0);
        let mut config = TaskConfig::from_json_str(DRAWER_TASK).unwrap();
        config.goal = vec![serde_json::from_value(serde_json::json!(["open", "ketchup_1"])).unwrap()];
        let err = GoalTask::new(config.clone(), &sim).unwrap_err();
        assert!(matches!(err, GoalError::UnknownObject(_)));

        config.goal = vec![serde_json::from_value(serde_json::json!(["teleport", "wooden_cabinet_1"])).unwrap()];
        let err = GoalTask::new(config, &sim).unwrap_err();
        assert!(matches!(err, GoalError::UnknownPredicate(_)));
    }

    #[test]
    fn test_unshaped_goal_pays_sparse_only() {
        let sim = drawer_scene(0.0);
        let mut config = TaskConfig::from_json_str(DRAWER_TASK).unwrap();
        config.goal = vec![serde_json::from_value(serde_json::json!(["grasp", "wooden_cabinet_1"])).unwrap()];
        let mut task = GoalTask::new(config, &sim).unwrap();
        let reward = task.step(&sim).unwrap();
        assert!(!reward.success);
        assert_eq!(reward.total, 0.0);
    }
}
