//! Dense reward shaping for a single goal predicate
//!
//! One [`DenseRewardShaper`] is bound to the first predicate of a goal for
//! the lifetime of an episode. Each step it reads the simulator into
//! [`ShapingInputs`] and feeds them, together with the previous
//! [`RewardShapingState`], through [`shape`], a pure step function.
//! Shaping never fails: anything it cannot compute is worth 0.0.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GoalError, Result};
use crate::geometry::planar_distance;
use crate::goal::Atom;
use crate::object::{ObjectState, ObjectStateQueryable};
use crate::predicate::EvalContext;
use crate::sim::Simulator;

/// Flat reward paid while lifting without gaining height
pub const LIFT_TRICKLE: f64 = 0.01;

/// Smooth saturating distance term, 1 at distance 0 and decaying towards 0.
///
/// Equal to `1 - tanh(10 d)`, written so it stays positive where `tanh`
/// would round to 1.
#[must_use]
pub fn proximity(distance: f64) -> f64 {
    2.0 / (1.0 + (20.0 * distance).exp())
}

/// Which shaping rule a goal predicate maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapingKind {
    /// Gripper approaches the target
    Reach,
    /// Joint displacement grows
    Open,
    /// Joint displacement grows (closing from an open start)
    Close,
    /// Gripper rises while grasping
    Lift,
    /// Grasped object approaches the one it should stack on
    On,
    /// Gripper carries a grasped object towards a container
    In,
    /// Grasped object approaches a container, zero once released inside
    PlaceIn,
    /// Grasped object approaches the other's x-y position
    Align,
    /// No shaping for this predicate
    Unsupported,
}

impl ShapingKind {
    /// Map a predicate name, case-insensitively
    #[must_use]
    pub fn from_predicate(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "reach" => Self::Reach,
            "open" => Self::Open,
            "close" => Self::Close,
            "lift" => Self::Lift,
            "on" => Self::On,
            "in" => Self::In,
            "placein" => Self::PlaceIn,
            "align" => Self::Align,
            _ => Self::Unsupported,
        }
    }

    /// Number of objects the rule reads
    #[must_use]
    pub fn object_count(self) -> usize {
        match self {
            Self::Reach | Self::Open | Self::Close | Self::Lift => 1,
            Self::On | Self::In | Self::PlaceIn | Self::Align => 2,
            Self::Unsupported => 0,
        }
    }
}

/// Memory carried across the steps of one episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardShapingState {
    /// Joint positions when the shaper was created (open/close only)
    pub initial_joint_positions: Array1<f64>,
    /// Largest joint displacement seen so far
    pub prior_displacement: f64,
    /// Gripper height at the previous step
    pub prior_object_height: f64,
    /// Orientation of the primary body when the shaper was created
    pub prior_orientation: Option<UnitQuaternion<f64>>,
    /// Position of the primary body when the shaper was created
    pub prior_position: Option<Point3<f64>>,
}

/// Simulator readings consumed by one shaping step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapingInputs {
    /// Gripper-to-target distance
    Reach {
        /// Euclidean distance
        distance: f64,
    },
    /// Norm of the joint positions' change since the episode started
    Displacement {
        /// Displacement
        displacement: f64,
    },
    /// Gripper height and grasp status
    Lift {
        /// Height of the gripper reference point
        gripper_height: f64,
        /// Grasp heuristic holds
        grasped: bool,
        /// First step of the episode
        first_step: bool,
    },
    /// Distance paid only while grasping (on, in)
    GraspedDistance {
        /// Euclidean distance
        distance: f64,
        /// Grasp heuristic holds
        grasped: bool,
    },
    /// Place-in readings
    PlaceIn {
        /// Item-to-container distance
        distance: f64,
        /// Grasp heuristic holds
        grasped: bool,
        /// Item inside the container's bounds
        contained: bool,
        /// Gripper no longer touches the item
        released: bool,
    },
    /// Planar distance paid only while grasping
    Align {
        /// Distance in the x-y plane
        planar_distance: f64,
        /// Grasp heuristic holds
        grasped: bool,
    },
    /// Nothing to read
    Unsupported,
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// One shaping step: reward for `inputs` given the memory in `state`,
/// and the memory to carry into the next step
#[must_use]
pub fn shape(state: &RewardShapingState, inputs: &ShapingInputs) -> (f64, RewardShapingState) {
    let mut next = state.clone();
    let reward = match *inputs {
        ShapingInputs::Reach { distance } => proximity(distance) / 10.0,
        ShapingInputs::Displacement { displacement } => {
            // ratchet: pay only for new maxima so oscillating earns nothing
            if displacement > state.prior_displacement {
                next.prior_displacement = displacement;
                displacement
            } else {
                0.0
            }
        }
        ShapingInputs::Lift {
            gripper_height,
            grasped,
            first_step,
        } => {
            let prior = if first_step {
                gripper_height
            } else {
                state.prior_object_height
            };
            next.prior_object_height = gripper_height;
            let grasped = indicator(grasped);
            if gripper_height > prior {
                (gripper_height - prior + gripper_height / 10.0) * grasped
            } else {
                LIFT_TRICKLE * grasped
            }
        }
        ShapingInputs::GraspedDistance { distance, grasped } => {
            indicator(grasped) * proximity(distance)
        }
        ShapingInputs::PlaceIn {
            distance,
            grasped,
            contained,
            released,
        } => {
            if contained && released {
                0.0
            } else {
                indicator(grasped) * proximity(distance)
            }
        }
        ShapingInputs::Align {
            planar_distance,
            grasped,
        } => indicator(grasped) * proximity(planar_distance) / 10.0,
        ShapingInputs::Unsupported => 0.0,
    };
    (reward, next)
}

/// Dense reward for one goal predicate, with its episode memory
#[derive(Debug, Clone)]
pub struct DenseRewardShaper {
    kind: ShapingKind,
    objects: Vec<ObjectState>,
    reward_geoms: Option<Vec<String>>,
    state: RewardShapingState,
}

impl DenseRewardShaper {
    /// Bind a shaper to `atom`, snapshotting the episode's starting pose and
    /// joint positions from the current step.
    ///
    /// `reward_geoms` overrides the reach target with the centroid of the
    /// named geometries (or bodies). Predicates without a shaping rule, and
    /// calls naming too few objects, yield a shaper that always pays 0.0.
    #[must_use]
    pub fn new(atom: &Atom, ctx: &EvalContext<'_>, reward_geoms: Option<Vec<String>>) -> Self {
        let mut kind = ShapingKind::from_predicate(&atom.predicate);
        let objects: Vec<ObjectState> = atom
            .objects()
            .take(kind.object_count())
            .filter_map(|name| match ctx.object(name) {
                Ok(state) => Some(state.clone()),
                Err(err) => {
                    warn!(%name, %err, "shaping target not resolved");
                    None
                }
            })
            .collect();

        if kind == ShapingKind::Unsupported {
            warn!(predicate = %atom.predicate, "no dense reward for predicate");
        } else if objects.len() < kind.object_count() {
            warn!(goal = %atom, "too few objects for dense reward");
            kind = ShapingKind::Unsupported;
        }

        let mut state = RewardShapingState::default();
        if let Some(primary) = objects.first() {
            if matches!(kind, ShapingKind::Open | ShapingKind::Close) {
                state.initial_joint_positions = joint_positions(ctx.sim, primary);
            }
            state.prior_position = ctx.sim.body_position(primary.body());
            state.prior_orientation = ctx.sim.body_orientation(primary.body());
        }

        debug!(?kind, goal = %atom, "bound dense reward");
        Self {
            kind,
            objects,
            reward_geoms: reward_geoms.filter(|g| !g.is_empty()),
            state,
        }
    }

    /// The rule in use
    #[must_use]
    pub fn kind(&self) -> ShapingKind {
        self.kind
    }

    /// Current episode memory
    #[must_use]
    pub fn state(&self) -> &RewardShapingState {
        &self.state
    }

    /// Read this step's inputs from the simulator
    pub fn observe(&self, ctx: &EvalContext<'_>, step_index: usize) -> Result<ShapingInputs> {
        let sim = ctx.sim;
        let grip = sim.grip_site_position();
        Ok(match self.kind {
            ShapingKind::Reach => {
                let target = self.reach_target(sim)?;
                ShapingInputs::Reach {
                    distance: (grip - target).norm(),
                }
            }
            ShapingKind::Open | ShapingKind::Close => {
                let current = joint_positions(sim, &self.objects[0]);
                let initial = &self.state.initial_joint_positions;
                let displacement = if current.len() == initial.len() {
                    (&current - initial).mapv(|d| d * d).sum().sqrt()
                } else {
                    0.0
                };
                ShapingInputs::Displacement { displacement }
            }
            ShapingKind::Lift => ShapingInputs::Lift {
                gripper_height: grip.z,
                grasped: ctx.grasped(&self.objects[0]),
                first_step: step_index == 0,
            },
            ShapingKind::On => {
                let (item, base) = (&self.objects[0], &self.objects[1]);
                ShapingInputs::GraspedDistance {
                    distance: (item.position(sim)? - base.position(sim)?).norm(),
                    grasped: ctx.grasped(item),
                }
            }
            ShapingKind::In => {
                let (item, container) = (&self.objects[0], &self.objects[1]);
                ShapingInputs::GraspedDistance {
                    distance: (grip - container.position(sim)?).norm(),
                    grasped: ctx.grasped(item),
                }
            }
            ShapingKind::PlaceIn => {
                let (item, container) = (&self.objects[0], &self.objects[1]);
                ShapingInputs::PlaceIn {
                    distance: (item.position(sim)? - container.position(sim)?).norm(),
                    grasped: ctx.grasped(item),
                    contained: ctx.contains(container, item)?,
                    released: !ctx.gripper_contact(item),
                }
            }
            ShapingKind::Align => {
                let (item, target) = (&self.objects[0], &self.objects[1]);
                ShapingInputs::Align {
                    planar_distance: planar_distance(&item.position(sim)?, &target.position(sim)?),
                    grasped: ctx.grasped(item),
                }
            }
            ShapingKind::Unsupported => ShapingInputs::Unsupported,
        })
    }

    /// Shaped reward for this step; advances the episode memory
    pub fn step(&mut self, ctx: &EvalContext<'_>, step_index: usize) -> f64 {
        let inputs = match self.observe(ctx, step_index) {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!(%err, kind = ?self.kind, "dense reward unavailable this step");
                return 0.0;
            }
        };
        let (reward, next) = shape(&self.state, &inputs);
        self.state = next;
        debug!(step = step_index, kind = ?self.kind, reward, "dense reward");
        reward
    }

    fn reach_target(&self, sim: &dyn Simulator) -> Result<Point3<f64>> {
        if let Some(names) = &self.reward_geoms {
            return geoms_or_bodies_centroid(sim, names);
        }
        let primary = &self.objects[0];
        match sim.body_position(primary.body()) {
            Some(position) => Ok(position),
            None => primary.position(sim),
        }
    }
}

/// Positions of every joint of `object`, missing joints read as 0
fn joint_positions(sim: &dyn Simulator, object: &ObjectState) -> Array1<f64> {
    object
        .joints()
        .iter()
        .map(|joint| sim.joint_position(joint).unwrap_or(0.0))
        .collect()
}

/// Mean position of named geometries, falling back to bodies of that name
fn geoms_or_bodies_centroid(sim: &dyn Simulator, names: &[String]) -> Result<Point3<f64>> {
    let mut sum = Vector3::zeros();
    for name in names {
        let position = sim
            .geom_id(name)
            .and_then(|id| sim.geom_position(id))
            .or_else(|| sim.body_position(name))
            .ok_or_else(|| GoalError::missing("geom or body", name.as_str()))?;
        sum += position.coords;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = names.len() as f64;
    Ok(Point3::from(sum / count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionCatalog;
    use crate::goal::GoalArg;
    use crate::object::{ObjectManifest, ObjectRegistry, RigidObjectSpec};
    use crate::sim::Gripper;
    use crate::snapshot::{Pose, SceneSnapshot};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn run(state: RewardShapingState, inputs: &[ShapingInputs]) -> Vec<f64> {
        let mut state = state;
        inputs
            .iter()
            .map(|i| {
                let (reward, next) = shape(&state, i);
                state = next;
                reward
            })
            .collect()
    }

    #[test]
    fn test_displacement_ratchet() {
        let inputs: Vec<_> = [0.1, 0.3, 0.2, 0.4]
            .iter()
            .map(|&displacement| ShapingInputs::Displacement { displacement })
            .collect();
        let rewards = run(RewardShapingState::default(), &inputs);
        assert_eq!(rewards, vec![0.1, 0.3, 0.0, 0.4]);
    }

    #[test]
    fn test_reach_reward_at_zero_distance() {
        let (reward, _) = shape(&RewardShapingState::default(), &ShapingInputs::Reach { distance: 0.0 });
        assert_relative_eq!(reward, 0.1);
    }

    #[test]
    fn test_lift_rewards_height_gain_only_when_grasped() {
        let lift = |h: f64, grasped: bool, first: bool| ShapingInputs::Lift {
            gripper_height: h,
            grasped,
            first_step: first,
        };
        let rewards = run(
            RewardShapingState::default(),
            &[lift(1.0, true, true), lift(1.1, true, false), lift(1.05, true, false), lift(1.2, false, false)],
        );
        assert_relative_eq!(rewards[0], 0.01);
        assert_relative_eq!(rewards[1], 0.1 + 0.11, epsilon = 1e-12);
        assert_relative_eq!(rewards[2], 0.01);
        assert_relative_eq!(rewards[3], 0.0);
    }

    #[test]
    fn test_place_in_stops_once_released_inside() {
        let place = |contained, released| ShapingInputs::PlaceIn {
            distance: 0.0,
            grasped: true,
            contained,
            released,
        };
        let state = RewardShapingState::default();
        assert_relative_eq!(shape(&state, &place(true, false)).0, 1.0);
        assert_relative_eq!(shape(&state, &place(false, true)).0, 1.0);
        assert_eq!(shape(&state, &place(true, true)).0, 0.0);
    }

    #[test]
    fn test_grasp_gates_distance_terms() {
        let state = RewardShapingState::default();
        let on = ShapingInputs::GraspedDistance { distance: 0.0, grasped: false };
        assert_eq!(shape(&state, &on).0, 0.0);
        let align = ShapingInputs::Align { planar_distance: 0.0, grasped: true };
        assert_relative_eq!(shape(&state, &align).0, 0.1);
    }

    #[test]
    fn test_reach_reward_stays_positive_far_away() {
        let state = RewardShapingState::default();
        let mut last = 0.1;
        for distance in [0.5, 1.95, 5.0, 20.0] {
            let (reward, _) = shape(&state, &ShapingInputs::Reach { distance });
            assert!(reward > 0.0 && reward < last, "reward {reward} at {distance}");
            last = reward;
        }
        assert_relative_eq!(proximity(0.3), 1.0 - 3.0f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_kind_from_predicate() {
        assert_eq!(ShapingKind::from_predicate("PlaceIn"), ShapingKind::PlaceIn);
        assert_eq!(ShapingKind::from_predicate("grasp"), ShapingKind::Unsupported);
    }

    fn drawer_scene() -> (SceneSnapshot, ObjectRegistry) {
        let mut sim = SceneSnapshot::new();
        sim.set_body("wooden_cabinet_1_main", Pose::at(Point3::new(0.0, 0.0, 1.0)));
        sim.set_joint("top_level", 0.0).set_joint("middle_level", 0.0);
        sim.set_grip_site(Point3::new(0.0, 0.3, 1.4));
        let manifest = ObjectManifest {
            objects: vec![RigidObjectSpec {
                name: "wooden_cabinet_1".into(),
                joints: vec!["top_level".into(), "middle_level".into()],
                ..Default::default()
            }],
            sites: Vec::new(),
        };
        let mut registry = ObjectRegistry::new();
        registry
            .resolve(["wooden_cabinet_1"], &manifest, &sim, &DefinitionCatalog::new())
            .unwrap();
        (sim, registry)
    }

    #[test]
    fn test_shaper_tracks_joint_displacement() {
        let (mut sim, registry) = drawer_scene();
        let gripper = Gripper::default();
        let atom = Atom::new("open", [GoalArg::Object("wooden_cabinet_1".into())]);
        let mut shaper = DenseRewardShaper::new(&atom, &EvalContext::new(&sim, &registry, &gripper), None);
        assert_eq!(shaper.kind(), ShapingKind::Open);
        assert_eq!(shaper.state().prior_position, Some(Point3::new(0.0, 0.0, 1.0)));

        let mut rewards = Vec::new();
        for (top, middle) in [(-0.03, 0.04), (-0.01, 0.0), (-0.1, 0.0)] {
            sim.set_joint("top_level", top).set_joint("middle_level", middle);
            let ctx = EvalContext::new(&sim, &registry, &gripper);
            rewards.push(shaper.step(&ctx, rewards.len()));
        }
        assert_relative_eq!(rewards[0], 0.05, epsilon = 1e-12);
        assert_eq!(rewards[1], 0.0);
        assert_relative_eq!(rewards[2], 0.1, epsilon = 1e-12);
        assert_relative_eq!(shaper.state().prior_displacement, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_shaper_reach_override_geoms() {
        let (mut sim, registry) = drawer_scene();
        sim.set_body("handle", Pose::at(Point3::new(0.0, 0.3, 1.2)));
        let g = sim.add_geom("handle_g0", "handle", Vector3::new(0.0, 0.0, 0.2));
        let handle = sim.geom_position(g).unwrap();
        sim.set_grip_site(handle);
        let gripper = Gripper::default();
        let atom = Atom::new("reach", [GoalArg::Object("wooden_cabinet_1".into())]);
        let ctx = EvalContext::new(&sim, &registry, &gripper);

        let mut plain = DenseRewardShaper::new(&atom, &ctx, None);
        let mut targeted = DenseRewardShaper::new(&atom, &ctx, Some(vec!["handle_g0".into()]));
        assert!(plain.step(&ctx, 0) < 0.1);
        assert_relative_eq!(targeted.step(&ctx, 0), 0.1);
    }

    #[test]
    fn test_unsupported_and_underbound_shapers_pay_nothing() {
        let (sim, registry) = drawer_scene();
        let gripper = Gripper::default();
        let ctx = EvalContext::new(&sim, &registry, &gripper);

        let grasp = Atom::new("grasp", [GoalArg::Object("wooden_cabinet_1".into())]);
        let mut shaper = DenseRewardShaper::new(&grasp, &ctx, None);
        assert_eq!(shaper.step(&ctx, 0), 0.0);

        let align = Atom::new("align", [GoalArg::Object("wooden_cabinet_1".into())]);
        let mut shaper = DenseRewardShaper::new(&align, &ctx, None);
        assert_eq!(shaper.kind(), ShapingKind::Unsupported);
        assert_eq!(shaper.step(&ctx, 0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_reach_reward_bounded_and_decreasing(d in 0.0f64..10.0, delta in 1e-6f64..1.0) {
            let state = RewardShapingState::default();
            let (near, _) = shape(&state, &ShapingInputs::Reach { distance: d });
            let (far, _) = shape(&state, &ShapingInputs::Reach { distance: d + delta });
            prop_assert!(near > 0.0 && near <= 0.1);
            prop_assert!(far < near);
        }

        #[test]
        fn prop_ratchet_never_pays_below_peak(seq in proptest::collection::vec(0.0f64..1.0, 1..20)) {
            let inputs: Vec<_> = seq.iter().map(|&displacement| ShapingInputs::Displacement { displacement }).collect();
            let rewards = run(RewardShapingState::default(), &inputs);
            let mut peak = 0.0f64;
            for (d, r) in seq.iter().zip(rewards) {
                if *d > peak {
                    prop_assert_eq!(r, *d);
                    peak = *d;
                } else {
                    prop_assert_eq!(r, 0.0);
                }
            }
        }
    }
}
