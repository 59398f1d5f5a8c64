//! The predicate library: named relations over resolved object state
//!
//! Every predicate is a pure function of the current simulator step, the
//! resolved objects it is called on, and optional numeric literals. The set
//! is fixed; lookup goes through [`PREDICATES`], matched case-insensitively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::articulation::ArticulationRange;
use crate::contact;
use crate::error::{GoalError, Result};
use crate::geometry::planar_distance;
use crate::goal::{Atom, GoalArg};
use crate::object::{ObjectRegistry, ObjectState, ObjectStateQueryable};
use crate::sim::{Gripper, Simulator};

/// Smallest distance tolerance accepted by `Reach`
pub const MIN_REACH_DISTANCE: f64 = 0.01;
/// Smallest clearance accepted by `Lift`
pub const MIN_LIFT_DISTANCE: f64 = 0.01;
/// Planar distance under which two objects count as aligned
pub const ALIGN_TOLERANCE: f64 = 0.05;
/// Planar distance under which an object counts as stacked on another
pub const ON_TOLERANCE: f64 = 0.03;

/// Every predicate the interpreter knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    /// Gripper touches the target
    Contact,
    /// Gripper grasps the target
    Grasp,
    /// Gripper inside the target's bounds or within a distance of it
    Reach,
    /// Some joint of the target is open by a fraction
    Open,
    /// Negation of `Open` at the complementary fraction
    Close,
    /// Target held clear of its resting surface
    Lift,
    /// Two targets share x-y position
    Align,
    /// Item released inside a container
    PlaceIn,
    /// Older form of `Open` with a mandatory fraction
    PartialOpen,
    /// Older form of `Close` with a mandatory fraction
    PartialClose,
    /// Item inside and touching a container
    In,
    /// Item resting on top of another
    On,
}

/// The fixed predicate table
pub const PREDICATES: [Predicate; 12] = [
    Predicate::Contact,
    Predicate::Grasp,
    Predicate::Reach,
    Predicate::Open,
    Predicate::Close,
    Predicate::Lift,
    Predicate::Align,
    Predicate::PlaceIn,
    Predicate::PartialOpen,
    Predicate::PartialClose,
    Predicate::In,
    Predicate::On,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Object,
    Number,
}

use ArgKind::{Number as N, Object as O};

impl Predicate {
    /// Lower-case name used in goal expressions
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Grasp => "grasp",
            Self::Reach => "reach",
            Self::Open => "open",
            Self::Close => "close",
            Self::Lift => "lift",
            Self::Align => "align",
            Self::PlaceIn => "placein",
            Self::PartialOpen => "partialopen",
            Self::PartialClose => "partialclose",
            Self::In => "in",
            Self::On => "on",
        }
    }

    fn signatures(self) -> &'static [&'static [ArgKind]] {
        match self {
            Self::Contact | Self::Grasp => &[&[O]],
            Self::Reach | Self::Open | Self::Close => &[&[O], &[O, N]],
            Self::PartialOpen | Self::PartialClose => &[&[O, N]],
            Self::Lift => &[&[O], &[O, N], &[O, O], &[O, O, N]],
            Self::Align | Self::PlaceIn | Self::In | Self::On => &[&[O, O]],
        }
    }

    /// Accepted argument counts, for error messages
    #[must_use]
    pub fn arity(self) -> &'static str {
        match self {
            Self::Contact | Self::Grasp => "1",
            Self::Reach | Self::Open | Self::Close => "1-2",
            Self::PartialOpen | Self::PartialClose => "2",
            Self::Lift => "1-3",
            Self::Align | Self::PlaceIn | Self::In | Self::On => "2",
        }
    }

    /// Whether the predicate reads joint state and needs an articulated target
    #[must_use]
    pub fn needs_articulation(self) -> bool {
        matches!(
            self,
            Self::Open | Self::Close | Self::PartialOpen | Self::PartialClose
        )
    }

    /// Check argument count and kinds
    pub fn check_args(self, args: &[GoalArg]) -> Result<()> {
        let same_len: Vec<_> = self
            .signatures()
            .iter()
            .filter(|sig| sig.len() == args.len())
            .collect();
        if same_len.is_empty() {
            return Err(GoalError::Arity {
                predicate: self.name().to_string(),
                expected: self.arity().to_string(),
                actual: args.len(),
            });
        }
        let kinds: Vec<ArgKind> = args
            .iter()
            .map(|a| if a.as_object().is_some() { O } else { N })
            .collect();
        if same_len.iter().any(|sig| **sig == kinds.as_slice()) {
            Ok(())
        } else {
            Err(GoalError::TypeMismatch(format!(
                "{} does not accept arguments ({})",
                self.name(),
                args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
            )))
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Predicate {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self> {
        PREDICATES
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GoalError::UnknownPredicate(s.to_string()))
    }
}

/// Everything a predicate reads during one step
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Frozen simulator state
    pub sim: &'a dyn Simulator,
    /// Resolved targets
    pub registry: &'a ObjectRegistry,
    /// Gripper geometry groups
    pub gripper: &'a Gripper,
}

impl<'a> EvalContext<'a> {
    /// Bundle the inputs of one evaluation
    #[must_use]
    pub fn new(sim: &'a dyn Simulator, registry: &'a ObjectRegistry, gripper: &'a Gripper) -> Self {
        Self {
            sim,
            registry,
            gripper,
        }
    }

    /// Resolved target by name
    pub fn object(&self, name: &str) -> Result<&'a ObjectState> {
        self.registry.get(name)
    }

    /// Gripper touches the target
    #[must_use]
    pub fn gripper_contact(&self, object: &ObjectState) -> bool {
        contact::gripper_contact(self.sim, self.gripper, object.geoms())
    }

    /// Grasp heuristic holds for the target
    #[must_use]
    pub fn grasped(&self, object: &ObjectState) -> bool {
        contact::grasp(self.sim, self.gripper, object.geoms())
    }

    /// The two targets' geometries touch
    #[must_use]
    pub fn touching(&self, a: &ObjectState, b: &ObjectState) -> bool {
        contact::contact(self.sim, a.geoms(), b.geoms())
    }

    /// The item's position lies inside the container's bounds
    pub fn contains(&self, container: &ObjectState, item: &ObjectState) -> Result<bool> {
        let point = item.position(self.sim)?;
        Ok(container.geoms().bounding_box(self.sim).contains(&point))
    }
}

/// A predicate call validated against the table and the registry
#[derive(Debug, Clone)]
pub struct BoundAtom {
    predicate: Predicate,
    atom: Atom,
}

impl BoundAtom {
    /// Validate a call
    pub fn bind(atom: &Atom, registry: &ObjectRegistry) -> Result<Self> {
        let predicate: Predicate = atom.predicate.parse()?;
        predicate.check_args(&atom.args)?;

        for name in atom.objects() {
            registry.get(name)?;
        }
        if predicate.needs_articulation() {
            let target = registry.get(object_arg(&atom.args, 0)?)?;
            require_articulated(target)?;
        }

        Ok(Self {
            predicate,
            atom: atom.clone(),
        })
    }

    /// The predicate being called
    #[must_use]
    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// Arguments as written in the goal
    #[must_use]
    pub fn args(&self) -> &[GoalArg] {
        &self.atom.args
    }

    /// Evaluate against the current step
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let args = &self.atom.args;
        let first = ctx.object(object_arg(args, 0)?)?;
        let number = |i: usize| args.get(i).and_then(GoalArg::as_number);

        match self.predicate {
            Predicate::Contact => Ok(ctx.gripper_contact(first)),
            Predicate::Grasp => Ok(ctx.grasped(first)),
            Predicate::Reach => reach(ctx, first, number(1).unwrap_or(0.0)),
            Predicate::Open | Predicate::PartialOpen => {
                is_partially_open(ctx, first, number(1).unwrap_or(1.0))
            }
            Predicate::Close | Predicate::PartialClose => {
                Ok(!is_partially_open(ctx, first, 1.0 - number(1).unwrap_or(1.0))?)
            }
            Predicate::Lift => {
                let other = match args.get(1) {
                    Some(GoalArg::Object(name)) => Some(ctx.object(name)?),
                    _ => None,
                };
                let distance = args.last().and_then(GoalArg::as_number).unwrap_or(0.0);
                lifted(ctx, first, other, distance)
            }
            Predicate::Align => {
                let second = ctx.object(object_arg(args, 1)?)?;
                aligned(ctx, first, second)
            }
            Predicate::PlaceIn => {
                let container = ctx.object(object_arg(args, 1)?)?;
                Ok(ctx.touching(container, first)
                    && ctx.contains(container, first)?
                    && !ctx.gripper_contact(first))
            }
            Predicate::In => {
                let container = ctx.object(object_arg(args, 1)?)?;
                Ok(ctx.touching(container, first) && ctx.contains(container, first)?)
            }
            Predicate::On => {
                let base = ctx.object(object_arg(args, 1)?)?;
                on_top(ctx, first, base)
            }
        }
    }
}

impl fmt::Display for BoundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.atom)
    }
}

fn object_arg(args: &[GoalArg], index: usize) -> Result<&str> {
    args.get(index)
        .and_then(GoalArg::as_object)
        .ok_or_else(|| GoalError::TypeMismatch(format!("argument {index} must be an object")))
}

fn require_articulated(object: &ObjectState) -> Result<&ArticulationRange> {
    let handle = object.handle();
    object.articulation().ok_or_else(|| {
        GoalError::TypeMismatch(format!(
            "{}'s parent, {}, is not an articulated object",
            handle.object_name,
            handle.definition_owner()
        ))
    })
}

/// Gripper reference point inside the target's bounds, or within
/// `goal_distance` (at least [`MIN_REACH_DISTANCE`]) of its position
pub fn reach(ctx: &EvalContext<'_>, object: &ObjectState, goal_distance: f64) -> Result<bool> {
    let goal_distance = goal_distance.max(MIN_REACH_DISTANCE);
    let grip = ctx.sim.grip_site_position();

    if object.geoms().bounding_box(ctx.sim).contains(&grip) {
        return Ok(true);
    }
    let target = object.position(ctx.sim)?;
    Ok((grip - target).norm() < goal_distance)
}

/// Any joint of the target is on the open side of the threshold for `amount`
pub fn is_partially_open(ctx: &EvalContext<'_>, object: &ObjectState, amount: f64) -> Result<bool> {
    let range = require_articulated(object)?;
    for joint in object.joints() {
        let qpos = ctx
            .sim
            .joint_position(joint)
            .ok_or_else(|| GoalError::missing("joint", joint))?;
        if range.is_partially_open(qpos, amount) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Target held by the gripper, touching nothing else, with its lowest
/// geometry more than `lift_distance` above the reference surface
pub fn lifted(
    ctx: &EvalContext<'_>,
    object: &ObjectState,
    surface: Option<&ObjectState>,
    lift_distance: f64,
) -> Result<bool> {
    let lift_distance = lift_distance.max(MIN_LIFT_DISTANCE);

    if contact::contact_excluding_gripper(ctx.sim, ctx.gripper, object.name()) {
        return Ok(false);
    }
    // objects spawned in mid-air must not count as lifted
    if !ctx.gripper_contact(object) {
        return Ok(false);
    }

    let bounds = object.geoms().bounding_box(ctx.sim);
    if bounds.is_empty() {
        return Ok(false);
    }
    let surface_height = match surface {
        Some(surface) => {
            let surface_bounds = surface.geoms().bounding_box(ctx.sim);
            if surface_bounds.is_empty() {
                return Ok(false);
            }
            surface_bounds.max.z
        }
        None => ctx.sim.workspace_offset().z,
    };
    Ok(bounds.min.z - surface_height > lift_distance)
}

/// Planar distance between the two targets below [`ALIGN_TOLERANCE`]
pub fn aligned(ctx: &EvalContext<'_>, a: &ObjectState, b: &ObjectState) -> Result<bool> {
    let distance = planar_distance(&a.position(ctx.sim)?, &b.position(ctx.sim)?);
    Ok(distance < ALIGN_TOLERANCE)
}

/// `item` touches `base`, sits no lower than it, and is centred over it
pub fn on_top(ctx: &EvalContext<'_>, item: &ObjectState, base: &ObjectState) -> Result<bool> {
    if !ctx.touching(item, base) {
        return Ok(false);
    }
    let item_pos = item.position(ctx.sim)?;
    let base_pos = base.position(ctx.sim)?;
    Ok(base_pos.z <= item_pos.z && planar_distance(&item_pos, &base_pos) < ON_TOLERANCE)
}
