//! Goal predicates and dense reward shaping for tabletop manipulation tasks
//!
//! This crate evaluates symbolic goals such as `(open wooden_cabinet_1_top_region)`
//! or `(placein ketchup_1 basket_1)` against a frozen simulator step, and
//! computes a shaped per-step reward for the goal's first predicate.
//!
//! The simulator is reached only through the [`Simulator`] trait; a
//! serializable in-memory [`SceneSnapshot`] implements it for replay and tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod articulation;
pub mod contact;
pub mod definition;
pub mod error;
pub mod geometry;
pub mod goal;
pub mod object;
pub mod predicate;
pub mod shaping;
pub mod sim;
pub mod snapshot;

// Re-export core types
pub use articulation::{ArticulationRange, OpenExtrema};
pub use definition::{split_object_name, DefinitionCatalog, ObjectDefinition, SiteDefinition};
pub use error::{GoalError, Result};
pub use geometry::{BoundingBox, GeomSet};
pub use goal::{Atom, BoundGoal, GoalArg, GoalExpression};
pub use object::{
    ObjectManifest, ObjectRegistry, ObjectState, ObjectStateHandle, ObjectStateQueryable,
    RigidObjectSpec, SiteSpec, StateKind,
};
pub use predicate::{BoundAtom, EvalContext, Predicate, PREDICATES};
pub use shaping::{shape, DenseRewardShaper, RewardShapingState, ShapingInputs, ShapingKind};
pub use sim::{ContactPair, GeomId, Gripper, Simulator};
pub use snapshot::{Pose, SceneSnapshot};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BoundGoal, DefinitionCatalog, DenseRewardShaper, EvalContext, GoalError, GoalExpression,
        Gripper, ObjectManifest, ObjectRegistry, ObjectStateQueryable, Result, SceneSnapshot,
        Simulator,
    };
}
