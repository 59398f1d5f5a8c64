//! Read-only view of a stepped physics simulation
//!
//! The physics engine itself lives outside this crate. Everything the goal
//! interpreter and the reward shaper need from it goes through [`Simulator`],
//! which is queried against a frozen snapshot of the current step.

use nalgebra::{Point3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Identifier of a collision geometry inside the simulator
pub type GeomId = usize;

/// An active contact between two geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactPair {
    /// First geometry
    pub geom1: GeomId,
    /// Second geometry
    pub geom2: GeomId,
}

impl ContactPair {
    /// Create a new contact pair
    #[must_use]
    pub fn new(geom1: GeomId, geom2: GeomId) -> Self {
        Self { geom1, geom2 }
    }

    /// Whether `geom` is one of the two parties
    #[must_use]
    pub fn involves(&self, geom: GeomId) -> bool {
        self.geom1 == geom || self.geom2 == geom
    }

    /// The party opposite to `geom`, if `geom` takes part in the contact
    #[must_use]
    pub fn other(&self, geom: GeomId) -> Option<GeomId> {
        if self.geom1 == geom {
            Some(self.geom2)
        } else if self.geom2 == geom {
            Some(self.geom1)
        } else {
            None
        }
    }
}

/// Queries a simulator binding must answer for the current step
pub trait Simulator {
    /// World position of a body
    fn body_position(&self, body: &str) -> Option<Point3<f64>>;

    /// World orientation of a body
    fn body_orientation(&self, body: &str) -> Option<UnitQuaternion<f64>>;

    /// World position of a site
    fn site_position(&self, site: &str) -> Option<Point3<f64>>;

    /// World orientation of a site as a rotation matrix
    fn site_orientation(&self, site: &str) -> Option<Rotation3<f64>>;

    /// Look up a geometry by name
    fn geom_id(&self, name: &str) -> Option<GeomId>;

    /// Name of a geometry
    fn geom_name(&self, id: GeomId) -> Option<&str>;

    /// Current world position of a geometry's frame
    fn geom_position(&self, id: GeomId) -> Option<Point3<f64>>;

    /// Offset of a geometry relative to the body that owns it, as declared
    /// in the model
    fn geom_local_offset(&self, id: GeomId) -> Option<Vector3<f64>>;

    /// All geometries attached to a body
    fn body_geoms(&self, body: &str) -> Vec<GeomId>;

    /// Position of a scalar joint
    fn joint_position(&self, joint: &str) -> Option<f64>;

    /// Contacts active in this step
    fn contacts(&self) -> &[ContactPair];

    /// The point between the gripper's fingers
    fn grip_site_position(&self) -> Point3<f64>;

    /// Offset of the workspace (table surface) from the world origin
    fn workspace_offset(&self) -> Vector3<f64>;
}

/// Geometry groups of the robot's gripper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gripper {
    /// Geometries on the left finger pad
    pub left_pad: Vec<GeomId>,
    /// Geometries on the right finger pad
    pub right_pad: Vec<GeomId>,
    /// Every collision geometry belonging to the gripper
    pub all: Vec<GeomId>,
}

impl Gripper {
    /// Whether `geom` belongs to the gripper
    #[must_use]
    pub fn owns(&self, geom: GeomId) -> bool {
        self.all.contains(&geom) || self.left_pad.contains(&geom) || self.right_pad.contains(&geom)
    }

    /// Pad groups that must all be in contact for a grasp
    #[must_use]
    pub fn pad_groups(&self) -> [&[GeomId]; 2] {
        [&self.left_pad, &self.right_pad]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_pair_other() {
        let pair = ContactPair::new(3, 7);
        assert!(pair.involves(3));
        assert_eq!(pair.other(3), Some(7));
        assert_eq!(pair.other(7), Some(3));
        assert_eq!(pair.other(1), None);
    }

    #[test]
    fn test_gripper_owns_pads() {
        let gripper = Gripper {
            left_pad: vec![1],
            right_pad: vec![2],
            all: vec![1, 2, 3],
        };
        assert!(gripper.owns(2));
        assert!(gripper.owns(3));
        assert!(!gripper.owns(4));
    }
}
