//! In-memory simulator snapshot
//!
//! A frozen, serializable scene used to drive the interpreter without a
//! physics engine: replaying recorded states, tests, and benchmarks.

use std::collections::HashMap;

use nalgebra::{Point3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::sim::{ContactPair, GeomId, Simulator};

/// Position and orientation of a body or site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position
    pub position: Point3<f64>,
    /// World orientation
    #[serde(default = "UnitQuaternion::identity")]
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Pose at `position` with identity orientation
    #[must_use]
    pub fn at(position: Point3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// One collision geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomRecord {
    /// Geometry name
    pub name: String,
    /// Owning body
    pub body: String,
    /// World position
    pub position: Point3<f64>,
    /// Offset relative to the owning body
    #[serde(default = "Vector3::zeros")]
    pub local_offset: Vector3<f64>,
}

/// A complete frozen scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    bodies: HashMap<String, Pose>,
    #[serde(default)]
    sites: HashMap<String, Pose>,
    #[serde(default)]
    geoms: Vec<GeomRecord>,
    #[serde(default)]
    joints: HashMap<String, f64>,
    #[serde(default)]
    contacts: Vec<ContactPair>,
    #[serde(default = "Point3::origin")]
    grip_site: Point3<f64>,
    #[serde(default = "Vector3::zeros")]
    workspace_offset: Vector3<f64>,
}

impl SceneSnapshot {
    /// Create an empty scene
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a body
    pub fn set_body(&mut self, name: impl Into<String>, pose: Pose) -> &mut Self {
        self.bodies.insert(name.into(), pose);
        self
    }

    /// Place a site
    pub fn set_site(&mut self, name: impl Into<String>, pose: Pose) -> &mut Self {
        self.sites.insert(name.into(), pose);
        self
    }

    /// Add a geometry attached to `body`, placed at the body position plus
    /// `local_offset`. The body must already be placed; otherwise the origin
    /// is used as the body position.
    pub fn add_geom(
        &mut self,
        name: impl Into<String>,
        body: impl Into<String>,
        local_offset: Vector3<f64>,
    ) -> GeomId {
        let body = body.into();
        let origin = self
            .bodies
            .get(&body)
            .map_or_else(Point3::origin, |p| p.position);
        self.geoms.push(GeomRecord {
            name: name.into(),
            body,
            position: origin + local_offset,
            local_offset,
        });
        self.geoms.len() - 1
    }

    /// Move a body and every geometry attached to it by `delta`
    pub fn translate_body(&mut self, body: &str, delta: Vector3<f64>) -> &mut Self {
        if let Some(pose) = self.bodies.get_mut(body) {
            pose.position += delta;
        }
        for geom in self.geoms.iter_mut().filter(|g| g.body == body) {
            geom.position += delta;
        }
        self
    }

    /// Set a joint position
    pub fn set_joint(&mut self, name: impl Into<String>, qpos: f64) -> &mut Self {
        self.joints.insert(name.into(), qpos);
        self
    }

    /// Record an active contact between two geometries
    pub fn add_contact(&mut self, geom1: GeomId, geom2: GeomId) -> &mut Self {
        self.contacts.push(ContactPair::new(geom1, geom2));
        self
    }

    /// Drop every contact involving `geom`
    pub fn remove_contacts_of(&mut self, geom: GeomId) -> &mut Self {
        self.contacts.retain(|c| !c.involves(geom));
        self
    }

    /// Drop every contact
    pub fn clear_contacts(&mut self) -> &mut Self {
        self.contacts.clear();
        self
    }

    /// Move the gripper reference point
    pub fn set_grip_site(&mut self, position: Point3<f64>) -> &mut Self {
        self.grip_site = position;
        self
    }

    /// Set the workspace offset
    pub fn set_workspace_offset(&mut self, offset: Vector3<f64>) -> &mut Self {
        self.workspace_offset = offset;
        self
    }
}

impl Simulator for SceneSnapshot {
    fn body_position(&self, body: &str) -> Option<Point3<f64>> {
        self.bodies.get(body).map(|p| p.position)
    }

    fn body_orientation(&self, body: &str) -> Option<UnitQuaternion<f64>> {
        self.bodies.get(body).map(|p| p.orientation)
    }

    fn site_position(&self, site: &str) -> Option<Point3<f64>> {
        self.sites.get(site).map(|p| p.position)
    }

    fn site_orientation(&self, site: &str) -> Option<Rotation3<f64>> {
        self.sites.get(site).map(|p| p.orientation.to_rotation_matrix())
    }

    fn geom_id(&self, name: &str) -> Option<GeomId> {
        self.geoms.iter().position(|g| g.name == name)
    }

    fn geom_name(&self, id: GeomId) -> Option<&str> {
        self.geoms.get(id).map(|g| g.name.as_str())
    }

    fn geom_position(&self, id: GeomId) -> Option<Point3<f64>> {
        self.geoms.get(id).map(|g| g.position)
    }

    fn geom_local_offset(&self, id: GeomId) -> Option<Vector3<f64>> {
        self.geoms.get(id).map(|g| g.local_offset)
    }

    fn body_geoms(&self, body: &str) -> Vec<GeomId> {
        self.geoms
            .iter()
            .enumerate()
            .filter(|(_, g)| g.body == body)
            .map(|(id, _)| id)
            .collect()
    }

    fn joint_position(&self, joint: &str) -> Option<f64> {
        self.joints.get(joint).copied()
    }

    fn contacts(&self) -> &[ContactPair] {
        &self.contacts
    }

    fn grip_site_position(&self) -> Point3<f64> {
        self.grip_site
    }

    fn workspace_offset(&self) -> Vector3<f64> {
        self.workspace_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geoms_follow_body() {
        let mut scene = SceneSnapshot::new();
        scene.set_body("mug_1_main", Pose::at(Point3::new(0.1, 0.0, 0.9)));
        let g = scene.add_geom("mug_1_g0", "mug_1_main", Vector3::new(0.0, 0.0, 0.05));
        let placed = scene.geom_position(g).unwrap();
        assert_relative_eq!(placed, Point3::new(0.1, 0.0, 0.95), epsilon = 1e-12);

        scene.translate_body("mug_1_main", Vector3::new(0.0, 0.0, 0.1));
        let body = scene.body_position("mug_1_main").unwrap();
        assert_relative_eq!(body, Point3::new(0.1, 0.0, 1.0), epsilon = 1e-12);
        let moved = scene.geom_position(g).unwrap();
        assert_relative_eq!(moved, Point3::new(0.1, 0.0, 1.05), epsilon = 1e-12);
        assert_eq!(scene.geom_local_offset(g), Some(Vector3::new(0.0, 0.0, 0.05)));
    }

    #[test]
    fn test_contacts() {
        let mut scene = SceneSnapshot::new();
        let a = scene.add_geom("a", "b", Vector3::zeros());
        let b = scene.add_geom("b", "b", Vector3::zeros());
        scene.add_contact(a, b);
        assert_eq!(scene.contacts().len(), 1);
        scene.remove_contacts_of(b);
        assert!(scene.contacts().is_empty());
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "bodies": { "ketchup_1_main": { "position": [0.0, 0.1, 0.9] } },
            "joints": { "wooden_cabinet_1_top_level": -0.15 },
            "grip_site": [0.0, 0.0, 1.2]
        }"#;
        let scene: SceneSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(scene.joint_position("wooden_cabinet_1_top_level"), Some(-0.15));
        assert_eq!(scene.grip_site_position(), Point3::new(0.0, 0.0, 1.2));
        assert_eq!(
            scene.body_orientation("ketchup_1_main"),
            Some(UnitQuaternion::identity())
        );
    }
}
