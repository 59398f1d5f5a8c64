//! Contact and grasp queries against the current step's contact list
//!
//! All functions are pure reads of [`Simulator::contacts`].

use crate::geometry::GeomSet;
use crate::sim::{GeomId, Gripper, Simulator};

/// True if any geometry of `a` touches any geometry of `b`
#[must_use]
pub fn contact(sim: &dyn Simulator, a: &GeomSet, b: &GeomSet) -> bool {
    contact_ids(sim, a.iter(), b)
}

fn contact_ids(sim: &dyn Simulator, a: impl Iterator<Item = GeomId>, b: &GeomSet) -> bool {
    let a: Vec<GeomId> = a.collect();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    sim.contacts().iter().any(|pair| {
        (a.contains(&pair.geom1) && b.contains(pair.geom2))
            || (a.contains(&pair.geom2) && b.contains(pair.geom1))
    })
}

/// True if any gripper geometry touches the target
#[must_use]
pub fn gripper_contact(sim: &dyn Simulator, gripper: &Gripper, target: &GeomSet) -> bool {
    let all = gripper
        .all
        .iter()
        .chain(&gripper.left_pad)
        .chain(&gripper.right_pad)
        .copied();
    contact_ids(sim, all, target)
}

/// Grasp heuristic: every finger-pad group touches the target
#[must_use]
pub fn grasp(sim: &dyn Simulator, gripper: &Gripper, target: &GeomSet) -> bool {
    gripper
        .pad_groups()
        .iter()
        .all(|group| contact_ids(sim, group.iter().copied(), target))
}

/// True if the object named `object_name` touches something other than
/// the gripper.
///
/// A geometry belongs to the object when its name is the object name or
/// the object name followed by `_`, so geometries that are not registered
/// as contact geometries count too. `bowl_10_g0` does not belong to `bowl_1`.
#[must_use]
pub fn contact_excluding_gripper(sim: &dyn Simulator, gripper: &Gripper, object_name: &str) -> bool {
    let belongs = |geom: GeomId| {
        sim.geom_name(geom)
            .and_then(|name| name.strip_prefix(object_name))
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
    };
    sim.contacts().iter().any(|pair| {
        (belongs(pair.geom1) && !gripper.owns(pair.geom2) && !belongs(pair.geom2))
            || (belongs(pair.geom2) && !gripper.owns(pair.geom1) && !belongs(pair.geom1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SceneSnapshot;
    use nalgebra::Vector3;

    struct Fixture {
        scene: SceneSnapshot,
        gripper: Gripper,
        mug: GeomSet,
        table: GeomId,
    }

    fn fixture() -> Fixture {
        let mut scene = SceneSnapshot::new();
        let left = scene.add_geom("gripper0_finger1_pad_collision", "gripper0_left", Vector3::zeros());
        let right = scene.add_geom("gripper0_finger2_pad_collision", "gripper0_right", Vector3::zeros());
        let palm = scene.add_geom("gripper0_hand_collision", "gripper0_hand", Vector3::zeros());
        let mug = scene.add_geom("mug_1_g0", "mug_1_main", Vector3::zeros());
        let handle = scene.add_geom("mug_1_g1", "mug_1_main", Vector3::zeros());
        let table = scene.add_geom("kitchen_table_g0", "kitchen_table_main", Vector3::zeros());
        Fixture {
            scene,
            gripper: Gripper {
                left_pad: vec![left],
                right_pad: vec![right],
                all: vec![left, right, palm],
            },
            mug: [mug, handle].into_iter().collect(),
            table,
        }
    }

    #[test]
    fn test_contact_either_order() {
        let mut f = fixture();
        let table: GeomSet = [f.table].into_iter().collect();
        assert!(!contact(&f.scene, &f.mug, &table));
        f.scene.add_contact(f.table, 4);
        assert!(contact(&f.scene, &f.mug, &table));
        assert!(contact(&f.scene, &table, &f.mug));
    }

    #[test]
    fn test_empty_sets_never_touch() {
        let mut f = fixture();
        f.scene.add_contact(3, 5);
        assert!(!contact(&f.scene, &GeomSet::new(), &f.mug));
        assert!(!gripper_contact(&f.scene, &f.gripper, &GeomSet::new()));
    }

    #[test]
    fn test_grasp_needs_both_pads() {
        let mut f = fixture();
        f.scene.add_contact(0, 3);
        assert!(gripper_contact(&f.scene, &f.gripper, &f.mug));
        assert!(!grasp(&f.scene, &f.gripper, &f.mug));
        f.scene.add_contact(4, 1);
        assert!(grasp(&f.scene, &f.gripper, &f.mug));
    }

    #[test]
    fn test_palm_contact_is_not_grasp() {
        let mut f = fixture();
        f.scene.add_contact(2, 3);
        assert!(gripper_contact(&f.scene, &f.gripper, &f.mug));
        assert!(!grasp(&f.scene, &f.gripper, &f.mug));
    }

    #[test]
    fn test_contact_excluding_gripper() {
        let mut f = fixture();
        f.scene.add_contact(0, 3).add_contact(1, 4);
        assert!(!contact_excluding_gripper(&f.scene, &f.gripper, "mug_1"));
        f.scene.add_contact(3, f.table);
        assert!(contact_excluding_gripper(&f.scene, &f.gripper, "mug_1"));
        assert!(contact_excluding_gripper(&f.scene, &f.gripper, "kitchen_table"));
    }

    #[test]
    fn test_self_contact_is_ignored() {
        let mut f = fixture();
        f.scene.add_contact(3, 4);
        assert!(!contact_excluding_gripper(&f.scene, &f.gripper, "mug_1"));
    }

    #[test]
    fn test_contact_excluding_gripper_respects_index() {
        let mut f = fixture();
        let bowl = f.scene.add_geom("bowl_1_g0", "bowl_1_main", Vector3::zeros());
        let other_bowl = f.scene.add_geom("bowl_10_g0", "bowl_10_main", Vector3::zeros());

        f.scene.add_contact(other_bowl, f.table);
        assert!(!contact_excluding_gripper(&f.scene, &f.gripper, "bowl_1"));
        assert!(contact_excluding_gripper(&f.scene, &f.gripper, "bowl_10"));

        // stacked bowls touch each other
        f.scene.clear_contacts().add_contact(bowl, other_bowl);
        assert!(contact_excluding_gripper(&f.scene, &f.gripper, "bowl_1"));
        assert!(contact_excluding_gripper(&f.scene, &f.gripper, "bowl_10"));
    }
}
