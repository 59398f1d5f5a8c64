//! Geometry sets and axis-aligned bounding boxes

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::sim::{GeomId, Simulator};

/// The collision geometries that make up one addressable target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeomSet(Vec<GeomId>);

impl GeomSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a geometry, ignoring duplicates
    pub fn insert(&mut self, geom: GeomId) {
        if !self.0.contains(&geom) {
            self.0.push(geom);
        }
    }

    /// Whether `geom` is a member
    #[must_use]
    pub fn contains(&self, geom: GeomId) -> bool {
        self.0.contains(&geom)
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over members
    pub fn iter(&self) -> impl Iterator<Item = GeomId> + '_ {
        self.0.iter().copied()
    }

    /// Axis-aligned bounds of the members' current world positions
    #[must_use]
    pub fn bounding_box<S: Simulator + ?Sized>(&self, sim: &S) -> BoundingBox {
        let points: Vec<Point3<f64>> = self.iter().filter_map(|g| sim.geom_position(g)).collect();
        BoundingBox::from_points(points.iter())
    }
}

impl FromIterator<GeomId> for GeomSet {
    fn from_iter<I: IntoIterator<Item = GeomId>>(iter: I) -> Self {
        let mut set = Self::new();
        for geom in iter {
            set.insert(geom);
        }
        set
    }
}

/// Axis-aligned min/max corners of a geometry set at one instant.
///
/// Recomputed on every query; a box built from no points is empty and
/// contains nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Smallest x, y, z
    pub min: Point3<f64>,
    /// Largest x, y, z
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Box with inverted infinite corners, the identity for expansion
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        let mut bbox = Self::empty();
        for point in points {
            bbox.expand_to_include(point);
        }
        bbox
    }

    /// Grow the box so that it contains `point`
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = Point3::new(
            self.min.x.min(point.x),
            self.min.y.min(point.y),
            self.min.z.min(point.z),
        );
        self.max = Point3::new(
            self.max.x.max(point.x),
            self.max.y.max(point.y),
            self.max.z.max(point.z),
        );
    }

    /// True if min > max on any axis
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Strict interior test on all three axes
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| point[i] > self.min[i] && point[i] < self.max[i])
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Euclidean distance in the x-y plane
#[must_use]
pub fn planar_distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a.xy() - b.xy()).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_from_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.5, 0.3),
            Point3::new(-0.2, 0.8, 0.1),
        ];
        let bbox = BoundingBox::from_points(points.iter());
        assert_eq!(bbox.min, Point3::new(-0.2, 0.0, 0.0));
        assert_eq!(bbox.max, Point3::new(1.0, 0.8, 0.3));
        assert!(bbox.contains(&Point3::new(0.5, 0.4, 0.1)));
        assert!(!bbox.contains(&Point3::new(0.5, 0.4, 0.3)));
    }

    #[test]
    fn test_empty_box_contains_nothing() {
        let bbox = BoundingBox::from_points(std::iter::empty());
        assert!(bbox.is_empty());
        assert!(!bbox.contains(&Point3::origin()));
    }

    #[test]
    fn test_geom_set_deduplicates() {
        let set: GeomSet = [4, 2, 4, 9].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(9));
        assert!(!set.contains(1));
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 10.0);
        assert!((planar_distance(&a, &b) - 5.0).abs() < 1e-12);
    }
}
