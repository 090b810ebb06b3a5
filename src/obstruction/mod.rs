//! Obstruction indices: the blocking footprints of one floor for one
//! obstruction kind, kept in a planar structure that is updated in place.
//!
//! Every footprint is triangulated once on registration and its triangles are
//! stored in a [`TriangleTree`]. Registering or unregistering a footprint costs
//! one tree update per triangle of that footprint, and a full rebuild from the
//! stored polygons always yields an index that answers every query identically.

use crate::components::ShapeId;
use crate::geometry::{Aabb, GeometryError, Point, Polygon, triangles_overlap, triangulate};
use bevy::prelude::*;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub mod registry;
pub mod triangle_tree;

pub use registry::*;
pub use triangle_tree::*;

/// The two independent obstruction concerns of a floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum TargetKind {
    Vision,
    Movement,
}

impl TargetKind {
    pub const ALL: [TargetKind; 2] = [TargetKind::Vision, TargetKind::Movement];
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObstructionError {
    #[error("Triangle {triangle} of shape {shape} is missing from the index")]
    InconsistentIndex { shape: ShapeId, triangle: u32 },
}

/// Snapshot of a shape's outline at registration time, with its triangulation
#[derive(Debug, Clone)]
pub struct Footprint {
    pub shape: ShapeId,
    polygon: Polygon,
    triangles: Vec<[Point; 3]>,
}

impl Footprint {
    pub fn new(shape: ShapeId, polygon: Polygon) -> Self {
        let triangles = triangulate(polygon.points());
        Self {
            shape,
            polygon,
            triangles,
        }
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn triangles(&self) -> &[[Point; 3]] {
        &self.triangles
    }

    pub fn bounds(&self) -> Aabb {
        self.polygon.bounds()
    }
}

/// Footprints of one obstruction kind on one floor
#[derive(Debug, Clone, Default)]
pub struct ObstructionIndex {
    footprints: BTreeMap<ShapeId, Footprint>,
    tree: TriangleTree,
    rebuilds: usize,
}

impl ObstructionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    pub fn contains(&self, shape: ShapeId) -> bool {
        self.footprints.contains_key(&shape)
    }

    pub fn footprint(&self, shape: ShapeId) -> Option<&Footprint> {
        self.footprints.get(&shape)
    }

    pub fn footprints(&self) -> impl Iterator<Item = &Footprint> {
        self.footprints.values()
    }

    /// Number of full rebuilds, explicit or triggered by inconsistency recovery
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Inserts or replaces the footprint of `shape`. The polygon is already
    /// validated, so replacement never leaves the shape without a footprint.
    pub fn register(&mut self, shape: ShapeId, polygon: Polygon) {
        let footprint = Footprint::new(shape, polygon);
        if let Some(previous) = self.footprints.remove(&shape) {
            self.detach(&previous);
        }
        self.tree.insert(&footprint);
        self.footprints.insert(shape, footprint);
    }

    /// Validates `points` as a footprint and registers it
    pub fn register_points(&mut self, shape: ShapeId, points: &[Point]) -> Result<(), GeometryError> {
        let polygon = Polygon::new(points.iter().copied())?;
        self.register(shape, polygon);
        Ok(())
    }

    /// Returns whether a footprint was present
    pub fn unregister(&mut self, shape: ShapeId) -> bool {
        let Some(previous) = self.footprints.remove(&shape) else {
            return false;
        };
        self.detach(&previous);
        true
    }

    fn detach(&mut self, footprint: &Footprint) {
        if let Err(err) = self.tree.remove(footprint) {
            warn!("{err}; rebuilding obstruction index from {} footprints", self.footprints.len());
            self.rebuild();
        }
    }

    /// Discards the tree and bulk-loads a new one from the stored polygons
    pub fn rebuild(&mut self) {
        for footprint in self.footprints.values_mut() {
            *footprint = Footprint::new(footprint.shape, footprint.polygon.clone());
        }
        self.tree = TriangleTree::from_footprints(self.footprints.values());
        self.rebuilds += 1;
        debug!(
            "Rebuilt obstruction index: {} footprints, {} triangles",
            self.footprints.len(),
            self.tree.len()
        );
    }

    /// Shapes whose footprint interior overlaps the interior of `region`, ascending
    pub fn query_blocking(&self, region: &Polygon) -> Vec<ShapeId> {
        self.overlapping(region, &BTreeSet::new(), false)
    }

    /// Same as [`Self::query_blocking`], ignoring the shapes in `exclude`
    pub fn query_blocking_excluding(&self, region: &Polygon, exclude: &BTreeSet<ShapeId>) -> Vec<ShapeId> {
        self.overlapping(region, exclude, false)
    }

    pub fn is_blocked(&self, region: &Polygon) -> bool {
        !self.overlapping(region, &BTreeSet::new(), true).is_empty()
    }

    fn overlapping(&self, region: &Polygon, exclude: &BTreeSet<ShapeId>, first_only: bool) -> Vec<ShapeId> {
        let mut hits = BTreeSet::new();
        for region_triangle in triangulate(region.points()) {
            for candidate in self.tree.candidates(Aabb::from_points(&region_triangle)) {
                if exclude.contains(&candidate.shape) || hits.contains(&candidate.shape) {
                    continue;
                }
                let Some(triangle) = self
                    .footprints
                    .get(&candidate.shape)
                    .and_then(|fp| fp.triangles().get(candidate.triangle as usize))
                else {
                    continue;
                };
                if triangles_overlap(&region_triangle, triangle) {
                    hits.insert(candidate.shape);
                    if first_only {
                        return hits.into_iter().collect();
                    }
                }
            }
        }
        hits.into_iter().collect()
    }

    /// Shapes whose footprint strictly contains `point`, ascending
    pub fn shapes_containing(&self, point: Point) -> Vec<ShapeId> {
        self.tree
            .shapes_near(Aabb::new(point, point))
            .into_iter()
            .filter(|shape| {
                self.footprints
                    .get(shape)
                    .is_some_and(|fp| fp.polygon().contains_point(point))
            })
            .collect()
    }

    /// Footprints whose bounds touch `bounds`
    pub fn footprints_within(&self, bounds: Aabb) -> Vec<&Footprint> {
        self.tree
            .shapes_near(bounds)
            .into_iter()
            .filter_map(|shape| self.footprints.get(&shape))
            .filter(|fp| fp.bounds().intersects(&bounds))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_tree_for(&mut self, shape: ShapeId) {
        self.tree.forget(shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Polygon {
        Polygon::rectangle(Vec2::new(x, y), w, h).unwrap()
    }

    #[test]
    fn test_register_and_query() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));
        index.register(ShapeId(2), rect(20.0, 20.0, 4.0, 4.0));

        assert_eq!(index.query_blocking(&rect(2.0, 2.0, 1.0, 1.0)), vec![ShapeId(1)]);
        assert_eq!(index.query_blocking(&rect(-10.0, -10.0, 50.0, 50.0)), vec![ShapeId(1), ShapeId(2)]);
        assert!(index.query_blocking(&rect(10.0, 10.0, 2.0, 2.0)).is_empty());
    }

    #[test]
    fn test_touching_edges_do_not_block() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));

        assert!(!index.is_blocked(&rect(4.0, 0.0, 4.0, 4.0)));
        assert!(!index.is_blocked(&rect(4.0, 4.0, 1.0, 1.0)));
        assert!(index.is_blocked(&rect(3.9, 0.0, 4.0, 4.0)));
    }

    #[test]
    fn test_unregister_round_trip() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));
        let probe = rect(25.0, 25.0, 2.0, 2.0);
        let before = index.query_blocking(&probe);

        index.register(ShapeId(9), rect(24.0, 24.0, 5.0, 5.0));
        assert_eq!(index.query_blocking(&probe), vec![ShapeId(9)]);
        assert!(index.unregister(ShapeId(9)));

        assert_eq!(index.query_blocking(&probe), before);
        assert!(!index.unregister(ShapeId(9)));
    }

    #[test]
    fn test_huge_footprint_registers_and_unregisters() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(-50_000.0, -50_000.0, 100_000.0, 100_000.0));
        index.register(ShapeId(2), rect(0.0, 0.0, 4.0, 4.0));

        assert_eq!(index.shapes_containing(Vec2::new(40_000.0, -40_000.0)), vec![ShapeId(1)]);
        assert!(index.unregister(ShapeId(1)));
        assert_eq!(index.rebuild_count(), 0);
        assert!(!index.is_blocked(&rect(40_000.0, 40_000.0, 1.0, 1.0)));
        assert!(index.is_blocked(&rect(1.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_register_replaces_previous_footprint() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));
        index.register(ShapeId(1), rect(100.0, 0.0, 4.0, 4.0));

        assert_eq!(index.len(), 1);
        assert!(!index.is_blocked(&rect(1.0, 1.0, 1.0, 1.0)));
        assert!(index.is_blocked(&rect(101.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_invalid_points_leave_index_untouched() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));

        let result = index.register_points(ShapeId(1), &[Vec2::ZERO, Vec2::ONE]);
        assert_eq!(result, Err(GeometryError::TooFewPoints { count: 2 }));
        assert!(index.is_blocked(&rect(1.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_shapes_containing_point() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 10.0, 10.0));
        index.register(ShapeId(2), rect(5.0, 5.0, 10.0, 10.0));

        assert_eq!(index.shapes_containing(Vec2::new(7.0, 7.0)), vec![ShapeId(1), ShapeId(2)]);
        assert_eq!(index.shapes_containing(Vec2::new(1.0, 1.0)), vec![ShapeId(1)]);
        // On the outline of shape 1
        assert_eq!(index.shapes_containing(Vec2::new(0.0, 3.0)), Vec::<ShapeId>::new());
    }

    #[test]
    fn test_footprints_within_bounds() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));
        index.register(ShapeId(2), rect(500.0, 500.0, 4.0, 4.0));

        let near: Vec<ShapeId> = index
            .footprints_within(Aabb::around(Vec2::ZERO, 20.0))
            .iter()
            .map(|fp| fp.shape)
            .collect();
        assert_eq!(near, vec![ShapeId(1)]);

        assert_eq!(index.footprints_within(Aabb::around(Vec2::ZERO, 10_000.0)).len(), 2);
    }

    #[test]
    fn test_inconsistency_triggers_rebuild() {
        let mut index = ObstructionIndex::new();
        index.register(ShapeId(1), rect(0.0, 0.0, 4.0, 4.0));
        index.register(ShapeId(2), rect(20.0, 0.0, 4.0, 4.0));
        index.corrupt_tree_for(ShapeId(1));

        assert!(index.unregister(ShapeId(1)));

        assert_eq!(index.rebuild_count(), 1);
        assert!(!index.is_blocked(&rect(1.0, 1.0, 1.0, 1.0)));
        assert!(index.is_blocked(&rect(21.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_incremental_matches_rebuild() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut index = ObstructionIndex::new();

        for step in 0..400u64 {
            let shape = ShapeId(rng.gen_range(0..40));
            if rng.gen_range(0..4) == 0 {
                index.unregister(shape);
            } else {
                let x = rng.gen_range(-200.0..200.0);
                let y = rng.gen_range(-200.0..200.0);
                let w = rng.gen_range(1.0..60.0);
                let h = rng.gen_range(1.0..60.0);
                index.register(shape, rect(x, y, w, h));
            }
            assert!(index.len() <= 40, "step {step}");
        }

        let mut rebuilt = index.clone();
        rebuilt.rebuild();

        for _ in 0..200 {
            let probe = rect(
                rng.gen_range(-250.0..250.0),
                rng.gen_range(-250.0..250.0),
                rng.gen_range(1.0..80.0),
                rng.gen_range(1.0..80.0),
            );
            assert_eq!(index.query_blocking(&probe), rebuilt.query_blocking(&probe));
        }
    }
}
