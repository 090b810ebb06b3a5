//! R-tree over footprint triangles

use super::{Footprint, ObstructionError};
use crate::components::ShapeId;
use crate::geometry::{Aabb, Point};
use rstar::{AABB, RTree, RTreeObject};
use std::collections::BTreeSet;

/// One triangle of one footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleRef {
    pub shape: ShapeId,
    pub triangle: u32,
}

/// Tree entry: a triangle reference with the bounds of its triangle
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleEntry {
    pub reference: TriangleRef,
    bounds: AABB<[f32; 2]>,
}

impl TriangleEntry {
    pub fn new(shape: ShapeId, triangle: u32, corners: &[Point; 3]) -> Self {
        Self {
            reference: TriangleRef { shape, triangle },
            bounds: envelope_of(Aabb::from_points(corners)),
        }
    }
}

impl RTreeObject for TriangleEntry {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

fn envelope_of(bounds: Aabb) -> AABB<[f32; 2]> {
    AABB::from_corners(bounds.min.to_array(), bounds.max.to_array())
}

fn entries(footprint: &Footprint) -> impl Iterator<Item = TriangleEntry> + '_ {
    footprint
        .triangles()
        .iter()
        .enumerate()
        .map(|(index, corners)| TriangleEntry::new(footprint.shape, index as u32, corners))
}

/// Every triangle of every registered footprint, keyed by its bounds.
/// Updates cost one tree insert or remove per triangle of the footprint.
#[derive(Debug, Clone, Default)]
pub struct TriangleTree {
    tree: RTree<TriangleEntry>,
}

impl TriangleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a packed tree in one pass
    pub fn from_footprints<'a>(footprints: impl Iterator<Item = &'a Footprint>) -> Self {
        let all: Vec<TriangleEntry> = footprints.flat_map(entries).collect();
        Self {
            tree: RTree::bulk_load(all),
        }
    }

    pub fn insert(&mut self, footprint: &Footprint) {
        for entry in entries(footprint) {
            self.tree.insert(entry);
        }
    }

    /// Removes every entry `insert` placed for this footprint. A missing
    /// entry means the tree has drifted from its footprints.
    pub fn remove(&mut self, footprint: &Footprint) -> Result<(), ObstructionError> {
        for entry in entries(footprint) {
            if self.tree.remove(&entry).is_none() {
                return Err(ObstructionError::InconsistentIndex {
                    shape: footprint.shape,
                    triangle: entry.reference.triangle,
                });
            }
        }
        Ok(())
    }

    /// Distinct triangle references whose bounds touch `bounds`
    pub fn candidates(&self, bounds: Aabb) -> BTreeSet<TriangleRef> {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(bounds))
            .map(|entry| entry.reference)
            .collect()
    }

    /// Distinct shapes with a triangle whose bounds touch `bounds`
    pub fn shapes_near(&self, bounds: Aabb) -> BTreeSet<ShapeId> {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(bounds))
            .map(|entry| entry.reference.shape)
            .collect()
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    #[cfg(test)]
    pub(crate) fn forget(&mut self, shape: ShapeId) {
        let kept: Vec<TriangleEntry> = self
            .tree
            .iter()
            .filter(|entry| entry.reference.shape != shape)
            .cloned()
            .collect();
        self.tree = RTree::bulk_load(kept);
    }
}
