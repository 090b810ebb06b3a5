use crate::components::{FloorId, ShapeId};
use crate::geometry::{GeometryError, Point, Polygon};
use crate::obstruction::ObstructionIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Where a teleport zone sends shapes that land in it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportTarget {
    pub floor: FloorId,
    pub position: [f32; 2],
}

/// A moved shape whose footprint ended up overlapping a zone
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerHit {
    pub shape: ShapeId,
    pub zone: ShapeId,
    pub target: Option<TeleportTarget>,
}

/// Zones checked after every committed move on a floor. They share the
/// obstruction index machinery but never block anything themselves.
#[derive(Debug, Clone, Default)]
pub struct TriggerZones {
    zones: ObstructionIndex,
    targets: HashMap<ShapeId, Option<TeleportTarget>>,
}

impl TriggerZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_zone(
        &mut self,
        zone: ShapeId,
        points: &[Point],
        target: Option<TeleportTarget>,
    ) -> Result<(), GeometryError> {
        self.zones.register_points(zone, points)?;
        self.targets.insert(zone, target);
        Ok(())
    }

    pub fn remove_zone(&mut self, zone: ShapeId) -> bool {
        self.targets.remove(&zone);
        self.zones.unregister(zone)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones overlapped by each moved footprint. A zone never triggers itself.
    pub fn find_triggered(&self, moved: &[(ShapeId, Polygon)]) -> Vec<TriggerHit> {
        let mut hits = Vec::new();
        for (shape, footprint) in moved {
            let exclude: BTreeSet<ShapeId> = [*shape].into_iter().collect();
            for zone in self.zones.query_blocking_excluding(footprint, &exclude) {
                hits.push(TriggerHit {
                    shape: *shape,
                    zone,
                    target: self.targets.get(&zone).copied().flatten(),
                });
            }
        }
        hits
    }
}
