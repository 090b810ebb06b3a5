use super::{ObstructionIndex, TargetKind};
use crate::components::{FloorId, ShapeId};
use crate::geometry::{Point, Polygon};
use crate::navigation::TriggerZones;
use crate::scene::errors::{VantageError, VantageResult};
use bevy::prelude::*;
use std::collections::HashMap;

/// Generation counter and staleness of one index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalculationState {
    pub generation: u64,
    pub stale: bool,
}

/// Both obstruction indices of a floor, its trigger zones and their
/// recalculation state
#[derive(Debug, Clone)]
pub struct FloorObstructions {
    pub id: FloorId,
    vision: ObstructionIndex,
    movement: ObstructionIndex,
    zones: TriggerZones,
    vision_state: RecalculationState,
    movement_state: RecalculationState,
}

impl FloorObstructions {
    pub fn new(id: FloorId) -> Self {
        Self {
            id,
            vision: ObstructionIndex::new(),
            movement: ObstructionIndex::new(),
            zones: TriggerZones::new(),
            vision_state: RecalculationState::default(),
            movement_state: RecalculationState::default(),
        }
    }

    pub fn index(&self, kind: TargetKind) -> &ObstructionIndex {
        match kind {
            TargetKind::Vision => &self.vision,
            TargetKind::Movement => &self.movement,
        }
    }

    pub fn index_mut(&mut self, kind: TargetKind) -> &mut ObstructionIndex {
        match kind {
            TargetKind::Vision => &mut self.vision,
            TargetKind::Movement => &mut self.movement,
        }
    }

    pub fn zones(&self) -> &TriggerZones {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut TriggerZones {
        &mut self.zones
    }

    pub fn state(&self, kind: TargetKind) -> RecalculationState {
        match kind {
            TargetKind::Vision => self.vision_state,
            TargetKind::Movement => self.movement_state,
        }
    }

    fn state_mut(&mut self, kind: TargetKind) -> &mut RecalculationState {
        match kind {
            TargetKind::Vision => &mut self.vision_state,
            TargetKind::Movement => &mut self.movement_state,
        }
    }
}

/// All loaded floors. Operations on a floor that is not loaded are no-ops or
/// return empty results, except registration which reports it.
#[derive(Debug, Clone, Default)]
pub struct ObstructionRegistry {
    floors: HashMap<FloorId, FloorObstructions>,
}

impl ObstructionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty indices for `floor` unless it is already loaded
    pub fn load_floor(&mut self, floor: FloorId) -> &mut FloorObstructions {
        self.floors.entry(floor).or_insert_with(|| {
            info!("Loaded obstruction indices for floor {floor}");
            FloorObstructions::new(floor)
        })
    }

    pub fn remove_floor(&mut self, floor: FloorId) -> Option<FloorObstructions> {
        let removed = self.floors.remove(&floor);
        if removed.is_some() {
            info!("Dropped obstruction indices for floor {floor}");
        }
        removed
    }

    pub fn floor(&self, floor: FloorId) -> Option<&FloorObstructions> {
        self.floors.get(&floor)
    }

    pub fn floor_mut(&mut self, floor: FloorId) -> Option<&mut FloorObstructions> {
        self.floors.get_mut(&floor)
    }

    pub fn floor_ids(&self) -> Vec<FloorId> {
        let mut ids: Vec<FloorId> = self.floors.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn index(&self, floor: FloorId, kind: TargetKind) -> Option<&ObstructionIndex> {
        self.floors.get(&floor).map(|f| f.index(kind))
    }

    /// Validates `points` and registers them as the footprint of `shape`,
    /// replacing any previous one
    pub fn register_footprint(
        &mut self,
        floor: FloorId,
        kind: TargetKind,
        shape: ShapeId,
        points: &[Point],
    ) -> VantageResult<()> {
        let polygon = Polygon::new(points.iter().copied())?;
        self.register_polygon(floor, kind, shape, polygon)
    }

    pub fn register_polygon(
        &mut self,
        floor: FloorId,
        kind: TargetKind,
        shape: ShapeId,
        polygon: Polygon,
    ) -> VantageResult<()> {
        let obstructions = self
            .floors
            .get_mut(&floor)
            .ok_or(VantageError::FloorNotLoaded { floor })?;
        obstructions.index_mut(kind).register(shape, polygon);
        Ok(())
    }

    /// Returns whether a footprint was removed
    pub fn unregister_footprint(&mut self, floor: FloorId, kind: TargetKind, shape: ShapeId) -> bool {
        self.floors
            .get_mut(&floor)
            .is_some_and(|f| f.index_mut(kind).unregister(shape))
    }

    pub fn query_blocking(&self, floor: FloorId, kind: TargetKind, region: &Polygon) -> Vec<ShapeId> {
        self.index(floor, kind)
            .map(|index| index.query_blocking(region))
            .unwrap_or_default()
    }

    pub fn rebuild(&mut self, floor: FloorId, kind: TargetKind) {
        if let Some(obstructions) = self.floors.get_mut(&floor) {
            obstructions.index_mut(kind).rebuild();
        }
    }

    /// Marks derived answers of one index stale and advances its generation.
    /// Batches that touched at least `rebuild_threshold` footprints rebuild
    /// the index outright. Returns the new generation.
    pub fn recalculate(
        &mut self,
        floor: FloorId,
        kind: TargetKind,
        touched: usize,
        rebuild_threshold: usize,
    ) -> Option<u64> {
        let obstructions = self.floors.get_mut(&floor)?;
        if rebuild_threshold > 0 && touched >= rebuild_threshold {
            debug!("{touched} {kind} footprints touched on floor {floor}, rebuilding");
            obstructions.index_mut(kind).rebuild();
        }
        let state = obstructions.state_mut(kind);
        state.generation += 1;
        state.stale = true;
        Some(state.generation)
    }

    pub fn is_stale(&self, floor: FloorId, kind: TargetKind) -> bool {
        self.floors.get(&floor).is_some_and(|f| f.state(kind).stale)
    }

    pub fn mark_fresh(&mut self, floor: FloorId, kind: TargetKind) {
        if let Some(obstructions) = self.floors.get_mut(&floor) {
            obstructions.state_mut(kind).stale = false;
        }
    }

    pub fn generation(&self, floor: FloorId, kind: TargetKind) -> u64 {
        self.floors
            .get(&floor)
            .map(|f| f.state(kind).generation)
            .unwrap_or_default()
    }
}
