use super::collaborators::{MoveContext, MovementOperation};
use super::errors::{VantageError, VantageResult};
use super::movement::{MoveOutcome, MoveStage, ShapeMove, SkipReason, can_move};
use super::shapes::{Outline, SceneShape, ShapeRegistry};
use crate::components::{FloorId, ShapeId};
use crate::geometry::{Point, Polygon, Vector};
use crate::navigation::{self, MoveCheck, TeleportTarget, TriggerHit};
use crate::obstruction::{ObstructionRegistry, TargetKind};
use crate::resources::VantageSettings;
use crate::visibility::{VisibilityCalculator, VisibleRegion};
use bevy::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Notifications for downstream consumers (lighting, fog, rendering)
#[derive(Debug, Clone, PartialEq)]
pub enum ObstructionEvent {
    /// An index changed; answers derived from older generations are stale
    Recalculated {
        floor: FloorId,
        kind: TargetKind,
        generation: u64,
    },
    /// The floor needs redrawing; `full` when it was loaded or dropped
    FloorInvalidated { floor: FloorId, full: bool },
}

/// Footprints touched per kind since the last recalculation of a floor
#[derive(Debug, Clone, Copy, Default)]
struct PendingRecalculation {
    vision: usize,
    movement: usize,
}

impl PendingRecalculation {
    fn touch(&mut self, kind: TargetKind) {
        match kind {
            TargetKind::Vision => self.vision += 1,
            TargetKind::Movement => self.movement += 1,
        }
    }

    fn touched(&self) -> [(TargetKind, usize); 2] {
        [(TargetKind::Vision, self.vision), (TargetKind::Movement, self.movement)]
    }
}

/// Owns the shapes and obstruction indices of every loaded floor and applies
/// all mutations to them. Recalculation is deferred to the end of each
/// operation so a batch touching many shapes recalculates each affected
/// index once.
#[derive(Debug, Clone)]
pub struct MutationCoordinator {
    settings: VantageSettings,
    obstructions: ObstructionRegistry,
    shapes: ShapeRegistry,
    events: Vec<ObstructionEvent>,
}

impl Default for MutationCoordinator {
    fn default() -> Self {
        Self::new(VantageSettings::default())
    }
}

impl MutationCoordinator {
    pub fn new(settings: VantageSettings) -> Self {
        Self {
            obstructions: ObstructionRegistry::new(),
            settings,
            shapes: ShapeRegistry::new(),
            events: Vec::new(),
        }
    }

    pub fn settings(&self) -> &VantageSettings {
        &self.settings
    }

    pub fn obstructions(&self) -> &ObstructionRegistry {
        &self.obstructions
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn shape(&self, id: ShapeId) -> Option<&SceneShape> {
        self.shapes.get(id)
    }

    pub fn load_floor(&mut self, floor: FloorId) {
        if self.obstructions.floor(floor).is_none() {
            self.obstructions.load_floor(floor);
            self.events.push(ObstructionEvent::FloorInvalidated { floor, full: true });
        }
    }

    /// Drops the floor's indices, zones and shapes. Returns false when the
    /// floor was not loaded.
    pub fn remove_floor(&mut self, floor: FloorId) -> bool {
        if self.obstructions.remove_floor(floor).is_none() {
            return false;
        }
        for id in self.shapes.on_floor(floor) {
            self.shapes.remove(id);
        }
        self.events.push(ObstructionEvent::FloorInvalidated { floor, full: true });
        true
    }

    /// Groups structural mutations so each touched index recalculates once
    pub fn begin_batch(&mut self) -> MutationBatch<'_> {
        MutationBatch {
            coordinator: self,
            pending: BTreeMap::new(),
        }
    }

    pub fn add_teleport_zone(
        &mut self,
        floor: FloorId,
        zone: ShapeId,
        points: &[Point],
        target: Option<TeleportTarget>,
    ) -> VantageResult<()> {
        let obstructions = self
            .obstructions
            .floor_mut(floor)
            .ok_or(VantageError::FloorNotLoaded { floor })?;
        obstructions.zones_mut().add_zone(zone, points, target)?;
        Ok(())
    }

    pub fn remove_teleport_zone(&mut self, floor: FloorId, zone: ShapeId) -> bool {
        self.obstructions
            .floor_mut(floor)
            .is_some_and(|f| f.zones_mut().remove_zone(zone))
    }

    /// Sight polygon of an observer standing on `floor`
    pub fn visible_region(&self, floor: FloorId, observer: Point) -> VantageResult<VisibleRegion> {
        let index = self
            .obstructions
            .index(floor, TargetKind::Vision)
            .ok_or(VantageError::FloorNotLoaded { floor })?;
        Ok(VisibilityCalculator::new(self.settings.vision_range).compute(observer, index))
    }

    /// Whether `shape` could be displaced by `delta` without entering a movement blocker
    pub fn check_move(&self, shape: ShapeId, delta: Vector) -> VantageResult<MoveCheck> {
        let scene_shape = self.shapes.get(shape).ok_or(VantageError::UnknownShape { shape })?;
        self.check_displacement(scene_shape, delta, &BTreeSet::new())
    }

    fn check_displacement(
        &self,
        shape: &SceneShape,
        delta: Vector,
        moving_together: &BTreeSet<ShapeId>,
    ) -> VantageResult<MoveCheck> {
        let index = self
            .obstructions
            .index(shape.floor, TargetKind::Movement)
            .ok_or(VantageError::FloorNotLoaded { floor: shape.floor })?;
        // An outline without interior cannot overlap anything
        let Ok(footprint) = shape.footprint() else {
            return Ok(MoveCheck::Clear);
        };
        Ok(navigation::check_move(index, shape.id, &footprint, delta, moving_together))
    }

    /// Lattice route between two points of a floor around movement blockers
    pub fn find_route(&self, floor: FloorId, from: Point, to: Point) -> VantageResult<Option<Vec<Point>>> {
        let index = self
            .obstructions
            .index(floor, TargetKind::Movement)
            .ok_or(VantageError::FloorNotLoaded { floor })?;
        Ok(navigation::find_route(index, from, to, &self.settings.route_config()))
    }

    pub fn is_stale(&self, floor: FloorId, kind: TargetKind) -> bool {
        self.obstructions.is_stale(floor, kind)
    }

    pub fn mark_fresh(&mut self, floor: FloorId, kind: TargetKind) {
        self.obstructions.mark_fresh(floor, kind);
    }

    pub fn generation(&self, floor: FloorId, kind: TargetKind) -> u64 {
        self.obstructions.generation(floor, kind)
    }

    pub fn drain_events(&mut self) -> Vec<ObstructionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Moves `ids` by `delta`. Shapes the user may not move, or whose new
    /// position is blocked, stay where they are. Temporary moves (drag
    /// previews) keep the movement index untouched, are not recorded and
    /// recalculate nothing.
    pub fn move_shapes(
        &mut self,
        ids: &[ShapeId],
        delta: Vector,
        temporary: bool,
        ctx: &mut MoveContext<'_>,
    ) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();
        let mut operation = MovementOperation::default();
        let mut update_list = Vec::new();
        let mut pending: BTreeMap<FloorId, PendingRecalculation> = BTreeMap::new();
        let mut touched_floors = BTreeSet::new();

        let mut eligible = Vec::with_capacity(ids.len());
        let mut seen = BTreeSet::new();
        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            if !self.shapes.contains(id) {
                outcome.skipped.push((id, SkipReason::UnknownShape));
                continue;
            }
            if let Err(reason) = can_move(id, ctx.access, ctx.turn_order) {
                debug!("Shape {id} not moved: {reason:?}");
                outcome.skipped.push((id, reason));
                continue;
            }
            eligible.push(id);
        }

        if self.settings.enforce_movement_blocking {
            let rejected = self.reject_blocked(&eligible, delta);
            eligible.retain(|id| !rejected.contains_key(id));
            outcome.skipped.extend(rejected);
        }

        for id in eligible {
            let Some(shape) = self.shapes.get(id) else {
                continue;
            };
            let mut step = ShapeMove::new(shape, delta, temporary);
            let (floor, prevent_sync) = (shape.floor, shape.prevent_sync);

            if let Err(err) = self.apply_move(&mut step) {
                match err {
                    VantageError::Geometry(geometry) if step.stage() == MoveStage::Displaced => {
                        warn!("Shape {id} moved but its footprint was rejected: {geometry}");
                        outcome.footprint_errors.push((id, geometry));
                    }
                    other => {
                        warn!("Moving shape {id} failed: {other}");
                        outcome.skipped.push((id, SkipReason::Failed { reason: other.to_string() }));
                        continue;
                    }
                }
            }

            // Previews move the vision footprint but never recalculate
            if !temporary {
                for kind in step.affected_kinds() {
                    pending.entry(floor).or_default().touch(kind);
                }
            }
            operation.shapes.push(step.record());
            outcome.moved.push(id);
            touched_floors.insert(floor);
            if !prevent_sync {
                update_list.push(id);
            }
        }

        if !update_list.is_empty() {
            ctx.sync.send_position_update(&update_list, temporary);
        }
        if !temporary {
            if !operation.shapes.is_empty() {
                ctx.history.record(operation);
            }
            outcome.triggered = self.triggered_zones(&outcome.moved);
        }

        outcome.recalculated = self.flush(pending);
        for floor in touched_floors {
            self.events.push(ObstructionEvent::FloorInvalidated { floor, full: false });
        }
        outcome
    }

    /// Members of the group whose displaced footprint would overlap a
    /// movement blocker. Rejected members stay put, so the remaining members
    /// are checked again against them until no further member is rejected.
    fn reject_blocked(&self, group: &[ShapeId], delta: Vector) -> BTreeMap<ShapeId, SkipReason> {
        let mut moving_together: BTreeSet<ShapeId> = group.iter().copied().collect();
        let mut rejected = BTreeMap::new();
        loop {
            let mut newly_rejected = Vec::new();
            for &id in group {
                if rejected.contains_key(&id) {
                    continue;
                }
                let Some(shape) = self.shapes.get(id) else {
                    continue;
                };
                match self.check_displacement(shape, delta, &moving_together) {
                    Ok(MoveCheck::Clear) => {}
                    Ok(MoveCheck::Blocked { by }) => {
                        debug!("Shape {id} blocked by {by:?}");
                        newly_rejected.push((id, SkipReason::Blocked { by }));
                    }
                    Err(err) => newly_rejected.push((id, SkipReason::Failed { reason: err.to_string() })),
                }
            }
            if newly_rejected.is_empty() {
                return rejected;
            }
            for (id, reason) in newly_rejected {
                moving_together.remove(&id);
                rejected.insert(id, reason);
            }
        }
    }

    fn apply_move(&mut self, step: &mut ShapeMove) -> VantageResult<()> {
        step.remove_footprints(&mut self.obstructions)?;
        step.displace(&mut self.shapes)?;
        step.reinsert(&mut self.obstructions, &self.shapes)?;
        step.finish()?;
        Ok(())
    }

    fn triggered_zones(&self, moved: &[ShapeId]) -> Vec<TriggerHit> {
        let mut by_floor: BTreeMap<FloorId, Vec<(ShapeId, Polygon)>> = BTreeMap::new();
        for &id in moved {
            let Some(shape) = self.shapes.get(id) else {
                continue;
            };
            if let Ok(footprint) = shape.footprint() {
                by_floor.entry(shape.floor).or_default().push((id, footprint));
            }
        }

        let mut hits = Vec::new();
        for (floor, footprints) in by_floor {
            if let Some(obstructions) = self.obstructions.floor(floor) {
                hits.extend(obstructions.zones().find_triggered(&footprints));
            }
        }
        if !hits.is_empty() {
            info!("{} trigger zone hits after move", hits.len());
        }
        hits
    }

    fn flush(&mut self, pending: BTreeMap<FloorId, PendingRecalculation>) -> Vec<(FloorId, TargetKind)> {
        let mut recalculated = Vec::new();
        for (floor, touched) in pending {
            for (kind, count) in touched.touched() {
                if count == 0 {
                    continue;
                }
                let threshold = self.settings.rebuild_threshold;
                let Some(generation) = self.obstructions.recalculate(floor, kind, count, threshold) else {
                    continue;
                };
                debug!("Recalculated {kind} on floor {floor}: generation {generation}, {count} footprints touched");
                self.events.push(ObstructionEvent::Recalculated {
                    floor,
                    kind,
                    generation,
                });
                recalculated.push((floor, kind));
            }
        }
        recalculated
    }
}

/// Structural mutations whose recalculation is deferred to [`MutationBatch::commit`].
/// Indices are updated immediately; only the generation bump and events wait.
#[must_use = "a batch recalculates nothing until it is committed"]
pub struct MutationBatch<'c> {
    coordinator: &'c mut MutationCoordinator,
    pending: BTreeMap<FloorId, PendingRecalculation>,
}

impl MutationBatch<'_> {
    fn touch(&mut self, floor: FloorId, kind: TargetKind) {
        self.pending.entry(floor).or_default().touch(kind);
    }

    pub fn add_shape(&mut self, shape: SceneShape) -> VantageResult<()> {
        if self.coordinator.obstructions.floor(shape.floor).is_none() {
            return Err(VantageError::FloorNotLoaded { floor: shape.floor });
        }
        if self.coordinator.shapes.contains(shape.id) {
            return Err(VantageError::DuplicateShape { shape: shape.id });
        }

        let kinds = shape.properties.blocked_kinds();
        if !kinds.is_empty() {
            let footprint = shape.footprint()?;
            for kind in kinds {
                self.coordinator
                    .obstructions
                    .register_polygon(shape.floor, kind, shape.id, footprint.clone())?;
                self.touch(shape.floor, kind);
            }
        }
        self.coordinator.shapes.insert(shape);
        Ok(())
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> VantageResult<SceneShape> {
        let shape = self
            .coordinator
            .shapes
            .remove(id)
            .ok_or(VantageError::UnknownShape { shape: id })?;
        for kind in TargetKind::ALL {
            if self.coordinator.obstructions.unregister_footprint(shape.floor, kind, id) {
                self.touch(shape.floor, kind);
            }
        }
        Ok(shape)
    }

    /// Toggles one blocking flag, registering or unregistering the footprint
    pub fn set_blocking(&mut self, id: ShapeId, kind: TargetKind, blocks: bool) -> VantageResult<()> {
        let shape = self
            .coordinator
            .shapes
            .get(id)
            .ok_or(VantageError::UnknownShape { shape: id })?;
        if shape.properties.blocks(kind) == blocks {
            return Ok(());
        }

        let floor = shape.floor;
        if blocks {
            let footprint = shape.footprint()?;
            self.coordinator.obstructions.register_polygon(floor, kind, id, footprint)?;
        } else {
            self.coordinator.obstructions.unregister_footprint(floor, kind, id);
        }
        if let Some(shape) = self.coordinator.shapes.get_mut(id) {
            shape.properties.set(kind, blocks);
        }
        self.touch(floor, kind);
        Ok(())
    }

    /// Replaces a shape's outline. The new footprint is validated before any
    /// index changes, so a rejected outline leaves everything as it was.
    pub fn set_outline(&mut self, id: ShapeId, outline: Outline) -> VantageResult<()> {
        let shape = self
            .coordinator
            .shapes
            .get(id)
            .ok_or(VantageError::UnknownShape { shape: id })?;

        let mut updated = shape.clone();
        updated.outline = outline;
        let kinds = updated.properties.blocked_kinds();
        if !kinds.is_empty() {
            let footprint = updated.footprint()?;
            for kind in kinds {
                self.coordinator
                    .obstructions
                    .register_polygon(updated.floor, kind, id, footprint.clone())?;
                self.touch(updated.floor, kind);
            }
        }
        self.coordinator.shapes.insert(updated);
        Ok(())
    }

    /// Recalculates every index touched by the batch once and emits events
    pub fn commit(self) -> Vec<(FloorId, TargetKind)> {
        let floors: Vec<FloorId> = self.pending.keys().copied().collect();
        let recalculated = self.coordinator.flush(self.pending);
        for floor in floors {
            self.coordinator
                .events
                .push(ObstructionEvent::FloorInvalidated { floor, full: false });
        }
        recalculated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ShapeProperties;
    use crate::scene::collaborators::{AccessList, InitiativeState, MovementHistory, OpenAccess, PendingPositionUpdates};

    const FLOOR: FloorId = FloorId(1);

    fn coordinator() -> MutationCoordinator {
        let mut coordinator = MutationCoordinator::default();
        coordinator.load_floor(FLOOR);
        coordinator
    }

    fn rect(id: u64, x: f32, y: f32, size: f32, properties: ShapeProperties) -> SceneShape {
        SceneShape::rect(ShapeId(id), FLOOR, Vec2::new(x, y), size, size).with_properties(properties)
    }

    struct Harness {
        access: OpenAccess,
        turns: InitiativeState,
        sync: PendingPositionUpdates,
        history: MovementHistory,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                access: OpenAccess::default(),
                turns: InitiativeState::default(),
                sync: PendingPositionUpdates::default(),
                history: MovementHistory::default(),
            }
        }

        fn move_shapes(
            &mut self,
            coordinator: &mut MutationCoordinator,
            ids: &[ShapeId],
            delta: Vector,
            temporary: bool,
        ) -> MoveOutcome {
            let mut ctx = MoveContext {
                access: &self.access,
                turn_order: &self.turns,
                sync: &mut self.sync,
                history: &mut self.history,
            };
            coordinator.move_shapes(ids, delta, temporary, &mut ctx)
        }
    }

    #[test]
    fn test_batch_registers_by_flags() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 10.0, ShapeProperties::new(true, false))).unwrap();
        batch.add_shape(rect(2, 20.0, 0.0, 10.0, ShapeProperties::new(false, true))).unwrap();
        batch.add_shape(rect(3, 40.0, 0.0, 10.0, ShapeProperties::default())).unwrap();
        let recalculated = batch.commit();

        let obstructions = coordinator.obstructions();
        assert_eq!(obstructions.index(FLOOR, TargetKind::Movement).unwrap().len(), 1);
        assert_eq!(obstructions.index(FLOOR, TargetKind::Vision).unwrap().len(), 1);
        assert_eq!(recalculated, vec![(FLOOR, TargetKind::Vision), (FLOOR, TargetKind::Movement)]);
        assert_eq!(coordinator.generation(FLOOR, TargetKind::Vision), 1);
    }

    #[test]
    fn test_add_shape_rejects_degenerate_and_unloaded() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();

        let flat = SceneShape::rect(ShapeId(1), FLOOR, Vec2::ZERO, 0.0, 5.0).with_properties(ShapeProperties::wall());
        assert!(matches!(batch.add_shape(flat), Err(VantageError::Geometry(_))));

        let elsewhere = SceneShape::rect(ShapeId(2), FloorId(9), Vec2::ZERO, 5.0, 5.0);
        assert!(matches!(
            batch.add_shape(elsewhere),
            Err(VantageError::FloorNotLoaded { floor: FloorId(9) })
        ));

        batch.add_shape(rect(3, 0.0, 0.0, 5.0, ShapeProperties::wall())).unwrap();
        assert!(matches!(
            batch.add_shape(rect(3, 0.0, 0.0, 5.0, ShapeProperties::wall())),
            Err(VantageError::DuplicateShape { .. })
        ));
        batch.commit();
        assert!(!coordinator.shapes().contains(ShapeId(1)));
    }

    #[test]
    fn test_blocked_move_leaves_shape_in_place() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 1.0, ShapeProperties::new(true, false))).unwrap();
        batch.add_shape(rect(2, 1.0, 0.0, 1.0, ShapeProperties::new(true, false))).unwrap();
        batch.commit();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::new(1.0, 0.0), false);

        assert!(outcome.moved.is_empty());
        assert_eq!(
            outcome.skipped,
            vec![(ShapeId(1), SkipReason::Blocked { by: vec![ShapeId(2)] })]
        );
        assert_eq!(coordinator.shape(ShapeId(1)).unwrap().ref_point, Vec2::ZERO);
        assert!(harness.history.operations.is_empty());
    }

    #[test]
    fn test_committed_move_updates_indices_and_history() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 4.0, ShapeProperties::wall())).unwrap();
        batch.commit();
        coordinator.drain_events();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::new(10.0, 0.0), false);

        assert_eq!(outcome.moved, vec![ShapeId(1)]);
        let probe = Polygon::rectangle(Vec2::new(11.0, 1.0), 1.0, 1.0).unwrap();
        for kind in TargetKind::ALL {
            assert_eq!(coordinator.obstructions().query_blocking(FLOOR, kind, &probe), vec![ShapeId(1)]);
        }
        assert_eq!(harness.history.operations.len(), 1);
        assert_eq!(harness.history.operations[0].shapes[0].to, [10.0, 0.0]);
        assert_eq!(harness.sync.updates, vec![(vec![ShapeId(1)], false)]);
        assert!(outcome.recalculated_kind(TargetKind::Vision));
        assert!(outcome.recalculated_kind(TargetKind::Movement));

        let events = coordinator.drain_events();
        assert!(events.contains(&ObstructionEvent::FloorInvalidated { floor: FLOOR, full: false }));
        assert!(events.contains(&ObstructionEvent::Recalculated {
            floor: FLOOR,
            kind: TargetKind::Movement,
            generation: 2,
        }));
    }

    #[test]
    fn test_temporary_move_spares_movement_index() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 4.0, ShapeProperties::wall())).unwrap();
        batch.commit();
        coordinator.mark_fresh(FLOOR, TargetKind::Vision);
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::new(10.0, 0.0), true);

        assert_eq!(outcome.moved, vec![ShapeId(1)]);
        assert!(harness.history.operations.is_empty());
        assert_eq!(harness.sync.updates, vec![(vec![ShapeId(1)], true)]);
        assert!(outcome.recalculated.is_empty());
        for kind in TargetKind::ALL {
            assert_eq!(coordinator.generation(FLOOR, kind), 1);
        }
        assert!(!coordinator.is_stale(FLOOR, TargetKind::Vision));

        // Movement footprint still at the old spot, vision footprint follows
        let old_spot = Polygon::rectangle(Vec2::new(1.0, 1.0), 1.0, 1.0).unwrap();
        let new_spot = Polygon::rectangle(Vec2::new(11.0, 1.0), 1.0, 1.0).unwrap();
        let obstructions = coordinator.obstructions();
        assert_eq!(obstructions.query_blocking(FLOOR, TargetKind::Movement, &old_spot), vec![ShapeId(1)]);
        assert_eq!(obstructions.query_blocking(FLOOR, TargetKind::Vision, &new_spot), vec![ShapeId(1)]);
    }

    #[test]
    fn test_batch_move_recalculates_vision_once() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        for i in 0..50u64 {
            let properties = ShapeProperties::new(false, i < 3);
            batch.add_shape(rect(i, i as f32 * 20.0, 0.0, 10.0, properties)).unwrap();
        }
        batch.commit();
        let before = coordinator.generation(FLOOR, TargetKind::Vision);
        let mut harness = Harness::new();

        let ids: Vec<ShapeId> = (0..50).map(ShapeId).collect();
        let outcome = harness.move_shapes(&mut coordinator, &ids, Vec2::new(5.0, 5.0), false);

        assert_eq!(outcome.moved.len(), 50);
        assert_eq!(coordinator.generation(FLOOR, TargetKind::Vision), before + 1);
        assert_eq!(outcome.recalculated, vec![(FLOOR, TargetKind::Vision)]);
        assert_eq!(harness.history.operations.len(), 1);
        assert_eq!(harness.history.operations[0].shapes.len(), 50);
    }

    #[test]
    fn test_group_members_do_not_block_each_other() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 2.0, ShapeProperties::wall())).unwrap();
        batch.add_shape(rect(2, 2.0, 0.0, 2.0, ShapeProperties::wall())).unwrap();
        batch.commit();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1), ShapeId(2)], Vec2::new(1.0, 0.0), false);
        assert_eq!(outcome.moved, vec![ShapeId(1), ShapeId(2)]);
    }

    #[test]
    fn test_blocked_member_stays_an_obstacle_for_its_group() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        let blocker = ShapeProperties::new(true, false);
        batch.add_shape(rect(1, 0.0, 0.0, 1.0, blocker)).unwrap();
        batch.add_shape(rect(2, 1.5, 0.0, 1.0, blocker)).unwrap();
        batch.add_shape(rect(3, 3.0, 0.0, 1.0, blocker)).unwrap();
        batch.commit();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1), ShapeId(2)], Vec2::new(1.0, 0.0), false);

        assert!(outcome.moved.is_empty());
        assert_eq!(
            outcome.skipped,
            vec![
                (ShapeId(1), SkipReason::Blocked { by: vec![ShapeId(2)] }),
                (ShapeId(2), SkipReason::Blocked { by: vec![ShapeId(3)] }),
            ]
        );
        assert_eq!(coordinator.shape(ShapeId(1)).unwrap().ref_point, Vec2::ZERO);
        let movement = coordinator.obstructions().index(FLOOR, TargetKind::Movement).unwrap();
        for footprint in movement.footprints() {
            let others = movement.query_blocking(footprint.polygon());
            assert_eq!(others, vec![footprint.shape]);
        }
    }

    #[test]
    fn test_unblocked_member_moves_when_partner_is_blocked() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        let blocker = ShapeProperties::new(true, false);
        batch.add_shape(rect(1, 0.0, 10.0, 1.0, blocker)).unwrap();
        batch.add_shape(rect(2, 1.5, 0.0, 1.0, blocker)).unwrap();
        batch.add_shape(rect(3, 3.0, 0.0, 1.0, blocker)).unwrap();
        batch.commit();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1), ShapeId(2)], Vec2::new(1.0, 0.0), false);

        assert_eq!(outcome.moved, vec![ShapeId(1)]);
        assert_eq!(outcome.skipped, vec![(ShapeId(2), SkipReason::Blocked { by: vec![ShapeId(3)] })]);
    }

    #[test]
    fn test_line_marker_moves_with_blocking_enforced() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        let line = SceneShape::new(
            ShapeId(1),
            FLOOR,
            Vec2::ZERO,
            Outline::polygon(&[Vec2::ZERO, Vec2::new(10.0, 0.0)]),
        );
        batch.add_shape(line).unwrap();
        batch.add_shape(rect(2, 20.0, -5.0, 10.0, ShapeProperties::wall())).unwrap();
        batch.commit();
        let mut harness = Harness::new();

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::new(15.0, 0.0), false);

        assert_eq!(outcome.moved, vec![ShapeId(1)]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(coordinator.shape(ShapeId(1)).unwrap().ref_point, Vec2::new(15.0, 0.0));
        assert!(matches!(coordinator.check_move(ShapeId(1), Vec2::ONE), Ok(MoveCheck::Clear)));
    }

    #[test]
    fn test_access_and_prevent_sync() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 2.0, ShapeProperties::default())).unwrap();
        batch
            .add_shape(rect(2, 10.0, 0.0, 2.0, ShapeProperties::default()).with_prevent_sync(true))
            .unwrap();
        batch.add_shape(rect(3, 20.0, 0.0, 2.0, ShapeProperties::default())).unwrap();
        batch.commit();

        let access = AccessList::new([ShapeId(1), ShapeId(2)]);
        let turns = InitiativeState::default();
        let mut sync = PendingPositionUpdates::default();
        let mut history = MovementHistory::default();
        let mut ctx = MoveContext {
            access: &access,
            turn_order: &turns,
            sync: &mut sync,
            history: &mut history,
        };
        let ids = [ShapeId(1), ShapeId(2), ShapeId(3), ShapeId(4)];
        let outcome = coordinator.move_shapes(&ids, Vec2::new(0.0, 5.0), false, &mut ctx);

        assert_eq!(outcome.moved, vec![ShapeId(1), ShapeId(2)]);
        assert_eq!(
            outcome.skipped,
            vec![
                (ShapeId(3), SkipReason::AccessDenied),
                (ShapeId(4), SkipReason::UnknownShape),
            ]
        );
        assert_eq!(sync.updates, vec![(vec![ShapeId(1)], false)]);
        assert!(outcome.recalculated.is_empty());
    }

    #[test]
    fn test_teleport_zone_reported_after_commit() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 2.0, ShapeProperties::default())).unwrap();
        batch.commit();
        let target = TeleportTarget {
            floor: FloorId(2),
            position: [0.0, 0.0],
        };
        let zone = [
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(20.0, 10.0),
            Vec2::new(10.0, 10.0),
        ];
        coordinator.add_teleport_zone(FLOOR, ShapeId(100), &zone, Some(target)).unwrap();
        let mut harness = Harness::new();

        let preview = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::new(12.0, 2.0), true);
        assert!(preview.triggered.is_empty());

        let outcome = harness.move_shapes(&mut coordinator, &[ShapeId(1)], Vec2::ZERO, false);
        assert_eq!(
            outcome.triggered,
            vec![TriggerHit {
                shape: ShapeId(1),
                zone: ShapeId(100),
                target: Some(target),
            }]
        );
    }

    #[test]
    fn test_set_outline_rejects_invalid_without_changes() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 4.0, ShapeProperties::wall())).unwrap();
        assert!(batch.set_outline(ShapeId(1), Outline::rect(0.0, 0.0)).is_err());
        batch.set_outline(ShapeId(1), Outline::rect(8.0, 8.0)).unwrap();
        batch.commit();

        let probe = Polygon::rectangle(Vec2::new(6.0, 6.0), 1.0, 1.0).unwrap();
        assert_eq!(
            coordinator.obstructions().query_blocking(FLOOR, TargetKind::Vision, &probe),
            vec![ShapeId(1)]
        );
    }

    #[test]
    fn test_set_blocking_and_remove() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 4.0, ShapeProperties::default())).unwrap();
        batch.set_blocking(ShapeId(1), TargetKind::Vision, true).unwrap();
        batch.commit();

        let probe = Polygon::rectangle(Vec2::new(1.0, 1.0), 1.0, 1.0).unwrap();
        assert!(coordinator.obstructions().index(FLOOR, TargetKind::Vision).unwrap().is_blocked(&probe));
        assert!(coordinator.is_stale(FLOOR, TargetKind::Vision));
        coordinator.mark_fresh(FLOOR, TargetKind::Vision);

        let mut batch = coordinator.begin_batch();
        batch.remove_shape(ShapeId(1)).unwrap();
        assert!(matches!(batch.remove_shape(ShapeId(1)), Err(VantageError::UnknownShape { .. })));
        batch.commit();

        assert!(!coordinator.obstructions().index(FLOOR, TargetKind::Vision).unwrap().is_blocked(&probe));
        assert!(coordinator.is_stale(FLOOR, TargetKind::Vision));
    }

    #[test]
    fn test_visibility_through_coordinator() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 4.0, 4.0, 2.0, ShapeProperties::new(false, true))).unwrap();
        batch.commit();

        let region = coordinator.visible_region(FLOOR, Vec2::ZERO).unwrap();
        assert!(!region.contains(Vec2::new(10.0, 10.0)));
        assert!(region.contains(Vec2::new(0.0, 5.0)));
        assert!(matches!(
            coordinator.visible_region(FloorId(7), Vec2::ZERO),
            Err(VantageError::FloorNotLoaded { .. })
        ));
    }

    #[test]
    fn test_remove_floor_drops_shapes() {
        let mut coordinator = coordinator();
        let mut batch = coordinator.begin_batch();
        batch.add_shape(rect(1, 0.0, 0.0, 4.0, ShapeProperties::wall())).unwrap();
        batch.commit();
        coordinator.drain_events();

        assert!(coordinator.remove_floor(FLOOR));
        assert!(coordinator.shapes().is_empty());
        assert!(!coordinator.remove_floor(FLOOR));
        assert_eq!(
            coordinator.drain_events(),
            vec![ObstructionEvent::FloorInvalidated { floor: FLOOR, full: true }]
        );
    }
}
