//! Per-shape move steps and eligibility.
//!
//! A move walks `Idle -> PendingRemoval -> Displaced -> PendingReinsertion -> Idle`:
//! old footprints leave the indices, the reference point changes, new
//! footprints enter the indices, and the step is finished into an undo record.

use super::collaborators::{AccessControl, Capability, ShapeMovement, TurnOrder};
use super::errors::{VantageError, VantageResult};
use super::shapes::{SceneShape, ShapeRegistry};
use crate::components::{FloorId, ShapeId, ShapeProperties};
use crate::geometry::{GeometryError, Point, Vector, to_array_p};
use crate::navigation::TriggerHit;
use crate::obstruction::{ObstructionRegistry, TargetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStage {
    Idle,
    PendingRemoval,
    Displaced,
    PendingReinsertion,
}

/// Why a requested shape was left in place
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnknownShape,
    AccessDenied,
    TurnRestricted,
    Blocked { by: Vec<ShapeId> },
    Failed { reason: String },
}

/// Everything one `move_shapes` call did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveOutcome {
    pub moved: Vec<ShapeId>,
    pub skipped: Vec<(ShapeId, SkipReason)>,
    /// Moved shapes whose new outline could not be indexed
    pub footprint_errors: Vec<(ShapeId, GeometryError)>,
    pub triggered: Vec<TriggerHit>,
    pub recalculated: Vec<(FloorId, TargetKind)>,
}

impl MoveOutcome {
    pub fn recalculated_kind(&self, kind: TargetKind) -> bool {
        self.recalculated.iter().any(|(_, k)| *k == kind)
    }
}

/// Whether the current user may move `shape` right now
pub fn can_move(shape: ShapeId, access: &dyn AccessControl, turns: &dyn TurnOrder) -> Result<(), SkipReason> {
    if !access.has_access_to(shape, Capability::Movement) {
        return Err(SkipReason::AccessDenied);
    }
    if !turns.limit_movement() || !turns.is_active() || access.is_privileged() {
        return Ok(());
    }
    if turns.active_actor() == Some(shape) {
        Ok(())
    } else {
        Err(SkipReason::TurnRestricted)
    }
}

/// One shape's progress through a move
#[derive(Debug, Clone)]
pub struct ShapeMove {
    shape: ShapeId,
    floor: FloorId,
    properties: ShapeProperties,
    from: Point,
    to: Point,
    temporary: bool,
    stage: MoveStage,
}

impl ShapeMove {
    pub fn new(shape: &SceneShape, delta: Vector, temporary: bool) -> Self {
        Self {
            shape: shape.id,
            floor: shape.floor,
            properties: shape.properties,
            from: shape.ref_point,
            to: shape.ref_point + delta,
            temporary,
            stage: MoveStage::Idle,
        }
    }

    pub fn stage(&self) -> MoveStage {
        self.stage
    }

    /// Indices whose footprint follows this move. Temporary moves leave the
    /// movement index alone until a committing move.
    pub fn affected_kinds(&self) -> Vec<TargetKind> {
        let mut kinds = Vec::new();
        if self.properties.blocks_vision {
            kinds.push(TargetKind::Vision);
        }
        if self.properties.blocks_movement && !self.temporary {
            kinds.push(TargetKind::Movement);
        }
        kinds
    }

    fn advance(&mut self, expected: MoveStage, next: MoveStage, attempted: &'static str) -> VantageResult<()> {
        if self.stage != expected {
            return Err(VantageError::MoveStage {
                current: self.stage,
                attempted,
            });
        }
        self.stage = next;
        Ok(())
    }

    pub fn remove_footprints(&mut self, obstructions: &mut ObstructionRegistry) -> VantageResult<()> {
        self.advance(MoveStage::Idle, MoveStage::PendingRemoval, "remove footprints of")?;
        for kind in self.affected_kinds() {
            obstructions.unregister_footprint(self.floor, kind, self.shape);
        }
        Ok(())
    }

    pub fn displace(&mut self, shapes: &mut ShapeRegistry) -> VantageResult<()> {
        let shape = shapes
            .get_mut(self.shape)
            .ok_or(VantageError::UnknownShape { shape: self.shape })?;
        self.advance(MoveStage::PendingRemoval, MoveStage::Displaced, "displace")?;
        shape.ref_point = self.to;
        Ok(())
    }

    pub fn reinsert(&mut self, obstructions: &mut ObstructionRegistry, shapes: &ShapeRegistry) -> VantageResult<()> {
        if self.stage != MoveStage::Displaced {
            return Err(VantageError::MoveStage {
                current: self.stage,
                attempted: "reinsert",
            });
        }
        let shape = shapes
            .get(self.shape)
            .ok_or(VantageError::UnknownShape { shape: self.shape })?;
        let kinds = self.affected_kinds();
        if !kinds.is_empty() {
            let footprint = shape.footprint()?;
            for kind in kinds {
                obstructions.register_polygon(self.floor, kind, self.shape, footprint.clone())?;
            }
        }
        self.stage = MoveStage::PendingReinsertion;
        Ok(())
    }

    pub fn finish(&mut self) -> VantageResult<ShapeMovement> {
        self.advance(MoveStage::PendingReinsertion, MoveStage::Idle, "finish")?;
        Ok(self.record())
    }

    pub fn record(&self) -> ShapeMovement {
        ShapeMovement {
            shape: self.shape,
            from: to_array_p(self.from),
            to: to_array_p(self.to),
        }
    }
}
