//! Boundaries to the systems the coordinator asks or notifies while moving
//! shapes: access control, initiative, networking and undo history.

use crate::components::ShapeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Movement,
    Vision,
    Edit,
}

pub trait AccessControl {
    fn has_access_to(&self, shape: ShapeId, capability: Capability) -> bool;

    /// Privileged users (the game master) bypass initiative restrictions
    fn is_privileged(&self) -> bool {
        false
    }
}

pub trait TurnOrder {
    fn is_active(&self) -> bool;
    fn active_actor(&self) -> Option<ShapeId>;
    /// Location setting restricting movement to the active actor
    fn limit_movement(&self) -> bool;
}

pub trait PositionSync {
    fn send_position_update(&mut self, shapes: &[ShapeId], temporary: bool);
}

pub trait History {
    fn record(&mut self, operation: MovementOperation);
}

/// One shape's displacement inside a movement operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMovement {
    pub shape: ShapeId,
    pub from: [f32; 2],
    pub to: [f32; 2],
}

/// Undoable record of a committed move
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementOperation {
    pub shapes: Vec<ShapeMovement>,
}

/// Grants every capability
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess {
    pub privileged: bool,
}

impl AccessControl for OpenAccess {
    fn has_access_to(&self, _shape: ShapeId, _capability: Capability) -> bool {
        true
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}

/// Grants movement on an explicit set of shapes
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    pub movable: HashSet<ShapeId>,
    pub privileged: bool,
}

impl AccessList {
    pub fn new(movable: impl IntoIterator<Item = ShapeId>) -> Self {
        Self {
            movable: movable.into_iter().collect(),
            privileged: false,
        }
    }
}

impl AccessControl for AccessList {
    fn has_access_to(&self, shape: ShapeId, capability: Capability) -> bool {
        self.privileged || (capability == Capability::Movement && self.movable.contains(&shape))
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}

/// Snapshot of an initiative tracker
#[derive(Debug, Clone, Copy, Default)]
pub struct InitiativeState {
    pub active: bool,
    pub actor: Option<ShapeId>,
    pub limit_movement: bool,
}

impl TurnOrder for InitiativeState {
    fn is_active(&self) -> bool {
        self.active
    }

    fn active_actor(&self) -> Option<ShapeId> {
        self.actor
    }

    fn limit_movement(&self) -> bool {
        self.limit_movement
    }
}

/// Collects outgoing position updates instead of sending them
#[derive(Debug, Clone, Default)]
pub struct PendingPositionUpdates {
    pub updates: Vec<(Vec<ShapeId>, bool)>,
}

impl PositionSync for PendingPositionUpdates {
    fn send_position_update(&mut self, shapes: &[ShapeId], temporary: bool) {
        self.updates.push((shapes.to_vec(), temporary));
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovementHistory {
    pub operations: Vec<MovementOperation>,
}

impl History for MovementHistory {
    fn record(&mut self, operation: MovementOperation) {
        self.operations.push(operation);
    }
}

/// Collaborators consulted and notified by one movement operation
pub struct MoveContext<'a> {
    pub access: &'a dyn AccessControl,
    pub turn_order: &'a dyn TurnOrder,
    pub sync: &'a mut dyn PositionSync,
    pub history: &'a mut dyn History,
}
