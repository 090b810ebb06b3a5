use crate::obstruction::TargetKind;
use bevy::prelude::*;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Stable identity of a shape across moves and re-registrations
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
pub struct ShapeId(pub u64);

/// A floor (layer group) of a location; every floor owns its own indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
pub struct FloorId(pub u32);

/// Which obstruction indices a shape's footprint belongs to
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeProperties {
    pub blocks_movement: bool,
    pub blocks_vision: bool,
}

impl ShapeProperties {
    pub fn new(blocks_movement: bool, blocks_vision: bool) -> Self {
        Self {
            blocks_movement,
            blocks_vision,
        }
    }

    /// Both flags set, as for walls
    pub fn wall() -> Self {
        Self::new(true, true)
    }

    pub fn blocks(&self, kind: TargetKind) -> bool {
        match kind {
            TargetKind::Vision => self.blocks_vision,
            TargetKind::Movement => self.blocks_movement,
        }
    }

    pub fn set(&mut self, kind: TargetKind, blocks: bool) {
        match kind {
            TargetKind::Vision => self.blocks_vision = blocks,
            TargetKind::Movement => self.blocks_movement = blocks,
        }
    }

    /// Kinds this shape currently blocks, vision first
    pub fn blocked_kinds(&self) -> Vec<TargetKind> {
        TargetKind::ALL
            .into_iter()
            .filter(|kind| self.blocks(*kind))
            .collect()
    }
}
