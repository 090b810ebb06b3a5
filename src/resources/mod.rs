use crate::config::range_types::*;
use crate::navigation::RouteConfig;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Resource, Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct VantageConfig {
    /// Map loaded by the probe when none is given on the command line
    pub default_map: Option<PathBuf>,
    pub settings: VantageSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
// NOTE: When adding new fields, update the Default impl below
pub struct VantageSettings {
    // Index settings
    /// Batches touching at least this many footprints of one index rebuild it; 0 disables
    pub rebuild_threshold: usize,

    // Vision settings
    pub vision_range: VisionRange,

    // Movement settings
    pub enforce_movement_blocking: bool,
    pub route_cell_size: CellSize,
    pub route_clearance: Clearance,
    pub route_search_margin: u32,
}

impl Default for VantageSettings {
    fn default() -> Self {
        Self {
            // Index settings
            rebuild_threshold: 256,

            // Vision settings
            vision_range: VisionRange::default(),

            // Movement settings
            enforce_movement_blocking: true,
            route_cell_size: CellSize::default(),
            route_clearance: Clearance::default(),
            route_search_margin: 20,
        }
    }
}

impl VantageSettings {
    pub fn route_config(&self) -> RouteConfig {
        RouteConfig {
            cell_size: self.route_cell_size.get(),
            clearance: self.route_clearance.get(),
            search_margin: self.route_search_margin,
        }
    }
}
