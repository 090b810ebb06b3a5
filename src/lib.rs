pub mod components;
pub mod config;
pub mod geometry;
pub mod map;
pub mod navigation;
pub mod obstruction;
pub mod plugins;
pub mod resources;
pub mod scene;
pub mod visibility;

// Selective re-exports for external consumers

// Plugins - host apps add these directly
pub use plugins::*;

// Errors - every fallible operation returns these
pub use scene::errors::{VantageError, VantageResult};

// Core types - the probe binary and embedding apps need these
pub use components::{FloorId, ShapeId, ShapeProperties};
pub use map::MapDefinition;
pub use obstruction::{ObstructionIndex, TargetKind};
pub use scene::{MutationBatch, MutationCoordinator, SceneShape};
pub use visibility::{VisibilityCalculator, VisibleRegion};
