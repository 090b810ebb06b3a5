use crate::components::{FloorId, ShapeId};
use crate::geometry::GeometryError;
use crate::scene::movement::MoveStage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VantageError {
    // Config-related errors
    #[error("Failed to get config directory")]
    ConfigDirNotFound,

    #[error("Failed to access config or map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    SerializationFailed(#[from] toml::ser::Error),

    #[error("Failed to deserialize config or map: {0}")]
    DeserializationFailed(#[from] toml::de::Error),

    #[error("Map file not found at path: {path}")]
    MapFileNotFound { path: PathBuf },

    #[error("Map validation failed: {reason}")]
    MapValidationFailed { reason: String },

    // Scene-related errors
    #[error("Invalid footprint: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Floor {floor} is not loaded")]
    FloorNotLoaded { floor: FloorId },

    #[error("Unknown shape {shape}")]
    UnknownShape { shape: ShapeId },

    #[error("Shape {shape} already exists")]
    DuplicateShape { shape: ShapeId },

    #[error("Cannot {attempted} a move in stage {current:?}")]
    MoveStage { current: MoveStage, attempted: &'static str },

    // Probe-related errors
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("{count} queries disagreed between incremental and rebuilt indices")]
    IndexMismatch { count: usize },
}

/// Result type alias for all operations
pub type VantageResult<T> = Result<T, VantageError>;
