use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A route lattice spacing constrained to [1.0, 10000.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[serde(from = "f32")]
pub struct CellSize(f32);

impl CellSize {
    const MIN: f32 = 1.0;
    const MAX: f32 = 10_000.0;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl From<f32> for CellSize {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::new(50.0)
    }
}

/// A vision range (half-size of the sweep extent) constrained to [1.0, 1000000.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[serde(from = "f32")]
pub struct VisionRange(f32);

impl VisionRange {
    const MIN: f32 = 1.0;
    const MAX: f32 = 1_000_000.0;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl From<f32> for VisionRange {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl Default for VisionRange {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

/// A route clearance value constrained to [0.0, 1000.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[serde(from = "f32")]
pub struct Clearance(f32);

impl Clearance {
    const MIN: f32 = 0.0;
    const MAX: f32 = 1000.0;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl From<f32> for Clearance {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl Default for Clearance {
    fn default() -> Self {
        Self::new(0.0)
    }
}
