use crate::components::{FloorId, ShapeId, ShapeProperties};
use crate::geometry::{GeometryError, Point, Polygon, from_array_p};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outline of a shape relative to its reference point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outline {
    /// Axis-aligned rectangle whose top-left corner is the reference point
    Rect { width: f32, height: f32 },
    /// Arbitrary loop of offsets from the reference point
    Polygon { points: Vec<[f32; 2]> },
}

impl Outline {
    pub fn rect(width: f32, height: f32) -> Self {
        Self::Rect { width, height }
    }

    pub fn polygon(points: &[Point]) -> Self {
        Self::Polygon {
            points: points.iter().map(|p| [p.x, p.y]).collect(),
        }
    }

    /// Absolute outline points for a shape anchored at `ref_point`
    pub fn boundary(&self, ref_point: Point) -> Vec<Point> {
        match self {
            Self::Rect { width, height } => vec![
                ref_point,
                ref_point + Vec2::new(*width, 0.0),
                ref_point + Vec2::new(*width, *height),
                ref_point + Vec2::new(0.0, *height),
            ],
            Self::Polygon { points } => points
                .iter()
                .map(|p| ref_point + from_array_p(*p))
                .collect(),
        }
    }
}

/// A placed shape as the coordinator sees it
#[derive(Debug, Clone, PartialEq)]
pub struct SceneShape {
    pub id: ShapeId,
    pub floor: FloorId,
    pub ref_point: Point,
    pub outline: Outline,
    pub properties: ShapeProperties,
    /// Local-only shapes never produce position updates
    pub prevent_sync: bool,
}

impl SceneShape {
    pub fn new(id: ShapeId, floor: FloorId, ref_point: Point, outline: Outline) -> Self {
        Self {
            id,
            floor,
            ref_point,
            outline,
            properties: ShapeProperties::default(),
            prevent_sync: false,
        }
    }

    pub fn rect(id: ShapeId, floor: FloorId, top_left: Point, width: f32, height: f32) -> Self {
        Self::new(id, floor, top_left, Outline::rect(width, height))
    }

    pub fn with_properties(mut self, properties: ShapeProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_prevent_sync(mut self, prevent_sync: bool) -> Self {
        self.prevent_sync = prevent_sync;
        self
    }

    pub fn boundary(&self) -> Vec<Point> {
        self.outline.boundary(self.ref_point)
    }

    /// The current outline as a validated footprint
    pub fn footprint(&self) -> Result<Polygon, GeometryError> {
        Polygon::new(self.boundary())
    }
}

/// Every shape the coordinator manages, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: BTreeMap<ShapeId, SceneShape>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shape: SceneShape) -> Option<SceneShape> {
        self.shapes.insert(shape.id, shape)
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<SceneShape> {
        self.shapes.remove(&id)
    }

    pub fn get(&self, id: ShapeId) -> Option<&SceneShape> {
        self.shapes.get(&id)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut SceneShape> {
        self.shapes.get_mut(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneShape> {
        self.shapes.values()
    }

    /// Ids of the shapes placed on `floor`, ascending
    pub fn on_floor(&self, floor: FloorId) -> Vec<ShapeId> {
        self.shapes
            .values()
            .filter(|s| s.floor == floor)
            .map(|s| s.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_boundary_anchored_top_left() {
        let shape = SceneShape::rect(ShapeId(1), FloorId(0), Vec2::new(10.0, 20.0), 5.0, 3.0);
        assert_eq!(
            shape.boundary(),
            vec![
                Vec2::new(10.0, 20.0),
                Vec2::new(15.0, 20.0),
                Vec2::new(15.0, 23.0),
                Vec2::new(10.0, 23.0),
            ]
        );
        assert!(shape.footprint().is_ok());
    }

    #[test]
    fn test_polygon_outline_follows_ref_point() {
        let outline = Outline::polygon(&[Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(0.0, 4.0)]);
        let mut shape = SceneShape::new(ShapeId(2), FloorId(0), Vec2::ZERO, outline);
        shape.ref_point = Vec2::new(1.0, 1.0);
        assert_eq!(shape.boundary()[1], Vec2::new(5.0, 1.0));
    }

    #[test]
    fn test_zero_width_rect_has_no_footprint() {
        let shape = SceneShape::rect(ShapeId(3), FloorId(0), Vec2::ZERO, 0.0, 3.0);
        assert!(shape.footprint().is_err());
    }

    #[test]
    fn test_registry_on_floor() {
        let mut registry = ShapeRegistry::new();
        registry.insert(SceneShape::rect(ShapeId(2), FloorId(1), Vec2::ZERO, 1.0, 1.0));
        registry.insert(SceneShape::rect(ShapeId(1), FloorId(1), Vec2::ZERO, 1.0, 1.0));
        registry.insert(SceneShape::rect(ShapeId(3), FloorId(2), Vec2::ZERO, 1.0, 1.0));

        assert_eq!(registry.on_floor(FloorId(1)), vec![ShapeId(1), ShapeId(2)]);
        assert_eq!(registry.len(), 3);
    }
}
