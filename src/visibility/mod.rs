//! Line-of-sight regions computed by an angular ray sweep against a floor's
//! vision index.
//!
//! Rays are cast at every footprint vertex inside the observer's extent and
//! slightly to either side of it, so the sweep slips past corners. The nearest
//! hit of each ray becomes one boundary vertex; the sorted hits form a
//! star-shaped polygon around the observer.

use crate::components::ShapeId;
use crate::config::range_types::VisionRange;
use crate::geometry::{Aabb, Point, crossing_number_contains, ray_segment_hit, to_array_p};
use crate::obstruction::ObstructionIndex;
use bevy::prelude::*;
use std::collections::BTreeSet;

/// Angular offset of the side rays cast around every vertex, in radians
const RAY_EPSILON: f32 = 1e-4;

/// Hits closer than this only count when the ray actually enters the blocker
const GRAZE_DISTANCE: f32 = 1e-3;

/// Region visible from one observer
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRegion {
    observer: Point,
    boundary: Vec<Point>,
    blocked_by: Vec<ShapeId>,
}

impl VisibleRegion {
    /// Nothing is visible, as for an observer inside a vision blocker
    pub fn empty(observer: Point) -> Self {
        Self {
            observer,
            boundary: Vec::new(),
            blocked_by: Vec::new(),
        }
    }

    pub fn observer(&self) -> Point {
        self.observer
    }

    /// Boundary vertices ordered by angle around the observer
    pub fn boundary(&self) -> &[Point] {
        &self.boundary
    }

    /// Vision blockers that cut into the region, ascending
    pub fn blocked_by(&self) -> &[ShapeId] {
        &self.blocked_by
    }

    pub fn is_empty(&self) -> bool {
        self.boundary.len() < 3
    }

    /// True when no blocker limits sight and the region is the full extent
    pub fn is_maximal(&self) -> bool {
        !self.is_empty() && self.blocked_by.is_empty()
    }

    /// Whether `point` is visible. Points on the boundary itself may go
    /// either way.
    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty() && crossing_number_contains(&self.boundary, point)
    }

    pub fn to_arrays(&self) -> Vec<[f32; 2]> {
        self.boundary.iter().copied().map(to_array_p).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: Point,
    b: Point,
    /// Position of the owning footprint; `None` for the extent border
    owner: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityCalculator {
    range: f32,
}

impl Default for VisibilityCalculator {
    fn default() -> Self {
        Self::new(VisionRange::default())
    }
}

impl VisibilityCalculator {
    pub fn new(range: VisionRange) -> Self {
        Self { range: range.get() }
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    /// Square the sweep is clipped to
    pub fn extent(&self, observer: Point) -> Aabb {
        Aabb::around(observer, self.range)
    }

    pub fn compute(&self, observer: Point, index: &ObstructionIndex) -> VisibleRegion {
        if !index.shapes_containing(observer).is_empty() {
            return VisibleRegion::empty(observer);
        }

        let extent = self.extent(observer);
        let footprints = index.footprints_within(extent);

        let mut segments: Vec<Segment> = Vec::new();
        for (owner, footprint) in footprints.iter().enumerate() {
            segments.extend(footprint.polygon().edges().map(|(a, b)| Segment {
                a,
                b,
                owner: Some(owner),
            }));
        }
        let corners = extent.corners();
        for i in 0..corners.len() {
            segments.push(Segment {
                a: corners[i],
                b: corners[(i + 1) % corners.len()],
                owner: None,
            });
        }

        let mut angles: Vec<f32> = Vec::with_capacity(segments.len() * 3);
        for segment in &segments {
            let offset = segment.a - observer;
            if offset.length_squared() == 0.0 {
                continue;
            }
            let angle = offset.y.atan2(offset.x);
            angles.extend([angle - RAY_EPSILON, angle, angle + RAY_EPSILON]);
        }
        angles.sort_by(|a, b| a.total_cmp(b));
        angles.dedup();

        let mut boundary: Vec<Point> = Vec::with_capacity(angles.len());
        let mut blocked_by = BTreeSet::new();
        for angle in angles {
            let direction = Vec2::from_angle(angle);
            let nearest = segments
                .iter()
                .filter_map(|s| {
                    let t = ray_segment_hit(observer, direction, s.a, s.b)?;
                    if t < GRAZE_DISTANCE {
                        // Observer on an outline: only rays heading into the blocker stop here
                        let probe = observer + direction * GRAZE_DISTANCE;
                        let entering = s.owner.is_some_and(|i| footprints[i].polygon().contains_point(probe));
                        if !entering {
                            return None;
                        }
                    }
                    Some((t, s.owner))
                })
                .min_by(|x, y| x.0.total_cmp(&y.0));

            let Some((distance, owner)) = nearest else {
                continue;
            };
            let hit = observer + direction * distance;
            if boundary.last().is_some_and(|last: &Point| last.distance_squared(hit) < 1e-8) {
                continue;
            }
            boundary.push(hit);
            if let Some(footprint) = owner.and_then(|i| footprints.get(i)) {
                blocked_by.insert(footprint.shape);
            }
        }

        trace!(
            "Visibility from ({:.1}, {:.1}): {} vertices, {} blockers",
            observer.x,
            observer.y,
            boundary.len(),
            blocked_by.len()
        );

        VisibleRegion {
            observer,
            boundary,
            blocked_by: blocked_by.into_iter().collect(),
        }
    }
}
