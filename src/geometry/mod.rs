//! Floor-local 2D geometry: points, polygons and the intersection primitives
//! the obstruction indices are built on.
//!
//! Obstruction is an interior property. A point on a polygon outline is not
//! contained by it, and two shapes only overlap when their interiors share a
//! region of positive area. Shapes that merely share an edge or a corner never
//! block each other.

use bevy::prelude::*;
use thiserror::Error;

pub mod triangulation;

pub use triangulation::*;

/// A position in floor-local coordinates
pub type Point = Vec2;

/// A displacement in floor-local coordinates
pub type Vector = Vec2;

/// Reasons a point loop is rejected as a footprint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Polygon needs at least 3 distinct points, got {count}")]
    TooFewPoints { count: usize },

    #[error("Polygon encloses no area")]
    ZeroArea,

    #[error("Polygon edges {first} and {second} intersect")]
    SelfIntersecting { first: usize, second: usize },

    #[error("Polygon has a non-finite coordinate at index {index}")]
    NonFinite { index: usize },
}

pub fn add_p(point: Point, delta: Vector) -> Point {
    point + delta
}

pub fn sub_p(a: Point, b: Point) -> Vector {
    a - b
}

pub fn scale_v(vector: Vector, factor: f32) -> Vector {
    vector * factor
}

/// Wire representation of a point: an ordered `[x, y]` pair
pub fn to_array_p(point: Point) -> [f32; 2] {
    [point.x, point.y]
}

pub fn from_array_p(array: [f32; 2]) -> Point {
    Vec2::new(array[0], array[1])
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise
pub fn orientation(a: Point, b: Point, c: Point) -> f32 {
    (b - a).perp_dot(c - a)
}

/// Exact test for `point` lying on the closed segment `a..b`
pub fn point_on_segment(point: Point, a: Point, b: Point) -> bool {
    orientation(a, b, point) == 0.0
        && point.x >= a.x.min(b.x)
        && point.x <= a.x.max(b.x)
        && point.y >= a.y.min(b.y)
        && point.y <= a.y.max(b.y)
}

fn opposite_signs(a: f32, b: f32) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

/// Closed segment intersection: shared endpoints and collinear overlap count
pub fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let d1 = orientation(p2, q2, p1);
    let d2 = orientation(p2, q2, q1);
    let d3 = orientation(p1, q1, p2);
    let d4 = orientation(p1, q1, q2);

    if opposite_signs(d1, d2) && opposite_signs(d3, d4) {
        return true;
    }

    (d1 == 0.0 && point_on_segment(p1, p2, q2))
        || (d2 == 0.0 && point_on_segment(q1, p2, q2))
        || (d3 == 0.0 && point_on_segment(p2, p1, q1))
        || (d4 == 0.0 && point_on_segment(q2, p1, q1))
}

/// Proper crossing: the segments meet in a single point interior to both
pub fn segments_cross(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    opposite_signs(orientation(p2, q2, p1), orientation(p2, q2, q1))
        && opposite_signs(orientation(p1, q1, p2), orientation(p1, q1, q2))
}

/// Distance along `origin + t * direction` to segment `a..b`, if the ray hits it.
/// Parallel segments are never hit.
pub fn ray_segment_hit(origin: Point, direction: Vector, a: Point, b: Point) -> Option<f32> {
    let edge = b - a;
    let denom = direction.perp_dot(edge);
    if denom.abs() < 1e-9 {
        return None;
    }

    let offset = a - origin;
    let t = offset.perp_dot(edge) / denom;
    let u = offset.perp_dot(direction) / denom;
    (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
}

fn project(axis: Vector, triangle: &[Point; 3]) -> (f32, f32) {
    triangle
        .iter()
        .map(|p| axis.dot(*p))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        })
}

/// Separating-axis test on two triangles. Touching triangles are separated,
/// so this is true only when the interiors overlap.
pub fn triangles_overlap(a: &[Point; 3], b: &[Point; 3]) -> bool {
    for triangle in [a, b] {
        for i in 0..3 {
            let axis = (triangle[(i + 1) % 3] - triangle[i]).perp();
            let (min_a, max_a) = project(axis, a);
            let (min_b, max_b) = project(axis, b);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Square of half-size `half_extent` centred on `center`
    pub fn around(center: Point, half_extent: f32) -> Self {
        let extent = Vec2::splat(half_extent);
        Self::new(center - extent, center + extent)
    }

    pub fn from_points(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(Vec2::ZERO, Vec2::ZERO);
        };
        points
            .iter()
            .fold(Self::new(*first, *first), |bounds, p| {
                Self::new(bounds.min.min(*p), bounds.max.max(*p))
            })
    }

    /// Closed overlap test
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.min - Vec2::splat(margin), self.max + Vec2::splat(margin))
    }

    pub fn size(&self) -> Vector {
        self.max - self.min
    }

    /// Corners in counter-clockwise order starting at `min`
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}

/// A validated simple polygon: at least three distinct points, non-zero area,
/// no self-intersection. Point order is preserved as given.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
    bounds: Aabb,
}

impl Polygon {
    pub fn new(points: impl IntoIterator<Item = Point>) -> Result<Self, GeometryError> {
        let raw: Vec<Point> = points.into_iter().collect();
        if let Some(index) = raw.iter().position(|p| !p.is_finite()) {
            return Err(GeometryError::NonFinite { index });
        }

        let mut loop_points: Vec<Point> = Vec::with_capacity(raw.len());
        for point in raw {
            if loop_points.last() != Some(&point) {
                loop_points.push(point);
            }
        }
        while loop_points.len() > 1 && loop_points.first() == loop_points.last() {
            loop_points.pop();
        }

        if loop_points.len() < 3 {
            return Err(GeometryError::TooFewPoints {
                count: loop_points.len(),
            });
        }
        if signed_area(&loop_points) == 0.0 {
            // Zero area off a single line means the loop folds across itself
            if !all_collinear(&loop_points) {
                check_simple(&loop_points)?;
            }
            return Err(GeometryError::ZeroArea);
        }
        check_simple(&loop_points)?;

        let bounds = Aabb::from_points(&loop_points);
        Ok(Self {
            points: loop_points,
            bounds,
        })
    }

    /// Axis-aligned rectangle anchored at its top-left corner
    pub fn rectangle(top_left: Point, width: f32, height: f32) -> Result<Self, GeometryError> {
        Self::new([
            top_left,
            top_left + Vec2::new(width, 0.0),
            top_left + Vec2::new(width, height),
            top_left + Vec2::new(0.0, height),
        ])
    }

    pub fn from_aabb(bounds: Aabb) -> Result<Self, GeometryError> {
        Self::new(bounds.corners())
    }

    pub fn from_arrays(points: &[[f32; 2]]) -> Result<Self, GeometryError> {
        Self::new(points.iter().copied().map(from_array_p))
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn to_arrays(&self) -> Vec<[f32; 2]> {
        self.points.iter().copied().map(to_array_p).collect()
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closed edges `(points[i], points[i + 1])`, wrapping around
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    pub fn signed_area(&self) -> f32 {
        signed_area(&self.points)
    }

    /// Interior containment; points on the outline are outside
    pub fn contains_point(&self, point: Point) -> bool {
        if !self.bounds.contains_point(point) {
            return false;
        }
        if self.edges().any(|(a, b)| point_on_segment(point, a, b)) {
            return false;
        }
        crossing_number_contains(&self.points, point)
    }

    /// The same polygon displaced by `delta`. Translation keeps the outline
    /// simple, so the result is not re-validated.
    pub fn translated(&self, delta: Vector) -> Self {
        Self {
            points: self.points.iter().map(|p| *p + delta).collect(),
            bounds: Aabb::new(self.bounds.min + delta, self.bounds.max + delta),
        }
    }
}

/// Shoelace signed area; positive for counter-clockwise loops
pub fn signed_area(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f32 = (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum();
    twice * 0.5
}

/// Ray-casting point-in-polygon with the half-open rule on vertex rows.
/// Boundary points are classified arbitrarily; callers that care test the
/// outline first.
pub fn crossing_number_contains(points: &[Point], point: Point) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let intersect_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn all_collinear(points: &[Point]) -> bool {
    let Some(&origin) = points.first() else {
        return true;
    };
    let Some(&other) = points.iter().find(|p| **p != origin) else {
        return true;
    };
    points.iter().all(|&p| orientation(origin, other, p) == 0.0)
}

fn check_simple(points: &[Point]) -> Result<(), GeometryError> {
    let n = points.len();
    for i in 0..n {
        let (a1, b1) = (points[i], points[(i + 1) % n]);
        for j in (i + 1)..n {
            let (a2, b2) = (points[j], points[(j + 1) % n]);

            if j == i + 1 || (i == 0 && j == n - 1) {
                // Adjacent edges share one vertex; they may only fold back onto each other
                let (shared, first_end, second_end) = if j == i + 1 { (b1, a1, b2) } else { (a1, b1, a2) };
                let folds = orientation(first_end, shared, second_end) == 0.0
                    && (first_end - shared).dot(second_end - shared) > 0.0;
                if folds {
                    return Err(GeometryError::SelfIntersecting { first: i, second: j });
                }
                continue;
            }

            if segments_intersect(a1, b1, a2, b2) {
                return Err(GeometryError::SelfIntersecting { first: i, second: j });
            }
        }
    }
    Ok(())
}
