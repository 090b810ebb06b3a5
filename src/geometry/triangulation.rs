use super::{Point, orientation, signed_area};
use bevy::prelude::*;

/// Ear-clipping triangulation of a validated simple polygon.
///
/// Output triangles are counter-clockwise and cover the polygon exactly.
/// Collinear vertices are dropped before clipping since they contribute
/// zero-area ears.
pub fn triangulate(points: &[Point]) -> Vec<[Point; 3]> {
    let mut ring: Vec<Point> = points.to_vec();
    if signed_area(&ring) < 0.0 {
        ring.reverse();
    }
    drop_collinear(&mut ring);

    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));
    while ring.len() > 3 {
        let n = ring.len();
        let ear = match (0..n).find(|&i| is_ear(&ring, i)) {
            Some(i) => i,
            None => {
                // Rounding can leave no strict ear; clip the most convex vertex
                debug!("No clean ear among {} vertices, forcing one", n);
                (0..n)
                    .max_by(|&a, &b| corner_turn(&ring, a).total_cmp(&corner_turn(&ring, b)))
                    .unwrap_or(0)
            }
        };

        let prev = ring[(ear + n - 1) % n];
        let next = ring[(ear + 1) % n];
        triangles.push([prev, ring[ear], next]);
        ring.remove(ear);
        drop_collinear(&mut ring);
    }

    if ring.len() == 3 && orientation(ring[0], ring[1], ring[2]) != 0.0 {
        triangles.push([ring[0], ring[1], ring[2]]);
    }
    triangles
}

fn corner_turn(ring: &[Point], i: usize) -> f32 {
    let n = ring.len();
    orientation(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n])
}

fn is_ear(ring: &[Point], i: usize) -> bool {
    let n = ring.len();
    let (prev_index, next_index) = ((i + n - 1) % n, (i + 1) % n);
    let (a, b, c) = (ring[prev_index], ring[i], ring[next_index]);
    if orientation(a, b, c) <= 0.0 {
        return false;
    }

    ring.iter()
        .enumerate()
        .filter(|(j, _)| *j != prev_index && *j != i && *j != next_index)
        .all(|(_, &p)| p == a || p == b || p == c || !in_closed_triangle(p, a, b, c))
}

fn in_closed_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    orientation(a, b, p) >= 0.0 && orientation(b, c, p) >= 0.0 && orientation(c, a, p) >= 0.0
}

fn drop_collinear(ring: &mut Vec<Point>) {
    while ring.len() > 3 {
        let Some(flat) = (0..ring.len()).find(|&i| corner_turn(ring, i) == 0.0) else {
            return;
        };
        ring.remove(flat);
    }
}
