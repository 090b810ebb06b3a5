//! Movement answers over a floor's movement index: whether a displaced
//! footprint is blocked, which trigger zones a move lands in, and lattice
//! routes around blockers.

use crate::components::ShapeId;
use crate::geometry::{Aabb, Point, Polygon, Vector};
use crate::obstruction::ObstructionIndex;
use bevy::prelude::*;
use pathfinding::prelude::astar;
use std::collections::{BTreeSet, HashMap};

pub mod trigger_zones;

pub use trigger_zones::*;

/// Result of testing a displacement against the movement index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveCheck {
    Clear,
    Blocked { by: Vec<ShapeId> },
}

impl MoveCheck {
    pub fn is_blocked(&self) -> bool {
        matches!(self, MoveCheck::Blocked { .. })
    }
}

/// Tests `footprint` displaced by `delta` against `index`. The moving shape
/// and everything in `moving_together` never block it.
pub fn check_move(
    index: &ObstructionIndex,
    shape: ShapeId,
    footprint: &Polygon,
    delta: Vector,
    moving_together: &BTreeSet<ShapeId>,
) -> MoveCheck {
    let displaced = footprint.translated(delta);
    let mut exclude = moving_together.clone();
    exclude.insert(shape);

    let by = index.query_blocking_excluding(&displaced, &exclude);
    if by.is_empty() {
        MoveCheck::Clear
    } else {
        MoveCheck::Blocked { by }
    }
}

/// Lattice used by [`find_route`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteConfig {
    /// Spacing of lattice nodes in floor units
    pub cell_size: f32,
    /// Extra distance kept from blockers on every side of a cell
    pub clearance: f32,
    /// Lattice cells searched beyond the start/goal bounding box
    pub search_margin: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            cell_size: 50.0,
            clearance: 0.0,
            search_margin: 20,
        }
    }
}

/// A single node of the route lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticeNode {
    pub x: i32,
    pub y: i32,
}

impl LatticeNode {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Nearest lattice node to a floor position
    pub fn from_point(point: Point, cell_size: f32) -> Self {
        Self::new(
            (point.x / cell_size).round() as i32,
            (point.y / cell_size).round() as i32,
        )
    }

    pub fn center(&self, cell_size: f32) -> Point {
        Vec2::new(self.x as f32 * cell_size, self.y as f32 * cell_size)
    }

    /// 4-directional neighbours
    pub fn neighbors(&self) -> [LatticeNode; 4] {
        [
            LatticeNode::new(self.x, self.y - 1),
            LatticeNode::new(self.x, self.y + 1),
            LatticeNode::new(self.x - 1, self.y),
            LatticeNode::new(self.x + 1, self.y),
        ]
    }

    /// Manhattan distance, the A* heuristic
    pub fn manhattan_distance(&self, other: &LatticeNode) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

const STEP_COST: u32 = 10;

fn cell_blocked(index: &ObstructionIndex, node: LatticeNode, config: &RouteConfig) -> bool {
    let half = config.cell_size * 0.5 + config.clearance;
    Polygon::from_aabb(Aabb::around(node.center(config.cell_size), half))
        .map(|cell| index.is_blocked(&cell))
        .unwrap_or(true)
}

/// Drops intermediate waypoints that continue straight on
fn simplify_route(waypoints: Vec<Point>) -> Vec<Point> {
    if waypoints.len() <= 2 {
        return waypoints;
    }

    let mut kept = vec![waypoints[0]];
    for window in waypoints.windows(3) {
        let (prev, current, next) = (window[0], window[1], window[2]);
        if (current - prev).perp_dot(next - current) != 0.0 {
            kept.push(current);
        }
    }
    if let Some(last) = waypoints.last() {
        kept.push(*last);
    }
    kept
}

/// Shortest 4-connected lattice route from `from` to `to` avoiding the
/// footprints of `index`. Returns floor positions starting at `from` and
/// ending at `to`, or `None` when either end is blocked or no route exists
/// inside the search window.
pub fn find_route(index: &ObstructionIndex, from: Point, to: Point, config: &RouteConfig) -> Option<Vec<Point>> {
    let start = LatticeNode::from_point(from, config.cell_size);
    let goal = LatticeNode::from_point(to, config.cell_size);
    let margin = config.search_margin as i32;
    let (min_x, max_x) = (start.x.min(goal.x) - margin, start.x.max(goal.x) + margin);
    let (min_y, max_y) = (start.y.min(goal.y) - margin, start.y.max(goal.y) + margin);

    let start_blocked = cell_blocked(index, start, config);
    let goal_blocked = cell_blocked(index, goal, config);
    if start_blocked || goal_blocked {
        warn!("Route search failed: start_blocked={start_blocked}, goal_blocked={goal_blocked}");
        return None;
    }

    let mut blocked_cache: HashMap<LatticeNode, bool> = HashMap::new();
    let (path, cost) = astar(
        &start,
        |node| {
            node.neighbors()
                .into_iter()
                .filter(|n| n.x >= min_x && n.x <= max_x && n.y >= min_y && n.y <= max_y)
                .filter(|n| !*blocked_cache.entry(*n).or_insert_with(|| cell_blocked(index, *n, config)))
                .map(|n| (n, STEP_COST))
                .collect::<Vec<_>>()
        },
        |node| node.manhattan_distance(&goal) * STEP_COST,
        |node| *node == goal,
    )?;

    let raw_len = path.len();
    let mut waypoints: Vec<Point> = path.iter().map(|node| node.center(config.cell_size)).collect();
    if let Some(first) = waypoints.first_mut() {
        *first = from;
    }
    if let Some(last) = waypoints.last_mut() {
        *last = to;
    }
    if raw_len == 1 {
        waypoints = vec![from, to];
    }

    let route = simplify_route(waypoints);
    debug!(
        "Route found: {} lattice steps (cost {}), {} waypoints",
        raw_len.saturating_sub(1),
        cost,
        route.len()
    );
    Some(route)
}
