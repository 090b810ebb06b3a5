use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use vantage::geometry::{Aabb, Polygon};
use vantage::resources::VantageSettings;
use vantage::scene::{
    InitiativeState, MoveContext, MovementHistory, OpenAccess, PendingPositionUpdates,
};
use vantage::{
    FloorId, MutationCoordinator, SceneShape, ShapeId, ShapeProperties, TargetKind, VantageError, VantageResult,
};

const STRESS_FLOOR: FloorId = FloorId(0);

pub struct StressConfig {
    pub shapes: usize,
    pub moves: usize,
    pub seed: u64,
    /// Side length of the square the shapes are scattered in
    pub extent: f32,
    pub probes: usize,
}

#[derive(Debug, Default)]
pub struct StressReport {
    pub moved: usize,
    pub skipped: usize,
    pub probes_checked: usize,
    pub mismatches: Vec<String>,
    pub recoveries: usize,
    pub generations: Vec<(TargetKind, u64)>,
}

impl StressReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Drives random adds and moves through a coordinator, then checks that every
/// incrementally maintained index answers like a freshly rebuilt copy
pub fn run(config: &StressConfig, settings: VantageSettings) -> VantageResult<StressReport> {
    if !config.extent.is_finite() || config.extent <= 0.0 {
        return Err(VantageError::InvalidArgument {
            reason: format!("extent must be a positive number, got {}", config.extent),
        });
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut coordinator = MutationCoordinator::new(settings);
    coordinator.load_floor(STRESS_FLOOR);

    let mut batch = coordinator.begin_batch();
    for n in 0..config.shapes {
        let shape = random_shape(&mut rng, ShapeId(n as u64 + 1), config.extent);
        batch.add_shape(shape)?;
    }
    batch.commit();
    info!("Registered {} random shapes (seed {})", config.shapes, config.seed);

    let access = OpenAccess { privileged: true };
    let turn_order = InitiativeState::default();
    let mut sync = PendingPositionUpdates::default();
    let mut history = MovementHistory::default();
    let mut report = StressReport::default();

    for _ in 0..config.moves {
        if config.shapes == 0 {
            break;
        }
        let group_size = rng.gen_range(1..=config.shapes.min(4));
        let ids: BTreeSet<ShapeId> = (0..group_size)
            .map(|_| ShapeId(rng.gen_range(1..=config.shapes as u64)))
            .collect();
        let ids: Vec<ShapeId> = ids.into_iter().collect();
        let delta = Vec2::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0));
        let temporary = rng.gen_bool(0.2);

        let mut ctx = MoveContext {
            access: &access,
            turn_order: &turn_order,
            sync: &mut sync,
            history: &mut history,
        };
        let outcome = coordinator.move_shapes(&ids, delta, temporary, &mut ctx);
        report.moved += outcome.moved.len();
        report.skipped += outcome.skipped.len();
    }
    debug!(
        "Applied {} shape moves, {} skipped, {} history entries",
        report.moved,
        report.skipped,
        history.operations.len()
    );

    for kind in TargetKind::ALL {
        let Some(index) = coordinator.obstructions().index(STRESS_FLOOR, kind) else {
            continue;
        };
        let mut rebuilt = index.clone();
        rebuilt.rebuild();
        report.recoveries += index.rebuild_count();
        report.generations.push((kind, coordinator.generation(STRESS_FLOOR, kind)));

        for _ in 0..config.probes {
            let probe = random_region(&mut rng, config.extent)?;
            let incremental = index.query_blocking(&probe);
            let fresh = rebuilt.query_blocking(&probe);
            report.probes_checked += 1;
            if incremental != fresh {
                report.mismatches.push(format!(
                    "{kind} probe at {:?}: incremental {incremental:?}, rebuilt {fresh:?}",
                    probe.bounds().min
                ));
            }
        }
    }

    if !report.is_consistent() {
        warn!("{} probe mismatches between incremental and rebuilt indices", report.mismatches.len());
    }
    Ok(report)
}

fn random_shape(rng: &mut StdRng, id: ShapeId, extent: f32) -> SceneShape {
    let top_left = Vec2::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent));
    let properties = match rng.gen_range(0..3) {
        0 => ShapeProperties::new(true, false),
        1 => ShapeProperties::new(false, true),
        _ => ShapeProperties::wall(),
    };
    SceneShape::rect(
        id,
        STRESS_FLOOR,
        top_left,
        rng.gen_range(5.0..80.0),
        rng.gen_range(5.0..80.0),
    )
    .with_properties(properties)
}

fn random_region(rng: &mut StdRng, extent: f32) -> VantageResult<Polygon> {
    let top_left = Vec2::new(rng.gen_range(-20.0..extent), rng.gen_range(-20.0..extent));
    let size = Vec2::new(rng.gen_range(1.0..120.0), rng.gen_range(1.0..120.0));
    Ok(Polygon::from_aabb(Aabb::new(top_left, top_left + size))?)
}
