use bevy::log::LogPlugin;
use bevy::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vantage::config::load_config;
use vantage::navigation::MoveCheck;
use vantage::resources::VantageConfig;
use vantage::scene::{
    InitiativeState, MoveContext, MovementHistory, OpenAccess, PendingPositionUpdates,
};
use vantage::{FloorId, MapDefinition, MutationCoordinator, VantageError, VantageResult};

mod probe {
    pub mod cli_utils;
    pub mod stress;
}

use probe::cli_utils::*;
use probe::stress::{self, StressConfig};

#[derive(Parser, Clone)]
#[command(name = "scene-probe")]
#[command(about = "Inspect visibility, movement and routing on a scene map")]
struct Args {
    /// Map file to load (defaults to `default_map` from the user config)
    #[arg(long)]
    map: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Compute the region visible from a point
    Visibility {
        #[arg(long, default_value = "0")]
        floor: u32,

        /// Observer position (format: X,Y)
        #[arg(long)]
        observer: String,

        /// Points to test against the visible region (format: X,Y), repeatable
        #[arg(long)]
        probe: Vec<String>,
    },

    /// Move shapes and report what happened
    Move {
        /// Comma-separated shape ids
        #[arg(long)]
        shapes: String,

        /// Displacement (format: DX,DY)
        #[arg(long)]
        delta: String,

        /// Preview only: no history entry, movement index untouched
        #[arg(long)]
        temporary: bool,
    },

    /// Find a walkable route between two points
    Route {
        #[arg(long, default_value = "0")]
        floor: u32,

        /// Start position (format: X,Y)
        #[arg(long)]
        from: String,

        /// Goal position (format: X,Y)
        #[arg(long)]
        to: String,
    },

    /// Random register/move traffic, checking incremental indices against rebuilds
    Stress {
        #[arg(long, default_value = "200")]
        shapes: usize,

        #[arg(long, default_value = "1000")]
        moves: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "2000.0")]
        extent: f32,

        #[arg(long, default_value = "500")]
        probes: usize,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> VantageResult<()> {
    let level = parse_log_level(&args.log_level)?;
    App::new().add_plugins(LogPlugin {
        level,
        ..default()
    });

    let config = load_config();
    match args.command {
        Command::Visibility {
            floor,
            observer,
            probe,
        } => {
            let coordinator = load_scene(args.map, &config)?;
            run_visibility(&coordinator, FloorId(floor), &observer, &probe)
        }
        Command::Move {
            shapes,
            delta,
            temporary,
        } => {
            let mut coordinator = load_scene(args.map, &config)?;
            run_move(&mut coordinator, &shapes, &delta, temporary)
        }
        Command::Route { floor, from, to } => {
            let coordinator = load_scene(args.map, &config)?;
            run_route(&coordinator, FloorId(floor), &from, &to)
        }
        Command::Stress {
            shapes,
            moves,
            seed,
            extent,
            probes,
        } => {
            let stress_config = StressConfig {
                shapes,
                moves,
                seed,
                extent,
                probes,
            };
            run_stress(&stress_config, &config)
        }
    }
}

fn load_scene(map: Option<PathBuf>, config: &VantageConfig) -> VantageResult<MutationCoordinator> {
    let path = map
        .or_else(|| config.default_map.clone())
        .ok_or_else(|| VantageError::InvalidArgument {
            reason: "No map given and no default_map configured".to_string(),
        })?;
    let map = MapDefinition::load_from_file(&path)?;
    info!("Loaded map '{}' from {}", map.name, path.display());
    map.build_coordinator(config.settings.clone())
}

fn run_visibility(
    coordinator: &MutationCoordinator,
    floor: FloorId,
    observer: &str,
    probes: &[String],
) -> VantageResult<()> {
    let observer = parse_point(observer)?;
    let region = coordinator.visible_region(floor, observer)?;

    println!("Visible region from ({}, {}) on floor {floor}:", observer.x, observer.y);
    if region.is_empty() {
        println!("  Observer is inside a vision blocker; nothing is visible");
        return Ok(());
    }
    println!("  Boundary points: {}", region.boundary().len());
    if region.is_maximal() {
        println!("  Unobstructed within vision range");
    } else {
        println!("  Blocked by: {:?}", region.blocked_by());
    }

    for probe in probes {
        let point = parse_point(probe)?;
        let verdict = if region.contains(point) { "visible" } else { "hidden" };
        println!("  ({}, {}): {verdict}", point.x, point.y);
    }
    Ok(())
}

fn run_move(
    coordinator: &mut MutationCoordinator,
    shapes: &str,
    delta: &str,
    temporary: bool,
) -> VantageResult<()> {
    let ids = parse_shape_ids(shapes)?;
    let delta = parse_point(delta)?;

    for &id in &ids {
        if let Ok(MoveCheck::Blocked { by }) = coordinator.check_move(id, delta) {
            println!("  Shape {id} would be blocked by {by:?}");
        }
    }

    let access = OpenAccess { privileged: true };
    let turn_order = InitiativeState::default();
    let mut sync = PendingPositionUpdates::default();
    let mut history = MovementHistory::default();
    let mut ctx = MoveContext {
        access: &access,
        turn_order: &turn_order,
        sync: &mut sync,
        history: &mut history,
    };
    let outcome = coordinator.move_shapes(&ids, delta, temporary, &mut ctx);

    println!("Move by ({}, {}){}:", delta.x, delta.y, if temporary { " (temporary)" } else { "" });
    println!("  Moved: {:?}", outcome.moved);
    for (id, reason) in &outcome.skipped {
        println!("  Skipped {id}: {reason:?}");
    }
    for (id, err) in &outcome.footprint_errors {
        println!("  Shape {id} moved with an unusable footprint: {err}");
    }
    for hit in &outcome.triggered {
        match hit.target {
            Some(target) => println!(
                "  Shape {} entered zone {} -> floor {} at {:?}",
                hit.shape, hit.zone, target.floor, target.position
            ),
            None => println!("  Shape {} entered zone {}", hit.shape, hit.zone),
        }
    }
    for (floor, kind) in &outcome.recalculated {
        println!(
            "  Recalculated {kind} on floor {floor} (generation {})",
            coordinator.generation(*floor, *kind)
        );
    }
    println!("  Position updates sent: {}", sync.updates.len());
    println!("  History entries: {}", history.operations.len());
    Ok(())
}

fn run_route(coordinator: &MutationCoordinator, floor: FloorId, from: &str, to: &str) -> VantageResult<()> {
    let from = parse_point(from)?;
    let to = parse_point(to)?;

    match coordinator.find_route(floor, from, to)? {
        Some(route) => {
            println!("Route with {} waypoints:", route.len());
            for point in route {
                println!("  ({}, {})", point.x, point.y);
            }
        }
        None => println!("No route from ({}, {}) to ({}, {})", from.x, from.y, to.x, to.y),
    }
    Ok(())
}

fn run_stress(stress_config: &StressConfig, config: &VantageConfig) -> VantageResult<()> {
    let report = stress::run(stress_config, config.settings.clone())?;

    println!("Stress run (seed {}):", stress_config.seed);
    println!("  Shapes: {}", stress_config.shapes);
    println!("  Moves applied: {}, skipped: {}", report.moved, report.skipped);
    for (kind, generation) in &report.generations {
        println!("  {kind} generation: {generation}");
    }
    println!("  Index recoveries: {}", report.recoveries);
    println!("  Probes checked: {}", report.probes_checked);

    if report.is_consistent() {
        println!("  Incremental indices match rebuilt indices");
        Ok(())
    } else {
        for mismatch in &report.mismatches {
            println!("  MISMATCH {mismatch}");
        }
        Err(VantageError::IndexMismatch {
            count: report.mismatches.len(),
        })
    }
}
