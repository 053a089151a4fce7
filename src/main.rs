//! Hex Tactics - Scenario Runner
//!
//! Builds a small blue-versus-red engagement on a hex grid with woods and a
//! village, issues attack and wait orders for both sides, runs both queues
//! concurrently and prints what happened.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use hex_tactics::core::config::{EngineConfig, ExecutionMode};
use hex_tactics::core::error::Result;
use hex_tactics::core::types::{Side, UnitId, WorldPos};
use hex_tactics::hexgrid::{Bounds, HexGrid, TerrainDescriptor, TerrainMap};
use hex_tactics::orders::{
    AttackParams, HistoryEntry, Order, OrderContext, OrderQueue, QueueError, QueueStats, RunSummary, SeededRandom,
    TracingEventSink, VisualRegistry, WaitDuration, WaitModality,
};
use hex_tactics::units::{CoverTier, TacticalUnit, UnitProvider, UnitRoster, UnitType};

/// Hex Tactics - run a demo engagement through the order engine
#[derive(Parser, Debug)]
#[command(name = "hex-tactics")]
#[command(about = "Resolve a small tactical scenario with per-side order queues")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Queue execution mode
    #[arg(long, value_enum, default_value_t = Mode::Sequential)]
    mode: Mode,

    /// Orders run at once in parallel mode
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Engine config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Sequential,
    Parallel,
}

/// JSON output structure
#[derive(Serialize)]
struct SideReport {
    side: Side,
    summary: Option<RunSummary>,
    error: Option<String>,
    stats: QueueStats,
    history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
struct Report {
    seed: u64,
    blue: SideReport,
    red: SideReport,
    survivors: Vec<TacticalUnit>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hex_tactics=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.queue.mode = match args.mode {
        Mode::Sequential => ExecutionMode::Sequential,
        Mode::Parallel => ExecutionMode::BoundedParallel {
            max_concurrency: args.concurrency.max(1),
        },
    };
    config.validate()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, mode = ?config.queue.mode, "hex tactics starting");

    let rt = Runtime::new()?;
    let report = rt.block_on(run_scenario(config, seed));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Two wooded ridges and a village between the lines
fn scenario_terrain(grid: &HexGrid) -> TerrainMap {
    let mut terrain = TerrainMap::new();
    for x in [600.0, 750.0, 900.0] {
        for y in [-150.0, 0.0, 150.0] {
            terrain.set(grid.world_to_hex(WorldPos::new(x, y)), TerrainDescriptor::dense_vegetation());
        }
    }
    for y in [450.0, 600.0] {
        terrain.set(grid.world_to_hex(WorldPos::new(1200.0, y)), TerrainDescriptor::building());
    }
    terrain.set(grid.world_to_hex(WorldPos::new(1050.0, -450.0)), TerrainDescriptor::obstacle());
    terrain
}

struct Forces {
    blue_armor: UnitId,
    blue_rifles: UnitId,
    blue_guns: UnitId,
    blue_scouts: UnitId,
    red_armor: UnitId,
    red_rifles: UnitId,
    red_hq: UnitId,
}

fn deploy(roster: &UnitRoster, grid: &mut HexGrid) -> Forces {
    let mut place = |unit: TacticalUnit| {
        let position = unit.position;
        let id = roster.insert(unit);
        grid.set_occupant(position, id);
        id
    };

    Forces {
        blue_armor: place(TacticalUnit::new("1st Tank Troop", Side::Blue, UnitType::Armor, WorldPos::new(0.0, 0.0))),
        blue_rifles: place(TacticalUnit::new("A Company", Side::Blue, UnitType::Infantry, WorldPos::new(900.0, 600.0))),
        blue_guns: place(TacticalUnit::new(
            "C Battery",
            Side::Blue,
            UnitType::FieldArtillery,
            WorldPos::new(-600.0, 300.0),
        )),
        blue_scouts: place(TacticalUnit::new("Recon Section", Side::Blue, UnitType::Recon, WorldPos::new(300.0, -450.0))),
        red_armor: place(
            TacticalUnit::new("T-Platoon", Side::Red, UnitType::Armor, WorldPos::new(1500.0, 0.0))
                .with_cover(CoverTier::Light),
        ),
        red_rifles: place(
            TacticalUnit::new("Motor Rifles", Side::Red, UnitType::Infantry, WorldPos::new(1350.0, 600.0))
                .with_cover(CoverTier::Heavy),
        ),
        red_hq: place(TacticalUnit::new("Battalion HQ", Side::Red, UnitType::Headquarters, WorldPos::new(2100.0, 300.0))),
    }
}

async fn run_scenario(config: EngineConfig, seed: u64) -> Report {
    let mut grid = HexGrid::from_config(&config.grid, WorldPos::ORIGIN);
    let region = Bounds::new(WorldPos::new(-900.0, -900.0), WorldPos::new(2400.0, 1200.0));
    let terrain = scenario_terrain(&grid);
    let cells = grid.materialize(region, &terrain);
    tracing::info!(cells, "grid materialized");

    let roster = Arc::new(UnitRoster::new());
    let forces = deploy(&roster, &mut grid);

    let ctx = OrderContext::new(Arc::new(RwLock::new(grid)), roster.clone())
        .with_visuals(Arc::new(VisualRegistry::new()))
        .with_events(Arc::new(TracingEventSink))
        .with_rng(Arc::new(SeededRandom::new(seed)))
        .with_config(config.clone());

    let blue = OrderQueue::new(Side::Blue, config.queue.clone());
    let red = OrderQueue::new(Side::Red, config.queue.clone());

    let blue_orders = [
        Order::attack(ctx.clone(), forces.blue_armor, AttackParams::unit(forces.red_armor)).with_priority(2),
        Order::attack(ctx.clone(), forces.blue_rifles, AttackParams::unit(forces.red_rifles)).with_priority(1),
        Order::attack(ctx.clone(), forces.blue_guns, AttackParams::point(WorldPos::new(2100.0, 300.0))),
        Order::wait(ctx.clone(), forces.blue_scouts, WaitModality::Hidden, WaitDuration::Turns(3)),
    ];
    let red_orders = [
        Order::attack(ctx.clone(), forces.red_armor, AttackParams::unit(forces.blue_armor)).with_priority(1),
        Order::wait(ctx.clone(), forces.red_rifles, WaitModality::Rest, WaitDuration::Turns(2)),
        Order::wait(ctx.clone(), forces.red_hq, WaitModality::Alert, WaitDuration::Turns(2)),
    ];

    for order in blue_orders {
        if let Err(e) = blue.submit(order) {
            tracing::warn!(error = %e, "blue order rejected");
        }
    }
    for order in red_orders {
        if let Err(e) = red.submit(order) {
            tracing::warn!(error = %e, "red order rejected");
        }
    }

    let (blue_run, red_run) = tokio::join!(blue.execute_all(), red.execute_all());

    let side_report = |queue: &OrderQueue, run: std::result::Result<RunSummary, QueueError>| {
        let (summary, error) = match run {
            Ok(summary) => (Some(summary), None),
            Err(e) => (None, Some(e.to_string())),
        };
        SideReport {
            side: queue.side(),
            summary,
            error,
            stats: queue.stats(),
            history: queue.history(),
        }
    };

    let survivors = [
        forces.blue_armor,
        forces.blue_rifles,
        forces.blue_guns,
        forces.blue_scouts,
        forces.red_armor,
        forces.red_rifles,
        forces.red_hq,
    ]
    .into_iter()
    .filter_map(|id| roster.snapshot(id))
    .filter(|unit| !unit.is_destroyed())
    .collect();

    Report {
        seed,
        blue: side_report(&blue, blue_run),
        red: side_report(&red, red_run),
        survivors,
    }
}

fn print_report(report: &Report) {
    println!("\n=== HEX TACTICS (seed {}) ===", report.seed);
    for side in [&report.blue, &report.red] {
        println!("\n--- {:?} ---", side.side);
        match (&side.summary, &side.error) {
            (Some(summary), _) => println!(
                "{} orders: {} executed, {} failed, {} cancelled",
                summary.total(),
                summary.executed,
                summary.failed,
                summary.cancelled
            ),
            (None, Some(error)) => println!("run failed: {}", error),
            (None, None) => {}
        }
        for entry in &side.history {
            println!("  [{:?}] {}", entry.disposition, entry.order.summary);
            for message in &entry.order.messages {
                println!("      - {}", message);
            }
            if let Some(error) = entry.order.result.as_ref().and_then(|r| r.error.as_ref()) {
                println!("      ! {}", error);
            }
        }
    }

    println!("\n--- Units standing ---");
    for unit in &report.survivors {
        println!(
            "  {:<16} {:?} {:?} health {:.0}/{:.0} ammo {:.0}",
            unit.name, unit.side, unit.unit_type, unit.health, unit.max_health, unit.ammunition
        );
    }
}
