//! Drone Fleet Simulator CLI
//!
//! Flies a fleet to a waypoint, reports random obstacles to the lead drone
//! along the way, then prints fleet telemetry.

use anyhow::Result;
use clap::Parser;
use fleet_domain::Vector3;
use fleet_simulator::{Drone, Fleet, PendingLeg, SimConfig, SimulationDriver};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleet-simulator")]
#[command(about = "Simulate a drone fleet flying to a waypoint")]
struct Args {
    /// Number of drones
    #[arg(short, long, default_value = "2")]
    drones: usize,

    /// Drone name prefix
    #[arg(long, default_value = "Drone")]
    prefix: String,

    /// Target waypoint as x,y,z
    #[arg(short, long, default_value = "10,10,0", value_parser = parse_vector)]
    target: Vector3,

    /// Obstacles reported to the first drone
    #[arg(long, default_value = "3")]
    obstacles: usize,

    /// Ticks between obstacle reports
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    obstacle_every: u64,

    /// Send every drone home at this tick
    #[arg(long)]
    return_at: Option<u64>,

    /// Starting battery (overrides FLEET_MAX_BATTERY)
    #[arg(long)]
    max_battery: Option<f64>,

    /// Tick interval in milliseconds (overrides FLEET_TICK_MS)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seed for obstacle placement
    #[arg(long)]
    seed: Option<u64>,

    /// Print final telemetry as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = SimConfig::from_env();
    if let Some(max_battery) = args.max_battery {
        config.max_battery = max_battery;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }
    config.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fleet_simulator={}", config.log_level)));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(
        "Starting fleet simulation: {} drones -> {} (battery {}, tick {}ms)",
        args.drones, args.target, config.max_battery, config.tick_ms
    );

    let mut rng = args.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let params = config.flight_params();

    let mut fleet = Fleet::new();
    for i in 1..=args.drones {
        fleet.add_drone(Drone::with_params(format!("{}{}", args.prefix, i), params));
    }

    let legs = fleet.command_drones(args.target).await;
    let mut driver = SimulationDriver::from_config(&config);
    let mut avoidance_legs: Vec<PendingLeg> = Vec::new();
    let mut reported = 0;
    let mut timed_out = false;

    {
        let lead = fleet.handles().next().cloned();

        loop {
            if driver.ticks_elapsed() >= config.max_ticks {
                warn!(ticks = driver.ticks_elapsed(), "Tick budget exhausted");
                timed_out = true;
                break;
            }

            let report = driver.tick(&fleet).await;
            let mut airborne = !report.is_quiescent();

            if args.return_at == Some(report.tick) {
                info!(tick = report.tick, "Recalling fleet");
                fleet.return_all_home().await;
            }

            if let Some(lead) = &lead {
                if reported < args.obstacles && report.tick % args.obstacle_every == 0 {
                    let obstacle =
                        Vector3::new(rng.gen_range(5.0..15.0), rng.gen_range(5.0..15.0), 0.0);
                    match lead.send_add_obstacle(obstacle).await {
                        Ok(leg) => avoidance_legs.push(leg),
                        Err(err) => warn!(error = %err, "Obstacle report failed"),
                    }
                    reported += 1;
                    airborne = true;
                }
            }

            if !airborne && (lead.is_none() || reported >= args.obstacles) {
                break;
            }
            tokio::time::sleep(config.tick_interval()).await;
        }
    }

    // Unfinished legs would never resolve once ticking stops
    if !timed_out {
        for (name, outcome) in legs.wait().await {
            match outcome {
                Ok(leg) => info!(drone = %name, ?leg, "Leg complete"),
                Err(err) => warn!(drone = %name, error = %err, "Leg failed"),
            }
        }
        for leg in avoidance_legs {
            let name = leg.name().to_string();
            match leg.outcome().await {
                Ok(outcome) => info!(drone = %name, ?outcome, "Avoidance complete"),
                Err(err) => warn!(drone = %name, error = %err, "Avoidance rejected"),
            }
        }
    }

    let summary = fleet.summary();
    summary.log();

    fleet.return_all_home().await;
    driver.run_until_idle(&fleet).await;

    let summary = fleet.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.log();
    }

    for drone in fleet.shutdown().await? {
        info!(
            drone = %drone.name(),
            waypoints = drone.waypoints().len(),
            obstacles = drone.obstacles().len(),
            "Flight log"
        );
    }

    info!("Simulation complete after {} ticks", driver.ticks_elapsed());
    Ok(())
}

/// Parse `x,y,z` into a vector.
fn parse_vector(raw: &str) -> std::result::Result<Vector3, String> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got {raw:?}")),
    }
}
