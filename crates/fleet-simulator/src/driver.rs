//! Tick scheduler advancing every airborne drone in lockstep.

use std::time::Duration;

use fleet_domain::{LegOutcome, StepOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::drone::pause;
use crate::fleet::Fleet;

/// What happened to the fleet on one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Still en route after this tick
    pub active: Vec<String>,
    pub arrived: Vec<String>,
    pub exhausted: Vec<String>,
    /// Drones whose task no longer answers
    pub offline: Vec<String>,
}

impl TickReport {
    /// No drone has a leg left to fly.
    pub fn is_quiescent(&self) -> bool {
        self.active.is_empty()
    }
}

/// Totals for one [`SimulationDriver::run_until_idle`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSummary {
    pub ticks: u64,
    pub arrived: Vec<String>,
    pub exhausted: Vec<String>,
    pub timed_out: bool,
}

/// Advances simulated time for a fleet.
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    interval: Duration,
    max_ticks: u64,
    tick: u64,
}

impl SimulationDriver {
    pub const fn new(interval: Duration, max_ticks: u64) -> Self {
        Self {
            interval,
            max_ticks,
            tick: 0,
        }
    }

    pub const fn from_config(config: &SimConfig) -> Self {
        Self::new(config.tick_interval(), config.max_ticks)
    }

    /// Ticks issued since creation.
    pub const fn ticks_elapsed(&self) -> u64 {
        self.tick
    }

    /// Advance every member by one step.
    ///
    /// The tick is queued on every drone before any reply is awaited, so the
    /// drones integrate concurrently. Idle drones answer without stepping.
    pub async fn tick(&mut self, fleet: &Fleet) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let mut pending = Vec::with_capacity(fleet.len());
        for handle in fleet.handles() {
            pending.push((handle.name().to_string(), handle.send_tick().await));
        }

        for (name, receiver) in pending {
            let outcome = match receiver {
                Ok(receiver) => receiver.await.ok(),
                Err(_) => None,
            };
            match outcome {
                Some(StepOutcome::Holding) => {}
                Some(StepOutcome::Advanced { .. }) => report.active.push(name),
                Some(StepOutcome::Finished(LegOutcome::Arrived { .. })) => report.arrived.push(name),
                Some(StepOutcome::Finished(LegOutcome::BatteryExhausted { .. })) => {
                    report.exhausted.push(name);
                }
                None => {
                    warn!(drone = %name, tick = self.tick, "Drone did not answer tick");
                    report.offline.push(name);
                }
            }
        }

        debug!(
            tick = self.tick,
            active = report.active.len(),
            arrived = report.arrived.len(),
            exhausted = report.exhausted.len(),
            "Tick complete"
        );
        report
    }

    /// Tick until no leg is in progress or the tick budget runs out.
    pub async fn run_until_idle(&mut self, fleet: &Fleet) -> DriverSummary {
        let mut summary = DriverSummary::default();

        loop {
            if summary.ticks >= self.max_ticks {
                warn!(ticks = summary.ticks, "Tick budget exhausted with drones still flying");
                summary.timed_out = true;
                break;
            }

            let report = self.tick(fleet).await;
            summary.ticks += 1;
            summary.arrived.extend(report.arrived.iter().cloned());
            summary.exhausted.extend(report.exhausted.iter().cloned());

            if report.is_quiescent() {
                break;
            }
            pause(self.interval).await;
        }

        info!(
            ticks = summary.ticks,
            arrived = ?summary.arrived,
            exhausted = ?summary.exhausted,
            "Fleet idle"
        );
        summary
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new(Duration::ZERO, 10_000)
    }
}
