//! Fleet-wide telemetry aggregation.

use chrono::{DateTime, Utc};
use fleet_domain::{FlightState, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Aggregate view over one round of snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub generated_at: DateTime<Utc>,
    pub drone_count: usize,
    pub idle: usize,
    pub flying: usize,
    pub returning: usize,
    pub lowest_battery: Option<f64>,
    pub snapshots: Vec<TelemetrySnapshot>,
}

impl FleetSummary {
    pub fn from_snapshots(snapshots: Vec<TelemetrySnapshot>) -> Self {
        let count = |state: FlightState| snapshots.iter().filter(|s| s.state == state).count();

        Self {
            generated_at: Utc::now(),
            drone_count: snapshots.len(),
            idle: count(FlightState::Idle),
            flying: count(FlightState::Flying),
            returning: count(FlightState::Returning),
            lowest_battery: snapshots.iter().map(|s| s.battery).reduce(f64::min),
            snapshots,
        }
    }

    /// Number of drones with a leg in progress.
    pub const fn airborne(&self) -> usize {
        self.flying + self.returning
    }

    /// Emit one line per drone plus a fleet line.
    pub fn log(&self) {
        for s in &self.snapshots {
            info!(
                drone = %s.name,
                position = %s.position,
                battery = %format!("{:.3}", s.battery),
                state = %s.state,
                "Telemetry"
            );
        }
        info!(
            drones = self.drone_count,
            idle = self.idle,
            airborne = self.airborne(),
            lowest_battery = ?self.lowest_battery,
            "Fleet telemetry"
        );
    }
}
