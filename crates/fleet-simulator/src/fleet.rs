//! Fleet-level coordination over many drone tasks.

use fleet_domain::{LegOutcome, TelemetrySnapshot, Vector3};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::drone::Drone;
use crate::error::Result;
use crate::handle::{DroneHandle, PendingLeg};
use crate::telemetry::FleetSummary;

#[derive(Debug)]
struct Member {
    handle: DroneHandle,
    task: JoinHandle<Drone>,
}

/// Ordered set of drones, each running in its own task.
#[derive(Debug, Default)]
pub struct Fleet {
    members: Vec<Member>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `drone` and append it to the fleet.
    ///
    /// Names are expected to be unique; duplicates are accepted but logged.
    pub fn add_drone(&mut self, drone: Drone) -> DroneHandle {
        if self.drone(drone.name()).is_some() {
            warn!(drone = %drone.name(), "Duplicate drone name in fleet");
        }
        info!(drone = %drone.name(), battery = drone.battery(), "Added drone");

        let (handle, task) = DroneHandle::spawn(drone);
        self.members.push(Member {
            handle: handle.clone(),
            task,
        });
        handle
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// First member with this name.
    pub fn drone(&self, name: &str) -> Option<&DroneHandle> {
        self.handles().find(|h| h.name() == name)
    }

    pub fn handles(&self) -> impl Iterator<Item = &DroneHandle> {
        self.members.iter().map(|m| &m.handle)
    }

    pub fn names(&self) -> Vec<String> {
        self.handles().map(|h| h.name().to_string()).collect()
    }

    /// Send every member to `waypoint`.
    ///
    /// All commands are queued before this returns, so a tick issued
    /// afterwards sees every accepted leg. Rejections are collected per drone
    /// and never stop the broadcast.
    pub async fn command_drones(&self, waypoint: Vector3) -> FleetLegs {
        info!(%waypoint, drones = self.len(), "Commanding fleet");

        let mut legs = Vec::with_capacity(self.len());
        for handle in self.handles() {
            let leg = handle.send_fly_to(waypoint).await;
            legs.push((handle.name().to_string(), leg));
        }
        FleetLegs { legs }
    }

    /// Ask every member to return home.
    pub async fn return_all_home(&self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.len());
        for handle in self.handles() {
            let result = handle.return_home().await;
            if let Err(err) = &result {
                info!(drone = %handle.name(), error = %err, "Return home rejected");
            }
            results.push((handle.name().to_string(), result));
        }
        results
    }

    /// Snapshot of every member, in fleet order.
    pub fn get_fleet_telemetry(&self) -> Vec<TelemetrySnapshot> {
        self.handles().map(DroneHandle::telemetry).collect()
    }

    pub fn summary(&self) -> FleetSummary {
        FleetSummary::from_snapshots(self.get_fleet_telemetry())
    }

    /// Stop every drone task and hand the drones back.
    ///
    /// Handle clones held elsewhere do not keep the tasks alive; they report
    /// the drone as offline afterwards.
    pub async fn shutdown(self) -> Result<Vec<Drone>> {
        let mut drones = Vec::with_capacity(self.members.len());
        for Member { handle, task } in self.members {
            // A task that already stopped still hands its drone back below
            if let Err(err) = handle.shutdown().await {
                debug!(drone = %handle.name(), error = %err, "Drone already stopped");
            }
            drones.push(task.await?);
        }
        Ok(drones)
    }
}

/// Legs dispatched by one fleet broadcast.
#[derive(Debug)]
pub struct FleetLegs {
    legs: Vec<(String, Result<PendingLeg>)>,
}

impl FleetLegs {
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Wait for every leg; results are in fleet order.
    pub async fn wait(self) -> Vec<(String, Result<LegOutcome>)> {
        let mut outcomes = Vec::with_capacity(self.legs.len());
        for (name, leg) in self.legs {
            let outcome = match leg {
                Ok(pending) => pending.outcome().await,
                Err(err) => Err(err),
            };
            outcomes.push((name, outcome));
        }
        outcomes
    }
}
