//! Task-per-drone actor.
//!
//! Each [`Drone`] is moved into its own tokio task and only reachable through
//! a [`DroneHandle`]. Commands are processed strictly in arrival order, and a
//! fresh [`TelemetrySnapshot`] is published after every command so observers
//! can sample a drone mid-flight without touching its state.

use chrono::Utc;
use fleet_domain::{FlightError, LegOutcome, StepOutcome, TelemetrySnapshot, Vector3};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::drone::Drone;
use crate::error::{Result, SimError};

const COMMAND_BUFFER: usize = 32;

type LegReply = oneshot::Sender<std::result::Result<LegOutcome, FlightError>>;

#[derive(Debug)]
enum DroneCommand {
    FlyTo {
        waypoint: Vector3,
        reply: LegReply,
    },
    AddObstacle {
        obstacle: Vector3,
        reply: LegReply,
    },
    ReturnHome {
        reply: oneshot::Sender<std::result::Result<(), FlightError>>,
    },
    Tick {
        reply: oneshot::Sender<StepOutcome>,
    },
    Shutdown,
}

/// Cloneable command/telemetry endpoint for one drone task.
#[derive(Debug, Clone)]
pub struct DroneHandle {
    name: String,
    commands: mpsc::Sender<DroneCommand>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
}

impl DroneHandle {
    /// Move `drone` into a new task. The task hands the drone back after
    /// [`DroneHandle::shutdown`] or once every handle has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(drone: Drone) -> (Self, JoinHandle<Drone>) {
        let name = drone.name().to_string();
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
        let (publisher, telemetry) = watch::channel(drone.telemetry());

        let actor = DroneActor {
            drone,
            inbox,
            publisher,
            waiting: Vec::new(),
        };
        let task = tokio::spawn(actor.run());

        (
            Self {
                name,
                commands,
                telemetry,
            },
            task,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drone state as of the last command, stamped with the read time.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        let mut snapshot = self.telemetry.borrow().clone();
        snapshot.recorded_at = Utc::now();
        snapshot
    }

    /// Queue a leg without waiting for it to finish.
    pub async fn send_fly_to(&self, waypoint: Vector3) -> Result<PendingLeg> {
        let (reply, receiver) = oneshot::channel();
        self.send(DroneCommand::FlyTo { waypoint, reply }).await?;
        Ok(self.pending(receiver))
    }

    /// Fly to `waypoint` and wait until the drone arrives or runs dry.
    ///
    /// Completion requires something to keep ticking the drone, normally a
    /// [`SimulationDriver`](crate::SimulationDriver).
    pub async fn fly_to(&self, waypoint: Vector3) -> Result<LegOutcome> {
        self.send_fly_to(waypoint).await?.outcome().await
    }

    /// Report an obstacle; the returned leg is the avoidance manoeuvre.
    pub async fn send_add_obstacle(&self, obstacle: Vector3) -> Result<PendingLeg> {
        let (reply, receiver) = oneshot::channel();
        self.send(DroneCommand::AddObstacle { obstacle, reply })
            .await?;
        Ok(self.pending(receiver))
    }

    pub async fn add_obstacle(&self, obstacle: Vector3) -> Result<LegOutcome> {
        self.send_add_obstacle(obstacle).await?.outcome().await
    }

    /// Redirect the active leg home. Any caller already waiting on that leg
    /// is answered when the drone reaches the origin.
    pub async fn return_home(&self) -> Result<()> {
        let (reply, receiver) = oneshot::channel();
        self.send(DroneCommand::ReturnHome { reply }).await?;
        receiver.await.map_err(|_| self.offline())?.map_err(SimError::from)
    }

    /// Advance the drone by one tick.
    pub async fn tick(&self) -> Result<StepOutcome> {
        let receiver = self.send_tick().await?;
        receiver.await.map_err(|_| self.offline())
    }

    /// Queue a tick; the receiver yields the step result.
    pub(crate) async fn send_tick(&self) -> Result<oneshot::Receiver<StepOutcome>> {
        let (reply, receiver) = oneshot::channel();
        self.send(DroneCommand::Tick { reply }).await?;
        Ok(receiver)
    }

    /// Stop the drone task even if other handle clones are still alive.
    ///
    /// Legs still in flight resolve with [`SimError::DroneOffline`].
    pub async fn shutdown(&self) -> Result<()> {
        self.send(DroneCommand::Shutdown).await
    }

    async fn send(&self, command: DroneCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| self.offline())
    }

    fn pending(
        &self,
        reply: oneshot::Receiver<std::result::Result<LegOutcome, FlightError>>,
    ) -> PendingLeg {
        PendingLeg {
            name: self.name.clone(),
            reply,
        }
    }

    fn offline(&self) -> SimError {
        SimError::DroneOffline {
            name: self.name.clone(),
        }
    }
}

/// A leg that has been accepted or rejected but may not have finished yet.
#[derive(Debug)]
pub struct PendingLeg {
    name: String,
    reply: oneshot::Receiver<std::result::Result<LegOutcome, FlightError>>,
}

impl PendingLeg {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the leg to end. Rejected commands resolve immediately.
    pub async fn outcome(self) -> Result<LegOutcome> {
        match self.reply.await {
            Ok(result) => result.map_err(SimError::from),
            Err(_) => Err(SimError::DroneOffline { name: self.name }),
        }
    }
}

struct DroneActor {
    drone: Drone,
    inbox: mpsc::Receiver<DroneCommand>,
    publisher: watch::Sender<TelemetrySnapshot>,
    /// Callers waiting for the current leg to end
    waiting: Vec<LegReply>,
}

impl DroneActor {
    async fn run(mut self) -> Drone {
        while let Some(command) = self.inbox.recv().await {
            trace!(drone = %self.drone.name(), ?command, "Command received");
            match command {
                DroneCommand::FlyTo { waypoint, reply } => {
                    let result = self.drone.fly_to(waypoint);
                    self.settle(result, reply);
                }
                DroneCommand::AddObstacle { obstacle, reply } => {
                    let result = self.drone.add_obstacle(obstacle);
                    self.settle(result, reply);
                }
                DroneCommand::ReturnHome { reply } => {
                    let _ = reply.send(self.drone.return_home());
                }
                DroneCommand::Tick { reply } => {
                    let outcome = self.drone.step();
                    if let StepOutcome::Finished(leg) = outcome {
                        self.resolve(leg);
                    }
                    let _ = reply.send(outcome);
                }
                DroneCommand::Shutdown => break,
            }
            self.publisher.send_replace(self.drone.telemetry());
        }

        debug!(drone = %self.drone.name(), "Drone task stopping");
        self.drone
    }

    fn settle(
        &mut self,
        result: std::result::Result<Option<LegOutcome>, FlightError>,
        reply: LegReply,
    ) {
        match result {
            Ok(None) => self.waiting.push(reply),
            Ok(Some(outcome)) => {
                let _ = reply.send(Ok(outcome));
            }
            Err(err) => {
                let _ = reply.send(Err(err));
            }
        }
    }

    fn resolve(&mut self, outcome: LegOutcome) {
        for reply in self.waiting.drain(..) {
            let _ = reply.send(Ok(outcome));
        }
    }
}
