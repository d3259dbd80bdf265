//! # Drone Fleet Simulator
//!
//! Flight-state machines for individual drones and the coordination layer
//! that runs a fleet of them.
//!
//! ## Features
//!
//! - Battery-coupled motion integration, one step per tick
//! - Obstacle reporting with pluggable avoidance strategies
//! - One task per drone, with telemetry published on every change
//! - Fleet broadcast commands and a lockstep tick driver

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod avoidance;
pub mod config;
pub mod driver;
pub mod drone;
pub mod error;
pub mod fleet;
pub mod handle;
pub mod telemetry;

pub use avoidance::{AvoidanceStrategy, FixedOffset, Sidestep};
pub use config::SimConfig;
pub use driver::{DriverSummary, SimulationDriver, TickReport};
pub use drone::Drone;
pub use error::{Result, SimError};
pub use fleet::{Fleet, FleetLegs};
pub use handle::{DroneHandle, PendingLeg};
pub use telemetry::FleetSummary;
