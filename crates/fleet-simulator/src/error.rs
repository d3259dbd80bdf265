//! Simulator error types.

use fleet_domain::FlightError;
use thiserror::Error;

/// Simulator errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// Command rejected by the drone's state machine
    #[error(transparent)]
    Flight(#[from] FlightError),

    /// The drone's task has stopped and no longer accepts commands
    #[error("Drone offline: {name}")]
    DroneOffline { name: String },

    /// A drone task panicked or was cancelled
    #[error("Drone task failed: {0}")]
    Join(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for SimError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
