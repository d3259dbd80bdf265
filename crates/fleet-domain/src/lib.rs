//! # Drone Fleet Simulator - Domain Model
//!
//! Value objects, flight-state enums and error types shared by the
//! simulator library, its actors and the CLI. Nothing in here performs I/O
//! or suspends; the integration loop lives in `fleet-simulator`.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Point or displacement in the simulation frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// Home position every drone starts from.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, `None` for the zero vector.
    #[must_use]
    pub fn normalize(&self) -> Option<Self> {
        let len = self.magnitude();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        Some(*self * (1.0 / len))
    }

    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (*other - *self).magnitude()
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Tunables of the motion/energy model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightParams {
    /// Battery level a drone is created with
    pub max_battery: f64,
    /// Per-tick travel cap as a fraction of remaining battery
    pub speed_factor: f64,
    /// Energy spent per unit of distance travelled
    pub burn_factor: f64,
    /// Remaining battery below this is treated as fully drained
    pub exhaustion_threshold: f64,
}

impl FlightParams {
    pub const DEFAULT_MAX_BATTERY: f64 = 100.0;
    pub const DEFAULT_SPEED_FACTOR: f64 = 0.1;
    pub const DEFAULT_BURN_FACTOR: f64 = 0.1;
    pub const DEFAULT_EXHAUSTION_THRESHOLD: f64 = 1e-3;

    /// Default model with a custom starting battery.
    #[must_use]
    pub fn with_max_battery(max_battery: f64) -> Self {
        Self {
            max_battery,
            ..Self::default()
        }
    }
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            max_battery: Self::DEFAULT_MAX_BATTERY,
            speed_factor: Self::DEFAULT_SPEED_FACTOR,
            burn_factor: Self::DEFAULT_BURN_FACTOR,
            exhaustion_threshold: Self::DEFAULT_EXHAUSTION_THRESHOLD,
        }
    }
}

// =============================================================================
// ENUMS
// =============================================================================

/// Flight state of a single drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightState {
    #[default]
    Idle,
    Flying,
    Returning, // Heading back to origin
}

impl FlightState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Flying => "FLYING",
            Self::Returning => "RETURNING",
        }
    }

    /// A leg is in progress.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        matches!(self, Self::Flying | Self::Returning)
    }

    /// Transition table. `Flying -> Flying` is deliberately absent: a second
    /// destination is a rejected command, not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Idle | Self::Flying)
                | (Self::Flying, Self::Idle | Self::Returning)
                | (Self::Returning, Self::Idle)
        )
    }
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a leg ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegOutcome {
    Arrived { position: Vector3, battery: f64 },
    BatteryExhausted { position: Vector3 },
}

impl LegOutcome {
    #[must_use]
    pub const fn position(&self) -> Vector3 {
        match self {
            Self::Arrived { position, .. } | Self::BatteryExhausted { position } => *position,
        }
    }

    #[must_use]
    pub const fn is_arrival(&self) -> bool {
        matches!(self, Self::Arrived { .. })
    }
}

/// Result of advancing a drone by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Not airborne, nothing integrated
    Holding,
    /// Moved and still en route
    Advanced {
        position: Vector3,
        battery: f64,
        remaining: f64,
    },
    /// Leg terminated on this tick
    Finished(LegOutcome),
}

impl StepOutcome {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

// =============================================================================
// TELEMETRY
// =============================================================================

/// Point-in-time copy of a drone's observable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub name: String,
    pub position: Vector3,
    pub battery: f64,
    pub state: FlightState,
    pub recorded_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    #[must_use]
    pub fn new(name: &str, position: Vector3, battery: f64, state: FlightState) -> Self {
        Self {
            name: name.to_string(),
            position,
            battery,
            state,
            recorded_at: Utc::now(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected or terminal flight conditions. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlightError {
    #[error("{name}: battery empty")]
    BatteryEmpty { name: String },

    #[error("{name}: already flying")]
    AlreadyFlying { name: String },

    #[error("{name}: not flying")]
    NotFlying { name: String },
}
