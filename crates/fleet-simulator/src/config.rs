//! # Simulator Configuration
//!
//! Environment-based configuration, overridable from the command line.

use std::env;
use std::time::Duration;

use fleet_domain::FlightParams;

use crate::error::{Result, SimError};

/// Simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Starting battery of every drone
    pub max_battery: f64,

    /// Per-tick travel cap as a fraction of remaining battery
    pub speed_factor: f64,

    /// Energy spent per unit of distance
    pub burn_factor: f64,

    /// Battery below this counts as drained
    pub exhaustion_threshold: f64,

    /// Wall-clock pause between ticks, 0 runs as fast as possible
    pub tick_ms: u64,

    /// Hard stop for a single driver run
    pub max_ticks: u64,

    /// Logging level
    pub log_level: String,
}

impl SimConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = FlightParams::default();

        Self {
            max_battery: parse_var("FLEET_MAX_BATTERY").unwrap_or(defaults.max_battery),
            speed_factor: parse_var("FLEET_SPEED_FACTOR").unwrap_or(defaults.speed_factor),
            burn_factor: parse_var("FLEET_BURN_FACTOR").unwrap_or(defaults.burn_factor),
            exhaustion_threshold: parse_var("FLEET_EXHAUSTION_THRESHOLD")
                .unwrap_or(defaults.exhaustion_threshold),
            tick_ms: parse_var("FLEET_TICK_MS").unwrap_or(0),
            max_ticks: parse_var("FLEET_MAX_TICKS").unwrap_or(10_000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Reject values that would stall or reverse the energy model.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_battery", self.max_battery),
            ("speed_factor", self.speed_factor),
            ("burn_factor", self.burn_factor),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::Config(format!("{field} must be positive, got {value}")));
            }
        }
        if !(self.exhaustion_threshold.is_finite() && self.exhaustion_threshold > 0.0) {
            return Err(SimError::Config(format!(
                "exhaustion_threshold must be positive, got {}",
                self.exhaustion_threshold
            )));
        }
        if self.max_ticks == 0 {
            return Err(SimError::Config("max_ticks must be at least 1".to_string()));
        }
        Ok(())
    }

    pub const fn flight_params(&self) -> FlightParams {
        FlightParams {
            max_battery: self.max_battery,
            speed_factor: self.speed_factor,
            burn_factor: self.burn_factor,
            exhaustion_threshold: self.exhaustion_threshold,
        }
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
