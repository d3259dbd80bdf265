//! Obstacle avoidance strategies.
//!
//! A strategy only picks the replacement waypoint. Whether the drone can
//! actually take it is decided by the flight-state machine.

use std::fmt::Debug;

use fleet_domain::Vector3;

/// Picks a new waypoint in response to a detected obstacle.
pub trait AvoidanceStrategy: Debug + Send + Sync {
    fn replan(&self, position: Vector3, obstacle: Vector3) -> Vector3;

    fn name(&self) -> &'static str;
}

/// Shift the current position by a constant displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedOffset {
    pub offset: Vector3,
}

impl Default for FixedOffset {
    fn default() -> Self {
        Self {
            offset: Vector3::new(1.0, 1.0, 0.0),
        }
    }
}

impl AvoidanceStrategy for FixedOffset {
    fn replan(&self, position: Vector3, _obstacle: Vector3) -> Vector3 {
        position + self.offset
    }

    fn name(&self) -> &'static str {
        "fixed-offset"
    }
}

/// Step sideways, perpendicular to the horizontal bearing of the obstacle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sidestep {
    pub clearance: f64,
}

impl Default for Sidestep {
    fn default() -> Self {
        Self { clearance: 2.0 }
    }
}

impl AvoidanceStrategy for Sidestep {
    fn replan(&self, position: Vector3, obstacle: Vector3) -> Vector3 {
        let bearing = Vector3::new(obstacle.x - position.x, obstacle.y - position.y, 0.0);
        match bearing.normalize() {
            // Rotate the bearing 90 degrees to the left
            Some(unit) => position + Vector3::new(-unit.y, unit.x, 0.0) * self.clearance,
            None => FixedOffset::default().replan(position, obstacle),
        }
    }

    fn name(&self) -> &'static str {
        "sidestep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_offset_ignores_obstacle() {
        let strategy = FixedOffset::default();
        let position = Vector3::new(7.0, 3.0, 2.0);

        let a = strategy.replan(position, Vector3::new(8.0, 3.0, 2.0));
        let b = strategy.replan(position, Vector3::new(-50.0, 0.0, 0.0));

        assert_eq!(a, Vector3::new(8.0, 4.0, 2.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sidestep_is_perpendicular() {
        let strategy = Sidestep { clearance: 3.0 };
        let position = Vector3::new(1.0, 1.0, 5.0);
        let obstacle = Vector3::new(4.0, 1.0, 5.0);

        let waypoint = strategy.replan(position, obstacle);
        assert_eq!(waypoint, Vector3::new(1.0, 4.0, 5.0));
    }

    #[test]
    fn test_sidestep_on_top_of_obstacle_falls_back() {
        let strategy = Sidestep::default();
        let position = Vector3::new(2.0, 2.0, 0.0);

        assert_eq!(strategy.replan(position, position), Vector3::new(3.0, 3.0, 0.0));
    }
}
