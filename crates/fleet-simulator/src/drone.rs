//! Single-drone flight state machine and motion integration.

use std::time::Duration;

use fleet_domain::{
    FlightError, FlightParams, FlightState, LegOutcome, StepOutcome, TelemetrySnapshot, Vector3,
};
use tracing::{debug, info, warn};

use crate::avoidance::{AvoidanceStrategy, FixedOffset};

/// One vehicle: position, energy, flight state and its append-only logs.
#[derive(Debug)]
pub struct Drone {
    name: String,
    params: FlightParams,
    battery: f64,
    state: FlightState,
    position: Vector3,
    /// Destination of the leg in progress
    target: Option<Vector3>,
    /// Every waypoint ever commanded, in order
    waypoints: Vec<Vector3>,
    /// Every obstacle ever reported, in order
    obstacles: Vec<Vector3>,
    avoidance: Box<dyn AvoidanceStrategy>,
}

impl Drone {
    /// Create an idle drone at the origin with the default flight model.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_params(name, FlightParams::default())
    }

    pub fn with_max_battery(name: impl Into<String>, max_battery: f64) -> Self {
        Self::with_params(name, FlightParams::with_max_battery(max_battery))
    }

    pub fn with_params(name: impl Into<String>, params: FlightParams) -> Self {
        Self {
            name: name.into(),
            battery: params.max_battery.max(0.0),
            params,
            state: FlightState::Idle,
            position: Vector3::ORIGIN,
            target: None,
            waypoints: Vec::new(),
            obstacles: Vec::new(),
            avoidance: Box::new(FixedOffset::default()),
        }
    }

    /// Replace the obstacle avoidance strategy.
    #[must_use]
    pub fn with_avoidance(mut self, strategy: impl AvoidanceStrategy + 'static) -> Self {
        self.avoidance = Box::new(strategy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn battery(&self) -> f64 {
        self.battery
    }

    pub const fn state(&self) -> FlightState {
        self.state
    }

    pub const fn position(&self) -> Vector3 {
        self.position
    }

    pub const fn target(&self) -> Option<Vector3> {
        self.target
    }

    pub const fn params(&self) -> &FlightParams {
        &self.params
    }

    pub fn waypoints(&self) -> &[Vector3] {
        &self.waypoints
    }

    pub fn obstacles(&self) -> &[Vector3] {
        &self.obstacles
    }

    pub fn avoidance(&self) -> &dyn AvoidanceStrategy {
        self.avoidance.as_ref()
    }

    /// Command a new leg.
    ///
    /// Returns `Ok(None)` when the leg is underway and must be advanced with
    /// [`Drone::step`], or `Ok(Some(_))` when the drone is already sitting on
    /// `waypoint` and the leg completes at zero cost.
    pub fn fly_to(&mut self, waypoint: Vector3) -> Result<Option<LegOutcome>, FlightError> {
        if self.battery <= 0.0 {
            warn!(drone = %self.name, "Battery empty");
            self.target = None;
            self.transition(FlightState::Idle);
            return Err(FlightError::BatteryEmpty {
                name: self.name.clone(),
            });
        }
        if self.state.is_airborne() {
            warn!(drone = %self.name, %waypoint, "Already flying, command rejected");
            return Err(FlightError::AlreadyFlying {
                name: self.name.clone(),
            });
        }

        self.transition(FlightState::Flying);
        self.waypoints.push(waypoint);
        self.target = Some(waypoint);
        info!(drone = %self.name, %waypoint, "Flying to waypoint");

        if self.position == waypoint {
            return Ok(Some(self.arrive(waypoint)));
        }
        Ok(None)
    }

    /// Advance the active leg by one tick.
    pub fn step(&mut self) -> StepOutcome {
        let Some(target) = self.target.filter(|_| self.state.is_airborne()) else {
            return StepOutcome::Holding;
        };

        let direction = target - self.position;
        let distance = direction.magnitude();
        let Some(heading) = direction.normalize() else {
            return StepOutcome::Finished(self.arrive(target));
        };
        if self.battery <= 0.0 {
            return StepOutcome::Finished(self.exhaust());
        }

        let step = distance.min(self.battery * self.params.speed_factor);
        let previous = self.position;
        if step >= distance {
            self.position = target;
        } else {
            self.position = self.position + heading * step;
        }
        if self.position == previous {
            // Remaining charge can no longer move the drone at this scale
            self.battery = 0.0;
            return StepOutcome::Finished(self.exhaust());
        }
        self.drain(step * self.params.burn_factor);

        debug!(
            drone = %self.name,
            position = %self.position,
            battery = self.battery,
            "Telemetry"
        );

        if self.battery <= 0.0 {
            return StepOutcome::Finished(self.exhaust());
        }
        if self.position == target {
            return StepOutcome::Finished(self.arrive(target));
        }

        StepOutcome::Advanced {
            position: self.position,
            battery: self.battery,
            remaining: self.position.distance_to(&target),
        }
    }

    /// Fly a whole leg, yielding to the scheduler once per tick.
    ///
    /// Returns once the drone has arrived or run out of battery.
    pub async fn fly_leg(
        &mut self,
        waypoint: Vector3,
        tick: Duration,
    ) -> Result<LegOutcome, FlightError> {
        if let Some(outcome) = self.fly_to(waypoint)? {
            return Ok(outcome);
        }
        loop {
            if let StepOutcome::Finished(outcome) = self.step() {
                return Ok(outcome);
            }
            pause(tick).await;
        }
    }

    /// Send the drone home.
    ///
    /// Mid-leg this redirects the active leg to the origin rather than
    /// issuing a new command, so the `AlreadyFlying` guard does not apply.
    pub fn return_home(&mut self) -> Result<(), FlightError> {
        match self.state {
            FlightState::Flying => {
                info!(drone = %self.name, position = %self.position, "Returning home");
                self.waypoints.push(Vector3::ORIGIN);
                self.target = Some(Vector3::ORIGIN);
                self.transition(FlightState::Returning);
                Ok(())
            }
            FlightState::Returning => Ok(()),
            FlightState::Idle => {
                info!(drone = %self.name, "Not flying");
                Err(FlightError::NotFlying {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Record a detected obstacle and try to fly around it.
    ///
    /// The obstacle is logged even when the avoidance leg is rejected.
    pub fn add_obstacle(&mut self, obstacle: Vector3) -> Result<Option<LegOutcome>, FlightError> {
        info!(drone = %self.name, %obstacle, "Obstacle detected");
        self.obstacles.push(obstacle);
        self.avoid_obstacle(obstacle)
    }

    pub fn avoid_obstacle(&mut self, obstacle: Vector3) -> Result<Option<LegOutcome>, FlightError> {
        let waypoint = self.avoidance.replan(self.position, obstacle);
        info!(
            drone = %self.name,
            %obstacle,
            %waypoint,
            strategy = self.avoidance.name(),
            "Calculating avoidance path"
        );
        self.fly_to(waypoint)
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::new(&self.name, self.position, self.battery, self.state)
    }

    fn drain(&mut self, cost: f64) {
        let remaining = (self.battery - cost).max(0.0);
        self.battery = if remaining < self.params.exhaustion_threshold {
            0.0
        } else {
            remaining
        };
    }

    fn arrive(&mut self, target: Vector3) -> LegOutcome {
        self.position = target;
        self.target = None;
        self.transition(FlightState::Idle);
        info!(drone = %self.name, position = %self.position, battery = self.battery, "Arrived");
        LegOutcome::Arrived {
            position: self.position,
            battery: self.battery,
        }
    }

    fn exhaust(&mut self) -> LegOutcome {
        self.target = None;
        self.transition(FlightState::Idle);
        warn!(drone = %self.name, position = %self.position, "Battery empty, holding position");
        LegOutcome::BatteryExhausted {
            position: self.position,
        }
    }

    fn transition(&mut self, next: FlightState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal flight state transition {} -> {}",
            self.state,
            next
        );
        if self.state != next {
            debug!(drone = %self.name, from = %self.state, to = %next, "State change");
        }
        self.state = next;
    }
}

/// Wait out one tick boundary.
pub(crate) async fn pause(tick: Duration) {
    if tick.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avoidance::Sidestep;

    fn run_to_end(drone: &mut Drone) -> (LegOutcome, usize) {
        let mut ticks = 0;
        loop {
            ticks += 1;
            match drone.step() {
                StepOutcome::Finished(outcome) => return (outcome, ticks),
                StepOutcome::Advanced { .. } => {}
                StepOutcome::Holding => panic!("drone stopped integrating mid-leg"),
            }
        }
    }

    #[test]
    fn test_new_drone_defaults() {
        let drone = Drone::new("Drone1");
        assert_eq!(drone.name(), "Drone1");
        assert_eq!(drone.state(), FlightState::Idle);
        assert_eq!(drone.position(), Vector3::ORIGIN);
        assert!((drone.battery() - 100.0).abs() < f64::EPSILON);
        assert!(drone.waypoints().is_empty());
        assert!(drone.obstacles().is_empty());
        assert_eq!(drone.avoidance().name(), "fixed-offset");
    }

    #[test]
    fn test_first_step_matches_hand_calculation() {
        let mut drone = Drone::new("Drone1");
        let waypoint = Vector3::new(10.0, 10.0, 0.0);

        assert_eq!(drone.fly_to(waypoint), Ok(None));
        assert_eq!(drone.state(), FlightState::Flying);

        let StepOutcome::Advanced { position, battery, remaining } = drone.step() else {
            panic!("expected the first step to stay en route");
        };
        let expected = 10.0 / 2f64.sqrt();
        assert!((position.x - expected).abs() < 1e-9);
        assert!((position.y - expected).abs() < 1e-9);
        assert!(position.z.abs() < f64::EPSILON);
        assert!((battery - 99.0).abs() < 1e-9);
        assert!((remaining - (200f64.sqrt() - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_leg_converges_exactly() {
        let mut drone = Drone::new("Drone1");
        let waypoint = Vector3::new(10.0, 10.0, 0.0);
        drone.fly_to(waypoint).unwrap();

        let mut last_distance = drone.position().distance_to(&waypoint);
        let outcome = loop {
            match drone.step() {
                StepOutcome::Advanced { remaining, battery, .. } => {
                    assert!(remaining < last_distance);
                    assert!(battery > 0.0);
                    last_distance = remaining;
                }
                StepOutcome::Finished(outcome) => break outcome,
                StepOutcome::Holding => panic!("unexpected hold"),
            }
        };

        assert!(outcome.is_arrival());
        assert_eq!(drone.position(), waypoint);
        assert_eq!(drone.state(), FlightState::Idle);
        assert!(drone.battery() < 100.0);
        assert!(drone.battery() > 0.0);
        assert_eq!(drone.target(), None);
    }

    #[test]
    fn test_battery_is_monotonic() {
        let mut drone = Drone::with_max_battery("Drone1", 3.0);
        drone.fly_to(Vector3::new(40.0, -25.0, 12.0)).unwrap();

        let mut previous = drone.battery();
        loop {
            let outcome = drone.step();
            assert!(drone.battery() <= previous);
            previous = drone.battery();
            if !outcome.is_active() {
                break;
            }
        }
    }

    #[test]
    fn test_low_battery_creeps_forward() {
        let mut drone = Drone::with_max_battery("Drone1", 0.5);
        drone.fly_to(Vector3::new(100.0, 0.0, 0.0)).unwrap();

        let StepOutcome::Advanced { position, battery, .. } = drone.step() else {
            panic!("a 0.5 battery drone must not finish in one step");
        };
        assert!((position.x - 0.05).abs() < 1e-12);
        assert!((battery - 0.495).abs() < 1e-12);
        assert!(position.x.is_finite());
        assert_eq!(drone.state(), FlightState::Flying);
    }

    #[test]
    fn test_exhaustion_halts_in_place() {
        let waypoint = Vector3::new(100.0, 0.0, 0.0);
        let mut drone = Drone::with_max_battery("Drone1", 0.5);
        drone.fly_to(waypoint).unwrap();

        let (outcome, ticks) = run_to_end(&mut drone);

        assert!(ticks > 1);
        assert!(matches!(outcome, LegOutcome::BatteryExhausted { .. }));
        assert_eq!(drone.battery(), 0.0);
        assert_eq!(drone.state(), FlightState::Idle);
        assert_ne!(drone.position(), waypoint);
        // Total range of a speed-capped drone is ten times its battery
        assert!(drone.position().x < 5.0);
        assert_eq!(outcome.position(), drone.position());
    }

    #[test]
    fn test_stalled_drone_without_threshold_still_terminates() {
        let params = FlightParams {
            exhaustion_threshold: 0.0,
            ..FlightParams::with_max_battery(0.5)
        };
        let waypoint = Vector3::new(100.0, 0.0, 0.0);
        let mut drone = Drone::with_params("Drone1", params);
        drone.fly_to(waypoint).unwrap();

        let mut last_distance = drone.position().distance_to(&waypoint);
        let mut outcome = None;
        for _ in 0..100_000 {
            match drone.step() {
                StepOutcome::Advanced { remaining, .. } => {
                    assert!(remaining <= last_distance);
                    last_distance = remaining;
                }
                StepOutcome::Finished(leg) => {
                    outcome = Some(leg);
                    break;
                }
                StepOutcome::Holding => panic!("unexpected hold"),
            }
        }

        assert!(matches!(outcome, Some(LegOutcome::BatteryExhausted { .. })));
        assert_eq!(drone.battery(), 0.0);
        assert_eq!(drone.state(), FlightState::Idle);
        assert_ne!(drone.position(), waypoint);
    }

    #[test]
    fn test_empty_battery_rejects_command() {
        let mut drone = Drone::with_max_battery("Drone1", 0.0);

        let err = drone.fly_to(Vector3::new(1.0, 0.0, 0.0)).unwrap_err();

        assert!(matches!(err, FlightError::BatteryEmpty { .. }));
        assert_eq!(drone.state(), FlightState::Idle);
        assert_eq!(drone.position(), Vector3::ORIGIN);
        assert!(drone.waypoints().is_empty());
    }

    #[test]
    fn test_command_rejected_while_flying() {
        let mut drone = Drone::new("Drone1");
        drone.fly_to(Vector3::new(50.0, 0.0, 0.0)).unwrap();
        drone.step();

        let position = drone.position();
        let battery = drone.battery();
        let waypoints = drone.waypoints().to_vec();

        let err = drone.fly_to(Vector3::new(-5.0, 0.0, 0.0)).unwrap_err();

        assert!(matches!(err, FlightError::AlreadyFlying { .. }));
        assert_eq!(drone.position(), position);
        assert_eq!(drone.battery(), battery);
        assert_eq!(drone.waypoints(), waypoints.as_slice());
        assert_eq!(drone.target(), Some(Vector3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn test_repeat_arrival_is_free() {
        let mut drone = Drone::new("Drone1");
        let here = Vector3::new(3.0, 4.0, 0.0);
        drone.fly_leg_blocking(here);
        let battery = drone.battery();

        let outcome = drone.fly_to(here).unwrap();

        assert_eq!(
            outcome,
            Some(LegOutcome::Arrived {
                position: here,
                battery
            })
        );
        assert_eq!(drone.battery(), battery);
        assert_eq!(drone.position(), here);
        assert_eq!(drone.state(), FlightState::Idle);
        assert_eq!(drone.waypoints().len(), 2);
    }

    #[test]
    fn test_step_while_idle_holds() {
        let mut drone = Drone::new("Drone1");
        assert_eq!(drone.step(), StepOutcome::Holding);
        assert!((drone.battery() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_return_home_redirects_active_leg() {
        let mut drone = Drone::new("Drone1");
        drone.fly_to(Vector3::new(30.0, 0.0, 0.0)).unwrap();
        drone.step();
        drone.step();

        drone.return_home().unwrap();
        assert_eq!(drone.state(), FlightState::Returning);
        assert_eq!(drone.target(), Some(Vector3::ORIGIN));
        assert_eq!(drone.waypoints().last(), Some(&Vector3::ORIGIN));

        // A second request while already returning changes nothing
        drone.return_home().unwrap();
        assert_eq!(drone.waypoints().len(), 2);

        let (outcome, _) = run_to_end(&mut drone);
        assert!(outcome.is_arrival());
        assert_eq!(drone.position(), Vector3::ORIGIN);
        assert_eq!(drone.state(), FlightState::Idle);
    }

    #[test]
    fn test_return_home_when_idle_is_rejected() {
        let mut drone = Drone::new("Drone1");

        let err = drone.return_home().unwrap_err();

        assert!(matches!(err, FlightError::NotFlying { .. }));
        assert_eq!(drone.state(), FlightState::Idle);
        assert!(drone.waypoints().is_empty());
    }

    #[test]
    fn test_obstacle_when_idle_nudges_drone() {
        let mut drone = Drone::new("Drone1");
        drone.fly_leg_blocking(Vector3::new(10.0, 10.0, 0.0));

        let outcome = drone.add_obstacle(Vector3::new(12.0, 9.0, 0.0)).unwrap();
        assert_eq!(outcome, None);
        assert_eq!(drone.target(), Some(Vector3::new(11.0, 11.0, 0.0)));

        let (outcome, ticks) = run_to_end(&mut drone);
        assert!(outcome.is_arrival());
        assert_eq!(ticks, 1);
        assert_eq!(drone.position(), Vector3::new(11.0, 11.0, 0.0));
        assert_eq!(drone.obstacles(), &[Vector3::new(12.0, 9.0, 0.0)]);
    }

    #[test]
    fn test_obstacle_while_flying_is_logged_but_rejected() {
        let mut drone = Drone::new("Drone1");
        drone.fly_to(Vector3::new(50.0, 50.0, 0.0)).unwrap();
        drone.step();

        let err = drone.add_obstacle(Vector3::new(20.0, 20.0, 0.0)).unwrap_err();

        assert!(matches!(err, FlightError::AlreadyFlying { .. }));
        assert_eq!(drone.obstacles().len(), 1);
        assert_eq!(drone.target(), Some(Vector3::new(50.0, 50.0, 0.0)));
    }

    #[test]
    fn test_custom_avoidance_strategy() {
        let mut drone = Drone::new("Drone1").with_avoidance(Sidestep { clearance: 1.0 });

        drone.add_obstacle(Vector3::new(0.0, 5.0, 0.0)).unwrap();

        assert_eq!(drone.target(), Some(Vector3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut drone = Drone::new("Drone1");
        let before = drone.telemetry();

        drone.fly_to(Vector3::new(5.0, 0.0, 0.0)).unwrap();
        drone.step();

        assert_eq!(before.position, Vector3::ORIGIN);
        assert_eq!(before.state, FlightState::Idle);
        assert!((before.battery - 100.0).abs() < f64::EPSILON);
        assert_ne!(drone.telemetry().position, before.position);
    }

    #[tokio::test]
    async fn test_fly_leg_runs_to_completion() {
        let mut drone = Drone::new("Drone1");
        let waypoint = Vector3::new(10.0, 10.0, 0.0);

        let outcome = drone.fly_leg(waypoint, Duration::ZERO).await.unwrap();

        assert!(outcome.is_arrival());
        assert_eq!(drone.position(), waypoint);
        assert_eq!(drone.state(), FlightState::Idle);
    }

    #[tokio::test]
    async fn test_fly_leg_surfaces_rejection() {
        let mut drone = Drone::with_max_battery("Drone1", 0.0);

        let result = drone.fly_leg(Vector3::new(1.0, 1.0, 1.0), Duration::ZERO).await;

        assert!(matches!(result, Err(FlightError::BatteryEmpty { .. })));
    }

    impl Drone {
        fn fly_leg_blocking(&mut self, waypoint: Vector3) -> LegOutcome {
            match self.fly_to(waypoint).unwrap() {
                Some(outcome) => outcome,
                None => run_to_end(self).0,
            }
        }
    }
}
