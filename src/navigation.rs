use log::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{Config, DriveConfig};
use crate::drive::DriveCommand;
use crate::geo::{self, GeoCoordinate};
use crate::pid::{PidController, heading_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Idle,
    Navigating,
}

/// Destination; a cleared target keeps its last coordinate with `is_set`
/// false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationTarget {
    pub coordinate: GeoCoordinate,
    pub is_set: bool,
}

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationOutcome {
    Navigating {
        /// Shortest-path error in degrees, positive when the target lies
        /// clockwise of the current heading.
        heading_error: f64,
        target_bearing: f64,
        distance: f64,
        left_speed: f64,
        right_speed: f64,
    },
    TargetReached,
    NoTarget,
    NoFix,
}

impl NavigationOutcome {
    /// Motor command for this outcome; anything but `Navigating` stops.
    pub fn drive_command(&self) -> DriveCommand {
        match *self {
            NavigationOutcome::Navigating {
                left_speed,
                right_speed,
                ..
            } => DriveCommand::from_speeds(left_speed, right_speed),
            _ => DriveCommand::STOP,
        }
    }
}

/// Steers towards a single target using a heading PID and differential drive.
///
/// The PID setpoint is the bearing to the target and its input the current
/// heading. The correction slows the left side and speeds up the right:
/// `left = base_left - correction`, `right = base_right + correction`.
pub struct NavigationController<C: Clock = MonotonicClock> {
    heading_pid: PidController<C>,
    target: NavigationTarget,
    drive: DriveConfig,
    arrival_radius: f64,
}

impl NavigationController<MonotonicClock> {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> NavigationController<C> {
    pub fn with_clock(config: &Config, clock: C) -> Self {
        let pid = &config.heading_pid;
        let mut heading_pid = PidController::with_clock(clock);
        heading_pid.init(pid.kp, pid.ki, pid.kd, pid.output_min, pid.output_max);

        Self {
            heading_pid,
            target: NavigationTarget {
                coordinate: GeoCoordinate::new(0.0, 0.0),
                is_set: false,
            },
            drive: config.drive,
            arrival_radius: config.navigation.arrival_radius_m,
        }
    }

    pub fn state(&self) -> NavigationState {
        if self.target.is_set {
            NavigationState::Navigating
        } else {
            NavigationState::Idle
        }
    }

    pub fn target(&self) -> NavigationTarget {
        self.target
    }

    /// The active destination, if any.
    pub fn active_target(&self) -> Option<GeoCoordinate> {
        self.target.is_set.then_some(self.target.coordinate)
    }

    pub fn heading_pid(&self) -> &PidController<C> {
        &self.heading_pid
    }

    pub fn heading_pid_mut(&mut self) -> &mut PidController<C> {
        &mut self.heading_pid
    }

    /// Start (or restart) navigation towards `coordinate`.
    ///
    /// Out of range coordinates are refused and leave the current target
    /// untouched. Returns whether the target was accepted.
    pub fn set_target(&mut self, coordinate: GeoCoordinate) -> bool {
        if !coordinate.is_valid() {
            warn!("Refusing out of range target {}", coordinate);
            return false;
        }

        self.heading_pid.reset();
        self.target = NavigationTarget {
            coordinate,
            is_set: true,
        };
        info!("New target: {}", coordinate);
        true
    }

    /// Abort navigation. Returns false if there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        if !self.target.is_set {
            return false;
        }
        self.go_idle();
        info!("Navigation stopped");
        true
    }

    fn go_idle(&mut self) {
        self.target.is_set = false;
        self.heading_pid.reset();
    }

    /// Run one control step.
    ///
    /// Without a valid fix the target and PID history are kept, so a brief
    /// signal loss does not discard progress.
    pub fn tick(
        &mut self,
        current_position: &GeoCoordinate,
        current_heading: f64,
        position_fix_valid: bool,
    ) -> NavigationOutcome {
        if !self.target.is_set {
            return NavigationOutcome::NoTarget;
        }
        if !position_fix_valid {
            debug!("No GPS fix; holding target {}", self.target.coordinate);
            return NavigationOutcome::NoFix;
        }

        let target = self.target.coordinate;
        let target_bearing = geo::bearing(current_position, &target);
        let distance = geo::distance(current_position, &target);

        if distance < self.arrival_radius {
            self.go_idle();
            info!("Target reached: {} ({:.2} m)", target, distance);
            return NavigationOutcome::TargetReached;
        }

        self.heading_pid.set_setpoint(target_bearing);
        let correction = self.heading_pid.compute(current_heading);

        let (min, max) = (self.drive.min_speed, self.drive.max_speed);
        let left_speed = (self.drive.base_speed_left - correction).clamp(min, max);
        let right_speed = (self.drive.base_speed_right + correction).clamp(min, max);

        let heading_error = heading_error(target_bearing, current_heading);
        debug!(
            "Nav: H={:.1}° T={:.1}° E={:.1}° D={:.1}m L={:.0} R={:.0}",
            current_heading, target_bearing, heading_error, distance, left_speed, right_speed
        );

        NavigationOutcome::Navigating {
            heading_error,
            target_bearing,
            distance,
            left_speed,
            right_speed,
        }
    }
}
