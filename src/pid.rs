use crate::clock::{Clock, MonotonicClock};

/// Reasons a PID update was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PidError {
    #[error("PID controller used before init")]
    NotReady,

    #[error("no time has elapsed since the previous update")]
    NonPositiveDt,
}

/// Which limit clamped the output, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saturation {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidOutput {
    pub value: f64,
    pub saturation: Option<Saturation>,
}

/// Proportional/integral/derivative gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// PID controller with output clamping and integral anti-windup.
///
/// The derivative acts on the measurement rather than on the error, so a
/// setpoint step does not produce a derivative kick. The output is
/// `P + I - D` with `D = kd * d(input)/dt`.
///
/// Every operation except [`PidController::init`] is neutral until the
/// controller has been initialised.
#[derive(Debug, Clone)]
pub struct PidController<C: Clock = MonotonicClock> {
    gains: PidGains,
    setpoint: f64,
    last_input: f64,
    integral: f64,
    output_min: f64,
    output_max: f64,
    last_time: u64,
    ready: bool,
    clock: C,
}

impl PidController<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for PidController<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> PidController<C> {
    /// Create an uninitialised controller that reads time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            gains: PidGains {
                kp: 0.0,
                ki: 0.0,
                kd: 0.0,
            },
            setpoint: 0.0,
            last_input: 0.0,
            integral: 0.0,
            output_min: 0.0,
            output_max: 0.0,
            last_time: 0,
            ready: false,
            clock,
        }
    }

    /// Reset all state and arm the controller.
    /// Limits given in the wrong order are swapped.
    pub fn init(&mut self, kp: f64, ki: f64, kd: f64, output_min: f64, output_max: f64) {
        let (output_min, output_max) = ordered(output_min, output_max);
        self.gains = PidGains { kp, ki, kd };
        self.setpoint = 0.0;
        self.last_input = 0.0;
        self.integral = 0.0;
        self.output_min = output_min;
        self.output_max = output_max;
        self.last_time = self.clock.now_micros();
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        if !self.ready {
            return;
        }
        self.setpoint = setpoint;
    }

    /// Advance the controller, returning 0 whenever the update is skipped.
    pub fn compute(&mut self, input: f64) -> f64 {
        self.try_compute(input).map_or(0.0, |output| output.value)
    }

    /// Advance the controller by the time elapsed since the last update.
    ///
    /// State is left untouched on error.
    pub fn try_compute(&mut self, input: f64) -> Result<PidOutput, PidError> {
        if !self.ready {
            return Err(PidError::NotReady);
        }

        let now = self.clock.now_micros();
        if now <= self.last_time {
            return Err(PidError::NonPositiveDt);
        }
        let dt = (now - self.last_time) as f64 / 1_000_000.0;

        let PidGains { kp, ki, kd } = self.gains;
        let error = self.setpoint - input;

        let proportional = kp * error;

        self.integral += error * dt;
        let integral = ki * self.integral;

        let derivative = kd * (input - self.last_input) / dt;

        let mut output = proportional + integral - derivative;
        let mut saturation = None;

        if output > self.output_max {
            output = self.output_max;
            saturation = Some(Saturation::Upper);
            if ki != 0.0 {
                let integral_max = (self.output_max - proportional + derivative) / ki;
                if self.integral > integral_max {
                    self.integral = integral_max;
                }
            }
        } else if output < self.output_min {
            output = self.output_min;
            saturation = Some(Saturation::Lower);
            if ki != 0.0 {
                let integral_min = (self.output_min - proportional + derivative) / ki;
                if self.integral < integral_min {
                    self.integral = integral_min;
                }
            }
        }

        self.last_input = input;
        self.last_time = now;

        Ok(PidOutput {
            value: output,
            saturation,
        })
    }

    /// Discard integral history, e.g. after an abrupt setpoint change.
    pub fn reset(&mut self) {
        if !self.ready {
            return;
        }
        self.integral = 0.0;
        self.last_input = 0.0;
        self.last_time = self.clock.now_micros();
    }

    pub fn tune(&mut self, kp: f64, ki: f64, kd: f64) {
        if !self.ready {
            return;
        }
        self.gains = PidGains { kp, ki, kd };
        self.reset();
    }

    /// Replace the output limits, pulling the integral back inside
    /// `[min / ki, max / ki]` so the next output is in range.
    pub fn set_output_limits(&mut self, output_min: f64, output_max: f64) {
        if !self.ready {
            return;
        }
        let (output_min, output_max) = ordered(output_min, output_max);
        self.output_min = output_min;
        self.output_max = output_max;

        let ki = self.gains.ki;
        if ki != 0.0 {
            let (low, high) = ordered(output_min / ki, output_max / ki);
            if self.integral > high {
                self.integral = high;
            } else if self.integral < low {
                self.integral = low;
            }
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Signed shortest-path angular error `setpoint - input`, in [-180, 180].
pub fn heading_error(setpoint: f64, input: f64) -> f64 {
    let mut error = (setpoint - input) % 360.0;
    while error > 180.0 {
        error -= 360.0;
    }
    while error < -180.0 {
        error += 360.0;
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TICK_MS: u64 = 50;

    fn controller(kp: f64, ki: f64, kd: f64, min: f64, max: f64) -> (PidController<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut pid = PidController::with_clock(clock.clone());
        pid.init(kp, ki, kd, min, max);
        (pid, clock)
    }

    #[test]
    fn test_compute_before_init_is_neutral() {
        let clock = ManualClock::new();
        let mut pid = PidController::with_clock(clock.clone());
        clock.advance_millis(TICK_MS);

        pid.set_setpoint(90.0);
        assert_eq!(pid.setpoint(), 0.0);
        assert_eq!(pid.try_compute(10.0), Err(PidError::NotReady));
        assert_eq!(pid.compute(10.0), 0.0);
        assert!(!pid.is_ready());
    }

    #[test]
    fn test_zero_dt_skips_update() {
        let (mut pid, clock) = controller(1.0, 1.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(10.0);

        assert_eq!(pid.try_compute(0.0), Err(PidError::NonPositiveDt));
        assert_eq!(pid.integral(), 0.0);

        clock.advance_millis(TICK_MS);
        assert!(pid.try_compute(0.0).is_ok());
        let integral = pid.integral();

        // same tick twice: no double integration
        assert_eq!(pid.compute(0.0), 0.0);
        assert_eq!(pid.integral(), integral);
    }

    #[test]
    fn test_proportional_only() {
        let (mut pid, clock) = controller(2.0, 0.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(30.0);
        clock.advance_millis(TICK_MS);

        let output = pid.try_compute(20.0).unwrap();
        assert_eq!(output.value, 20.0);
        assert_eq!(output.saturation, None);
    }

    #[test]
    fn test_integral_accumulates_error_times_dt() {
        let (mut pid, clock) = controller(0.0, 1.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(10.0);

        for _ in 0..4 {
            clock.advance_millis(500);
            pid.compute(0.0);
        }
        assert!((pid.integral() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivative_on_measurement_is_subtracted() {
        let (mut pid, clock) = controller(0.0, 0.0, 1.0, -100.0, 100.0);
        pid.set_setpoint(0.0);

        clock.advance_millis(1000);
        // input rose by 5 in one second, setpoint unchanged
        let output = pid.compute(5.0);
        assert!((output + 5.0).abs() < 1e-9);

        // a setpoint step with constant input produces no derivative kick
        pid.set_setpoint(50.0);
        clock.advance_millis(1000);
        assert_eq!(pid.compute(5.0), 0.0);
    }

    #[test]
    fn test_output_clamped_and_flagged() {
        let (mut pid, clock) = controller(10.0, 0.0, 0.0, -50.0, 50.0);
        pid.set_setpoint(100.0);
        clock.advance_millis(TICK_MS);
        let output = pid.try_compute(0.0).unwrap();
        assert_eq!(output.value, 50.0);
        assert_eq!(output.saturation, Some(Saturation::Upper));

        pid.set_setpoint(-100.0);
        clock.advance_millis(TICK_MS);
        let output = pid.try_compute(0.0).unwrap();
        assert_eq!(output.value, -50.0);
        assert_eq!(output.saturation, Some(Saturation::Lower));
    }

    #[test]
    fn test_anti_windup_prevents_overshoot() {
        let (mut pid, clock) = controller(1.0, 2.0, 0.0, -10.0, 10.0);
        pid.set_setpoint(100.0);

        for _ in 0..20 {
            clock.advance_millis(TICK_MS);
            let output = pid.try_compute(0.0).unwrap();
            assert_eq!(output.saturation, Some(Saturation::Upper));
        }

        // without anti-windup the integral would be 100 * 1.0s = 100
        assert!(pid.ki_term() <= 10.0);

        // error vanishes: the stored integral alone must not exceed the limit
        pid.set_setpoint(0.0);
        clock.advance_millis(TICK_MS);
        let output = pid.compute(0.0);
        assert!(output <= 10.0);
        assert!(output >= -10.0);
    }

    #[test]
    fn test_constant_input_at_setpoint_converges_to_zero() {
        let (mut pid, clock) = controller(2.0, 0.0, 0.2, -50.0, 50.0);
        pid.set_setpoint(42.0);

        // first update sees the jump from the zeroed last input
        clock.advance_millis(TICK_MS);
        assert_eq!(pid.compute(42.0), -50.0);

        let mut last = f64::MAX;
        for _ in 0..10 {
            clock.advance_millis(TICK_MS);
            last = pid.compute(42.0);
        }
        assert!(last.abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_integral_and_timestamp() {
        let (mut pid, clock) = controller(0.0, 1.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(10.0);
        clock.advance_millis(TICK_MS);
        pid.compute(0.0);
        assert!(pid.integral() > 0.0);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        // reset recaptured the time, so an immediate compute is skipped
        assert_eq!(pid.try_compute(0.0), Err(PidError::NonPositiveDt));
    }

    #[test]
    fn test_tune_replaces_gains_and_resets() {
        let (mut pid, clock) = controller(1.0, 1.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(10.0);
        clock.advance_millis(TICK_MS);
        pid.compute(0.0);

        pid.tune(3.0, 0.5, 0.1);
        assert_eq!(
            pid.gains(),
            PidGains {
                kp: 3.0,
                ki: 0.5,
                kd: 0.1
            }
        );
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.setpoint(), 10.0);
    }

    #[test]
    fn test_set_output_limits_rescales_integral() {
        let (mut pid, clock) = controller(0.0, 2.0, 0.0, -100.0, 100.0);
        pid.set_setpoint(20.0);
        for _ in 0..10 {
            clock.advance_millis(100);
            pid.compute(0.0);
        }
        assert!((pid.integral() - 20.0).abs() < 1e-9);

        pid.set_output_limits(-10.0, 10.0);
        assert_eq!(pid.output_limits(), (-10.0, 10.0));
        assert!((pid.integral() - 5.0).abs() < 1e-9);

        pid.set_setpoint(0.0);
        clock.advance_millis(1);
        assert!(pid.compute(0.0) <= 10.0);
    }

    #[test]
    fn test_inverted_limits_are_ordered() {
        let (pid, _clock) = controller(1.0, 0.0, 0.0, 50.0, -50.0);
        assert_eq!(pid.output_limits(), (-50.0, 50.0));
    }

    #[test]
    fn test_heading_error_wraps_shortest_path() {
        assert_eq!(heading_error(10.0, 350.0), 20.0);
        assert_eq!(heading_error(350.0, 10.0), -20.0);
        assert_eq!(heading_error(90.0, 85.0), 5.0);
        assert_eq!(heading_error(0.0, 180.0), -180.0);
        assert_eq!(heading_error(180.0, 0.0), 180.0);
        assert_eq!(heading_error(725.0, 0.0), 5.0);
    }

    #[test]
    fn test_heading_error_range_and_congruence() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..10_000 {
            let h1: f64 = rng.random_range(0.0..360.0);
            let h2: f64 = rng.random_range(0.0..360.0);
            let error = heading_error(h1, h2);

            assert!((-180.0..=180.0).contains(&error), "{h1} {h2} -> {error}");
            let residue = (error - (h1 - h2)).rem_euclid(360.0);
            assert!(residue < 1e-9 || (360.0 - residue) < 1e-9);
        }
    }

    impl<C: Clock> PidController<C> {
        fn ki_term(&self) -> f64 {
            self.gains.ki * self.integral
        }
    }
}
