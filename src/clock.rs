use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Source of monotonic microsecond timestamps for controllers.
pub trait Clock {
    fn now_micros(&self) -> u64;
}

/// Wall-clock independent time, counted from when the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Hand-driven clock for simulations and tests.
/// Clones share the same time, so a caller can keep one handle and advance
/// the clock owned by a controller.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    micros: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_micros(&self, micros: u64) {
        self.micros.set(micros);
    }

    pub fn advance_micros(&self, micros: u64) {
        self.micros.set(self.micros.get().saturating_add(micros));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance_micros(millis.saturating_mul(1_000));
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.get()
    }
}
