use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use nmea::sentences::FixType;
use nmea::{Nmea, SentenceType};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{MAX_FIX_AGE_MS, MIN_FIX_SATELLITES};
use crate::geo::GeoCoordinate;

/// Latest position report from the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u32,
    /// GGA fix quality code; 0 means no fix.
    pub fix_quality: u8,
    pub altitude: Option<f64>,
    pub fix_valid: bool,
}

impl GpsFix {
    pub fn coordinate(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.latitude, self.longitude)
    }
}

/// GGA quality indicator for a parsed fix type.
pub fn fix_quality(fix_type: Option<FixType>) -> u8 {
    match fix_type {
        None | Some(FixType::Invalid) => 0,
        Some(FixType::Gps) => 1,
        Some(FixType::DGps) => 2,
        Some(FixType::Pps) => 3,
        Some(FixType::Rtk) => 4,
        Some(FixType::FloatRtk) => 5,
        Some(FixType::Estimated) => 6,
        Some(FixType::Manual) => 7,
        Some(FixType::Simulation) => 8,
    }
}

/// Accumulates NMEA sentences into a [`GpsFix`].
///
/// Only GGA sentences update the fix. A fix is valid with at least
/// `min_satellites` in use and a non-zero quality, and only while the last
/// GGA is younger than `max_fix_age_ms`.
pub struct GpsReceiver<C: Clock = MonotonicClock> {
    nmea: Nmea,
    min_satellites: u32,
    max_fix_age_us: u64,
    fix: GpsFix,
    last_gga_at: Option<u64>,
    sentences: u64,
    parse_errors: u64,
    clock: C,
}

impl Default for GpsReceiver<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsReceiver<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_min_satellites(MIN_FIX_SATELLITES)
    }

    pub fn with_min_satellites(min_satellites: u32) -> Self {
        Self::with_clock(min_satellites, MAX_FIX_AGE_MS, MonotonicClock::new())
    }
}

impl<C: Clock> GpsReceiver<C> {
    pub fn with_clock(min_satellites: u32, max_fix_age_ms: u64, clock: C) -> Self {
        Self {
            nmea: Nmea::default(),
            min_satellites,
            max_fix_age_us: max_fix_age_ms.saturating_mul(1_000),
            fix: GpsFix::default(),
            last_gga_at: None,
            sentences: 0,
            parse_errors: 0,
            clock,
        }
    }

    /// Latest fix. A fix whose last GGA is older than the age limit is
    /// reported invalid; its coordinate is kept.
    pub fn fix(&self) -> GpsFix {
        let mut fix = self.fix;
        if fix.fix_valid && self.is_stale() {
            fix.fix_valid = false;
        }
        fix
    }

    /// Milliseconds since the last GGA sentence, if one has arrived.
    pub fn fix_age_ms(&self) -> Option<u64> {
        self.last_gga_at
            .map(|at| self.clock.now_micros().saturating_sub(at) / 1_000)
    }

    fn is_stale(&self) -> bool {
        match self.last_gga_at {
            Some(at) => self.clock.now_micros().saturating_sub(at) > self.max_fix_age_us,
            None => true,
        }
    }

    /// Drop the current fix, e.g. once its source has gone away.
    pub fn invalidate(&mut self) {
        if self.fix.fix_valid {
            warn!("GPS fix invalidated at {}", self.fix.coordinate());
        }
        self.fix.fix_valid = false;
    }

    pub fn sentence_count(&self) -> u64 {
        self.sentences
    }

    pub fn parse_error_count(&self) -> u64 {
        self.parse_errors
    }

    /// Feed one NMEA line. Returns true if it updated the fix.
    pub fn feed_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }

        match self.nmea.parse(trimmed) {
            Ok(SentenceType::GGA) => {
                self.sentences += 1;
                self.apply_gga();
                true
            }
            Ok(_) => {
                self.sentences += 1;
                false
            }
            Err(e) => {
                self.parse_errors += 1;
                debug!("Ignoring NMEA line '{}': {:?}", trimmed, e);
                false
            }
        }
    }

    fn apply_gga(&mut self) {
        let was_valid = self.fix().fix_valid;
        self.last_gga_at = Some(self.clock.now_micros());

        if let (Some(lat), Some(lon)) = (self.nmea.latitude, self.nmea.longitude) {
            self.fix.latitude = lat;
            self.fix.longitude = lon;
        }
        self.fix.satellites = self.nmea.num_of_fix_satellites.unwrap_or(0);
        self.fix.fix_quality = fix_quality(self.nmea.fix_type);
        self.fix.altitude = self.nmea.altitude.map(f64::from);
        self.fix.fix_valid = self.fix.satellites >= self.min_satellites
            && self.fix.fix_quality > 0
            && self.nmea.latitude.is_some()
            && self.nmea.longitude.is_some();

        match (was_valid, self.fix.fix_valid) {
            (false, true) => info!(
                "GPS fix acquired: {} ({} satellites)",
                self.fix.coordinate(),
                self.fix.satellites
            ),
            (true, false) => warn!("GPS fix lost ({} satellites)", self.fix.satellites),
            _ => {}
        }
    }
}

/// Read NMEA lines from `reader` into the shared receiver until EOF.
///
/// However it returns, the receiver's fix is invalidated so the control
/// loop never steers on a position that can no longer update.
pub fn read_serial<R: BufRead, C: Clock>(
    reader: R,
    receiver: Arc<Mutex<GpsReceiver<C>>>,
) -> io::Result<()> {
    let result = pump_lines(reader, &receiver);
    receiver
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .invalidate();
    result
}

fn pump_lines<R: BufRead, C: Clock>(
    mut reader: R,
    receiver: &Mutex<GpsReceiver<C>>,
) -> io::Result<()> {
    let mut buffer = Vec::with_capacity(256);
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buffer);

        match receiver.lock() {
            Ok(mut gps) => {
                gps.feed_line(&line);
            }
            Err(_) => {
                return Err(io::Error::other("GPS receiver lock poisoned"));
            }
        }
    }
}
