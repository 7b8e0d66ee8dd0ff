use std::fmt;

use log::debug;

use crate::magnetometer::{MagneticSensor, RawSample, SensorError};
use crate::pid::heading_error;

/// Normalize any angle in degrees into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds to 360.0
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Smooths magnetometer headings with a one-pole low-pass filter.
///
/// The filter steps along the shortest arc between the current estimate and
/// each new reading, so a transition from 359° to 1° stays near north instead
/// of sweeping through 180°.
#[derive(Debug, Clone)]
pub struct HeadingFilter {
    filtered_heading: f64,
    alpha: f64,
    declination: f64,
}

impl HeadingFilter {
    /// `alpha` is the smoothing factor in (0, 1]; 1 disables smoothing.
    /// `declination` is in radians and added to every raw heading.
    pub fn new(alpha: f64, declination: f64) -> Self {
        Self {
            filtered_heading: 0.0,
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            declination,
        }
    }

    pub fn filtered_heading(&self) -> f64 {
        self.filtered_heading
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.alpha
    }

    pub fn declination(&self) -> f64 {
        self.declination
    }

    /// Takes effect on the next reading; the filter state is kept.
    pub fn set_declination(&mut self, radians: f64) {
        self.declination = radians;
    }

    /// Instantaneous heading of a horizontal field vector, corrected for
    /// declination. Returns degrees in [0, 360).
    pub fn calculate_heading(&self, x: f64, y: f64) -> f64 {
        let raw_heading = y.atan2(x).to_degrees();
        normalize_degrees(raw_heading + self.declination.to_degrees())
    }

    /// Fold one reading into the filter. A failed read leaves the estimate
    /// unchanged.
    pub fn update(&mut self, sample: Result<RawSample, SensorError>) -> f64 {
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => {
                debug!("compass read failed, holding {:.1}°: {}", self.filtered_heading, e);
                return self.filtered_heading;
            }
        };

        let new_heading = self.calculate_heading(sample.x, sample.y);
        let difference = heading_error(new_heading, self.filtered_heading);

        self.filtered_heading = normalize_degrees(self.filtered_heading + self.alpha * difference);
        self.filtered_heading
    }

    /// Pull one sample from `sensor` and return the filtered heading.
    /// Never fails: on a read error the last estimate is returned.
    pub fn get_filtered_heading<S: MagneticSensor>(&mut self, sensor: &mut S) -> f64 {
        let sample = sensor.read_raw();
        self.update(sample)
    }
}

/// Points of a 16-point compass rose, clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompassPoint {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

const ROSE: [CompassPoint; 16] = [
    CompassPoint::N,
    CompassPoint::NNE,
    CompassPoint::NE,
    CompassPoint::ENE,
    CompassPoint::E,
    CompassPoint::ESE,
    CompassPoint::SE,
    CompassPoint::SSE,
    CompassPoint::S,
    CompassPoint::SSW,
    CompassPoint::SW,
    CompassPoint::WSW,
    CompassPoint::W,
    CompassPoint::WNW,
    CompassPoint::NW,
    CompassPoint::NNW,
];

impl CompassPoint {
    /// Nearest rose point to `heading`; each point spans 22.5°.
    pub fn from_heading(heading: f64) -> Self {
        let sector = ((normalize_degrees(heading) + 11.25) / 22.5) as usize;
        ROSE[sector % ROSE.len()]
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NNE => "NNE",
            CompassPoint::NE => "NE",
            CompassPoint::ENE => "ENE",
            CompassPoint::E => "E",
            CompassPoint::ESE => "ESE",
            CompassPoint::SE => "SE",
            CompassPoint::SSE => "SSE",
            CompassPoint::S => "S",
            CompassPoint::SSW => "SSW",
            CompassPoint::SW => "SW",
            CompassPoint::WSW => "WSW",
            CompassPoint::W => "W",
            CompassPoint::WNW => "WNW",
            CompassPoint::NW => "NW",
            CompassPoint::NNW => "NNW",
        }
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}
