use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;

// ** HEADING PID CONFIGURATION ** //
pub const KP_DIR: f64 = 2.0; // Proportional gain
pub const KI_DIR: f64 = 0.1; // Integral gain
pub const KD_DIR: f64 = 0.2; // Derivative gain
/// Heading correction limits, in motor speed units.
pub const HEADING_OUTPUT_MIN: f64 = -50.0;
pub const HEADING_OUTPUT_MAX: f64 = 50.0;

// ** MOTOR CONFIGURATION ** //
/// Base speeds differ per side to compensate for mismatched motors.
pub const BASE_SPEED_LEFT: f64 = 180.0;
pub const BASE_SPEED_RIGHT: f64 = 190.0;
pub const MIN_SPEED: f64 = 30.0;
pub const MAX_SPEED: f64 = 255.0;
pub const MOTOR_PWM_FREQUENCY_HZ: f64 = 1000.0;
/// L298N direction inputs (BCM numbering). ENA/ENB use hardware PWM0/PWM1
/// on GPIO 18/19.
pub const MOTOR_IN1_PIN: u8 = 17;
pub const MOTOR_IN2_PIN: u8 = 27;
pub const MOTOR_IN3_PIN: u8 = 22;
pub const MOTOR_IN4_PIN: u8 = 23;

// ** COMPASS CONFIGURATION ** //
pub const COMPASS_I2C_BUS: u8 = 1;
pub const QMC5883L_ADDR: u16 = 0x0D;
/// Low-pass smoothing factor, 0 < alpha <= 1.
pub const HEADING_ALPHA: f64 = 0.6;
/// Local magnetic declination (radians).
pub const DECLINATION_RAD: f64 = 0.0404;

// ** NAVIGATION CONFIGURATION ** //
pub const ARRIVAL_RADIUS_M: f64 = 2.0;
pub const MIN_FIX_SATELLITES: u32 = 4;
/// A fix with no GGA for this long is treated as lost.
pub const MAX_FIX_AGE_MS: u64 = 2000;
pub const LOOP_INTERVAL_MS: u64 = 50;
/// 50ms * 20 = one telemetry report per second.
pub const TELEMETRY_EVERY_TICKS: u32 = 20;

// ** SERIAL CONFIGURATION ** //
pub const GPS_DEVICE: &str = "/dev/serial0";
pub const LINK_DEVICE: &str = "/dev/rfcomm0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: KP_DIR,
            ki: KI_DIR,
            kd: KD_DIR,
            output_min: HEADING_OUTPUT_MIN,
            output_max: HEADING_OUTPUT_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub base_speed_left: f64,
    pub base_speed_right: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub pwm_frequency_hz: f64,
    pub in1_pin: u8,
    pub in2_pin: u8,
    pub in3_pin: u8,
    pub in4_pin: u8,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_speed_left: BASE_SPEED_LEFT,
            base_speed_right: BASE_SPEED_RIGHT,
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            pwm_frequency_hz: MOTOR_PWM_FREQUENCY_HZ,
            in1_pin: MOTOR_IN1_PIN,
            in2_pin: MOTOR_IN2_PIN,
            in3_pin: MOTOR_IN3_PIN,
            in4_pin: MOTOR_IN4_PIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    pub i2c_bus: u8,
    pub address: u16,
    pub alpha: f64,
    pub declination_rad: f64,
    /// Hard iron correction, (X_min + X_max) / 2 from the calibrate tool.
    pub x_offset: f64,
    /// Hard iron correction, (Y_min + Y_max) / 2 from the calibrate tool.
    pub y_offset: f64,
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            i2c_bus: COMPASS_I2C_BUS,
            address: QMC5883L_ADDR,
            alpha: HEADING_ALPHA,
            declination_rad: DECLINATION_RAD,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub arrival_radius_m: f64,
    pub min_satellites: u32,
    pub max_fix_age_ms: u64,
    pub loop_interval_ms: u64,
    pub telemetry_every_ticks: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: ARRIVAL_RADIUS_M,
            min_satellites: MIN_FIX_SATELLITES,
            max_fix_age_ms: MAX_FIX_AGE_MS,
            loop_interval_ms: LOOP_INTERVAL_MS,
            telemetry_every_ticks: TELEMETRY_EVERY_TICKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub gps_device: PathBuf,
    pub link_device: PathBuf,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            gps_device: PathBuf::from(GPS_DEVICE),
            link_device: PathBuf::from(LINK_DEVICE),
        }
    }
}

/// Runtime configuration. Every field is optional in the TOML file and
/// falls back to the constants above.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub heading_pid: PidConfig,
    pub drive: DriveConfig,
    pub compass: CompassConfig,
    pub navigation: NavigationConfig,
    pub serial: SerialConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `path`, falling back to the built-in defaults if it is missing
    /// or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pid = &self.heading_pid;
        if !(pid.output_min <= pid.output_max) {
            return Err(invalid(format!(
                "heading_pid output_min {} exceeds output_max {}",
                pid.output_min, pid.output_max
            )));
        }

        let drive = &self.drive;
        if !(drive.min_speed <= drive.max_speed) {
            return Err(invalid(format!(
                "drive min_speed {} exceeds max_speed {}",
                drive.min_speed, drive.max_speed
            )));
        }
        if drive.min_speed < -255.0 || drive.max_speed > 255.0 {
            return Err(invalid("drive speeds must lie within -255..=255"));
        }
        if !(drive.pwm_frequency_hz > 0.0) {
            return Err(invalid("drive pwm_frequency_hz must be positive"));
        }

        let alpha = self.compass.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(invalid(format!("compass alpha {} outside (0, 1]", alpha)));
        }

        let nav = &self.navigation;
        if !(nav.arrival_radius_m > 0.0) {
            return Err(invalid("navigation arrival_radius_m must be positive"));
        }
        if nav.max_fix_age_ms == 0 {
            return Err(invalid("navigation max_fix_age_ms must be non-zero"));
        }
        if nav.loop_interval_ms == 0 {
            return Err(invalid("navigation loop_interval_ms must be non-zero"));
        }
        if nav.telemetry_every_ticks == 0 {
            return Err(invalid("navigation telemetry_every_ticks must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
