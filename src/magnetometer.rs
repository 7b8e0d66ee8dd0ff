use log::info;

// Use rppal in production
#[cfg(not(test))]
use rppal::i2c::I2c;

#[cfg(test)]
use crate::mocks::mock_i2c::I2c;

use crate::config::CompassConfig;

// QMC5883L register addresses
const DATA_X_LSB: u8 = 0x00;
const STATUS_REG: u8 = 0x06;
const CONTROL_REG1: u8 = 0x09;
const SET_RESET_PERIOD: u8 = 0x0B;

const STATUS_DRDY: u8 = 0x01;
const STATUS_OVL: u8 = 0x02;

// CONTROL_REG1: continuous mode, ODR 200 Hz, range 8 G, OSR 512
const CONTROL_CONTINUOUS_200HZ_8G: u8 = 0x1D;
// Datasheet recommended SET/RESET period
const SET_RESET_RECOMMENDED: u8 = 0x01;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("magnetometer data not ready")]
    NotReady,

    #[error("magnetometer reading overflowed its range")]
    Overflow,
}

/// One horizontal magnetic field reading, hard iron corrected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
}

/// A source of raw magnetometer samples.
///
/// Failure is reported as an error, never as a zero reading.
pub trait MagneticSensor {
    fn read_raw(&mut self) -> Result<RawSample, SensorError>;
}

/// QMC5883L three-axis magnetometer on the Pi's I2C bus.
pub struct Qmc5883l {
    i2c: I2c,
    x_offset: f64,
    y_offset: f64,
}

impl Qmc5883l {
    pub fn new() -> Result<Self, SensorError> {
        Self::with_config(&CompassConfig::default())
    }

    pub fn with_config(config: &CompassConfig) -> Result<Self, SensorError> {
        let mut i2c = I2c::with_bus(config.i2c_bus)?;
        i2c.set_slave_address(config.address)?;

        i2c.smbus_write_byte(SET_RESET_PERIOD, SET_RESET_RECOMMENDED)?;
        i2c.smbus_write_byte(CONTROL_REG1, CONTROL_CONTINUOUS_200HZ_8G)?;

        info!(
            "Compass (QMC5883L) initialized on bus {} at 0x{:02X}",
            config.i2c_bus, config.address
        );
        Ok(Self {
            i2c,
            x_offset: config.x_offset,
            y_offset: config.y_offset,
        })
    }

    /// Uncorrected X/Y counts, for calibration.
    pub fn read_uncorrected(&mut self) -> Result<(f64, f64), SensorError> {
        let status = self.i2c.smbus_read_byte(STATUS_REG)?;
        if status & STATUS_DRDY == 0 {
            return Err(SensorError::NotReady);
        }
        if status & STATUS_OVL != 0 {
            return Err(SensorError::Overflow);
        }

        // X, Y, Z as little endian i16, auto-incremented from DATA_X_LSB
        let mut data = [0u8; 6];
        self.i2c.write_read(&[DATA_X_LSB], &mut data)?;

        let x = i16::from_le_bytes([data[0], data[1]]) as f64;
        let y = i16::from_le_bytes([data[2], data[3]]) as f64;

        Ok((x, y))
    }
}

impl MagneticSensor for Qmc5883l {
    fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        let (x, y) = self.read_uncorrected()?;
        Ok(RawSample {
            x: x - self.x_offset,
            y: y - self.y_offset,
        })
    }
}
