use log::debug;

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, OutputPin};
#[cfg(not(test))]
use rppal::pwm::{Channel, Polarity, Pwm};

// Mock GPIO/PWM for testing
#[cfg(test)]
use crate::mocks::mock_gpio::{Gpio, OutputPin};
#[cfg(test)]
use crate::mocks::mock_pwm::{Channel, Polarity, Pwm};

use crate::config::DriveConfig;

/// Full-scale motor speed; maps to a 100% duty cycle.
pub const FULL_SPEED: u8 = 255;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("PWM error: {0}")]
    Pwm(#[from] rppal::pwm::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    Stopped,
}

/// Direction plus magnitude for one side of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelCommand {
    pub direction: Direction,
    pub speed: u8,
}

impl WheelCommand {
    pub const STOPPED: WheelCommand = WheelCommand {
        direction: Direction::Stopped,
        speed: 0,
    };

    /// Positive speeds drive forward, negative reverse. The magnitude is
    /// rounded and saturated at [`FULL_SPEED`].
    pub fn from_signed(speed: f64) -> Self {
        if !speed.is_finite() {
            return Self::STOPPED;
        }
        let magnitude = speed.abs().round().min(FULL_SPEED as f64) as u8;
        let direction = match magnitude {
            0 => Direction::Stopped,
            _ if speed > 0.0 => Direction::Forward,
            _ => Direction::Reverse,
        };
        Self {
            direction,
            speed: magnitude,
        }
    }

    pub fn duty_cycle(&self) -> f64 {
        match self.direction {
            Direction::Stopped => 0.0,
            _ => self.speed as f64 / FULL_SPEED as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCommand {
    pub left: WheelCommand,
    pub right: WheelCommand,
}

impl DriveCommand {
    pub const STOP: DriveCommand = DriveCommand {
        left: WheelCommand::STOPPED,
        right: WheelCommand::STOPPED,
    };

    pub fn from_speeds(left: f64, right: f64) -> Self {
        Self {
            left: WheelCommand::from_signed(left),
            right: WheelCommand::from_signed(right),
        }
    }
}

/// Actuation sink for the two drive motors.
pub trait MotorDriver {
    fn apply(&mut self, command: DriveCommand) -> Result<(), DriveError>;

    fn stop_all(&mut self) -> Result<(), DriveError> {
        self.apply(DriveCommand::STOP)
    }
}

/// One H-bridge channel: two direction inputs and a PWM enable.
struct Bridge {
    enable: Pwm,
    forward: OutputPin,
    reverse: OutputPin,
}

impl Bridge {
    fn set(&mut self, command: WheelCommand) -> Result<(), DriveError> {
        match command.direction {
            Direction::Forward => {
                self.reverse.set_low();
                self.forward.set_high();
            }
            Direction::Reverse => {
                self.forward.set_low();
                self.reverse.set_high();
            }
            Direction::Stopped => {
                self.forward.set_low();
                self.reverse.set_low();
            }
        }
        self.enable.set_duty_cycle(command.duty_cycle())?;
        Ok(())
    }
}

/// L298N dual H-bridge. ENA/ENB are driven by hardware PWM0 (GPIO 18) and
/// PWM1 (GPIO 19); IN1..IN4 are plain outputs.
pub struct L298n {
    left: Bridge,
    right: Bridge,
}

impl L298n {
    pub fn new() -> Result<Self, DriveError> {
        Self::with_config(&DriveConfig::default())
    }

    pub fn with_config(config: &DriveConfig) -> Result<Self, DriveError> {
        let gpio = Gpio::new()?;
        let frequency = config.pwm_frequency_hz;

        let left = Bridge {
            enable: Pwm::with_frequency(Channel::Pwm0, frequency, 0.0, Polarity::Normal, true)?,
            forward: gpio.get(config.in1_pin)?.into_output_low(),
            reverse: gpio.get(config.in2_pin)?.into_output_low(),
        };
        let right = Bridge {
            enable: Pwm::with_frequency(Channel::Pwm1, frequency, 0.0, Polarity::Normal, true)?,
            forward: gpio.get(config.in3_pin)?.into_output_low(),
            reverse: gpio.get(config.in4_pin)?.into_output_low(),
        };

        Ok(Self { left, right })
    }

    /// Disable PWM output
    pub fn disable(&mut self) -> Result<(), DriveError> {
        self.left.enable.disable()?;
        self.right.enable.disable()?;
        Ok(())
    }
}

impl MotorDriver for L298n {
    fn apply(&mut self, command: DriveCommand) -> Result<(), DriveError> {
        debug!(
            "Drive L={:?}/{} R={:?}/{}",
            command.left.direction, command.left.speed, command.right.direction, command.right.speed
        );
        self.left.set(command.left)?;
        self.right.set(command.right)?;
        Ok(())
    }
}

impl Drop for L298n {
    fn drop(&mut self) {
        // Ensure the motors are released when dropped
        let _ = self.stop_all();
        let _ = self.disable();
    }
}
