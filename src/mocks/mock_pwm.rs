// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;

use rppal::pwm::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pwm0,
    Pwm1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelState {
    duty_cycle: f64,
    enabled: bool,
}

thread_local! {
    static MOCK_PWM: RefCell<HashMap<Channel, ChannelState>> = RefCell::new(HashMap::new());
}

pub struct Pwm {
    channel: Channel,
}

impl Pwm {
    pub fn with_frequency(
        channel: Channel,
        _frequency: f64,
        duty_cycle: f64,
        _polarity: Polarity,
        enabled: bool,
    ) -> Result<Self> {
        MOCK_PWM.with(|pwm| {
            pwm.borrow_mut().insert(
                channel,
                ChannelState {
                    duty_cycle,
                    enabled,
                },
            );
        });
        Ok(Pwm { channel })
    }

    pub fn set_duty_cycle(&self, duty_cycle: f64) -> Result<()> {
        MOCK_PWM.with(|pwm| {
            if let Some(state) = pwm.borrow_mut().get_mut(&self.channel) {
                state.duty_cycle = duty_cycle;
            }
        });
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        MOCK_PWM.with(|pwm| {
            if let Some(state) = pwm.borrow_mut().get_mut(&self.channel) {
                state.enabled = false;
            }
        });
        Ok(())
    }
}

// Test helper
pub fn get_mock_duty_cycle(channel: Channel) -> Option<f64> {
    MOCK_PWM.with(|pwm| pwm.borrow().get(&channel).map(|state| state.duty_cycle))
}

// Test helper
pub fn is_mock_enabled(channel: Channel) -> bool {
    MOCK_PWM.with(|pwm| pwm.borrow().get(&channel).is_some_and(|state| state.enabled))
}

// Test helper
pub fn reset_mock_pwm() {
    MOCK_PWM.with(|pwm| pwm.borrow_mut().clear());
}
