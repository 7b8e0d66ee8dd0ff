// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;

use rppal::i2c::{Error, Result};

#[derive(Default)]
struct Bus {
    registers: HashMap<u8, u8>,
    writes: Vec<(u8, u8)>,
    faulty: bool,
}

thread_local! {
    static MOCK_BUS: RefCell<Bus> = RefCell::new(Bus::default());
}

fn bus_fault() -> Error {
    Error::Io(io::Error::other("mock I2C bus fault"))
}

pub struct I2c {
    address: u16,
}

impl I2c {
    pub fn with_bus(_bus: u8) -> Result<Self> {
        Ok(I2c { address: 0 })
    }

    pub fn set_slave_address(&mut self, address: u16) -> Result<()> {
        self.address = address;
        Ok(())
    }

    pub fn smbus_write_byte(&self, command: u8, value: u8) -> Result<()> {
        MOCK_BUS.with(|bus| {
            let mut bus = bus.borrow_mut();
            if bus.faulty {
                return Err(bus_fault());
            }
            bus.writes.push((command, value));
            bus.registers.insert(command, value);
            Ok(())
        })
    }

    pub fn smbus_read_byte(&self, command: u8) -> Result<u8> {
        MOCK_BUS.with(|bus| {
            let bus = bus.borrow();
            if bus.faulty {
                return Err(bus_fault());
            }
            Ok(*bus.registers.get(&command).unwrap_or(&0))
        })
    }

    /// Auto-incrementing read starting at the register in `write_buffer[0]`.
    pub fn write_read(&self, write_buffer: &[u8], read_buffer: &mut [u8]) -> Result<()> {
        let start = write_buffer.first().copied().unwrap_or(0);
        MOCK_BUS.with(|bus| {
            let bus = bus.borrow();
            if bus.faulty {
                return Err(bus_fault());
            }
            for (i, byte) in read_buffer.iter_mut().enumerate() {
                let register = start.wrapping_add(i as u8);
                *byte = *bus.registers.get(&register).unwrap_or(&0);
            }
            Ok(())
        })
    }
}

// test helper to preload a register
pub fn set_mock_register(register: u8, value: u8) {
    MOCK_BUS.with(|bus| {
        bus.borrow_mut().registers.insert(register, value);
    });
}

// test helper to make every transaction fail
pub fn set_mock_bus_fault(faulty: bool) {
    MOCK_BUS.with(|bus| bus.borrow_mut().faulty = faulty);
}

// test helper returning every (register, value) written so far
pub fn get_mock_writes() -> Vec<(u8, u8)> {
    MOCK_BUS.with(|bus| bus.borrow().writes.clone())
}

// test helper to reset the bus
pub fn reset_mock_bus() {
    MOCK_BUS.with(|bus| {
        *bus.borrow_mut() = Bus::default();
    });
}
