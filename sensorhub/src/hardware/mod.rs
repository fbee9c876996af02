//! Hardware access boundary.
//!
//! Unit readers never touch registers or pins directly; they go through the
//! [`Board`] trait. Bus handles ([`OneWireBus`], [`I2cBus`]) are opened by a
//! reader for the duration of one unit read and dropped afterwards, so no
//! handle outlives a cycle.
//!
//! Two boards ship with the crate:
//! - [`SimulatedBoard`] produces plausible values on any host.
//! - [`ScriptedBoard`] returns exactly what it is told to and records calls.

pub mod scripted;
pub mod sim;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use scripted::ScriptedBoard;
pub use sim::SimulatedBoard;

/// Errors raised by board implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HardwareError {
    /// The device did not answer in time.
    #[error("device timed out")]
    Timeout,

    /// The device did not acknowledge a bus transaction.
    #[error("no acknowledge from device at address {0:#04x}")]
    Nack(u8),

    /// The board has no driver for the requested capability.
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The device answered with data that failed validation (CRC, range).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HardwareError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Input bias configured on a digital pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    /// Internal pull-up; an asserted input reads low.
    #[default]
    Up,
    /// Internal pull-down; an asserted input reads high.
    Down,
    /// No internal bias.
    None,
}

/// DHT family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

/// One DHT measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtMeasurement {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
}

/// 64-bit 1-Wire ROM code (family byte, 48-bit serial, CRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RomCode(pub [u8; 8]);

impl RomCode {
    /// Lowercase hex rendering, bytes in bus order.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Family code (0x28 for DS18B20).
    pub fn family(&self) -> u8 {
        self.0[0]
    }
}

impl std::fmt::Display for RomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Access to the pins and buses of one board.
///
/// Methods take `&mut self` because the board is exclusively owned by the
/// running cycle.
#[allow(async_fn_in_trait)]
pub trait Board {
    /// 1-Wire bus handle type.
    type OneWire: OneWireBus;
    /// I2C bus handle type.
    type I2c: I2cBus;

    /// Sample a digital input. Returns the electrical level (`true` = high).
    async fn read_digital(&mut self, pin: u8, pull: Pull) -> Result<bool, HardwareError>;

    /// Sample an ADC input, in microvolts.
    async fn read_analog_microvolts(&mut self, pin: u8) -> Result<u32, HardwareError>;

    /// Trigger a DHT measurement and return both values.
    async fn measure_dht(
        &mut self,
        model: DhtModel,
        pin: u8,
    ) -> Result<DhtMeasurement, HardwareError>;

    /// Open the 1-Wire bus on `pin`. Opening an already open bus is allowed.
    fn open_onewire(&mut self, pin: u8) -> Result<Self::OneWire, HardwareError>;

    /// Open an I2C bus on the given pins.
    fn open_i2c(&mut self, scl_pin: u8, sda_pin: u8) -> Result<Self::I2c, HardwareError>;
}

/// A 1-Wire bus with DS18x20 temperature devices.
#[allow(async_fn_in_trait)]
pub trait OneWireBus {
    /// Enumerate device ROM codes present on the bus.
    async fn scan(&mut self) -> Result<Vec<RomCode>, HardwareError>;

    /// Broadcast "convert T" to every device on the bus.
    async fn convert_all(&mut self) -> Result<(), HardwareError>;

    /// Read back the last converted temperature of one device, in °C.
    async fn read_temperature(&mut self, rom: &RomCode) -> Result<f64, HardwareError>;
}

/// An I2C master.
#[allow(async_fn_in_trait)]
pub trait I2cBus {
    /// Write raw bytes to a device.
    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), HardwareError>;

    /// Read consecutive registers starting at `register` into `buf`.
    async fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), HardwareError>;
}
