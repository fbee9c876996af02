//! A board that replays scripted values.
//!
//! Clones share one script, so a test can keep a handle, hand the board to a
//! dispatcher, and still flip inputs or inspect recorded calls between cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    Board, DhtMeasurement, DhtModel, HardwareError, I2cBus, OneWireBus, Pull, RomCode,
};

/// Size of the emulated register file per I2C device.
const I2C_REGISTERS: usize = 0x80;

#[derive(Debug, Default)]
struct Script {
    digital: HashMap<u8, bool>,
    analog: HashMap<u8, u32>,
    dht: HashMap<u8, DhtMeasurement>,
    onewire: HashMap<u8, Vec<(RomCode, f64)>>,
    i2c: HashMap<u8, [u8; I2C_REGISTERS]>,
    faults: HashMap<u8, HardwareError>,
    converted: HashMap<u8, bool>,
    calls: Vec<String>,
}

/// Board double driven by explicit values.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBoard {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBoard {
    /// Create an empty board; every pin is unwired until scripted.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the electrical level seen on a digital pin.
    pub fn set_digital(&self, pin: u8, level: bool) {
        self.script().digital.insert(pin, level);
    }

    /// Set the microvolt value seen on an ADC pin.
    pub fn set_analog(&self, pin: u8, microvolts: u32) {
        self.script().analog.insert(pin, microvolts);
    }

    /// Attach a DHT sensor to a pin.
    pub fn set_dht(&self, pin: u8, temperature: f64, humidity: f64) {
        self.script().dht.insert(
            pin,
            DhtMeasurement {
                temperature,
                humidity,
            },
        );
    }

    /// Populate the 1-Wire bus on a pin with devices and their temperatures.
    pub fn set_onewire(&self, pin: u8, devices: Vec<(RomCode, f64)>) {
        self.script().onewire.insert(pin, devices);
    }

    /// Attach an I2C device and preload registers starting at `register`.
    pub fn set_i2c_registers(&self, address: u8, register: u8, bytes: &[u8]) {
        let mut script = self.script();
        let file = script.i2c.entry(address).or_insert([0; I2C_REGISTERS]);
        for (offset, byte) in bytes.iter().enumerate() {
            if let Some(slot) = file.get_mut(register as usize + offset) {
                *slot = *byte;
            }
        }
    }

    /// Make every access through `pin` fail with `error`.
    pub fn fail_pin(&self, pin: u8, error: HardwareError) {
        self.script().faults.insert(pin, error);
    }

    /// Remove a fault injected with [`fail_pin`](Self::fail_pin).
    pub fn heal_pin(&self, pin: u8) {
        self.script().faults.remove(&pin);
    }

    /// Read one register of an attached I2C device.
    pub fn i2c_register(&self, address: u8, register: u8) -> Option<u8> {
        self.script()
            .i2c
            .get(&address)
            .and_then(|file| file.get(register as usize).copied())
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    fn enter(&self, pin: u8, call: String) -> Result<MutexGuard<'_, Script>, HardwareError> {
        let mut script = self.script();
        script.calls.push(call);
        if let Some(err) = script.faults.get(&pin).cloned() {
            return Err(err);
        }
        Ok(script)
    }
}

impl Board for ScriptedBoard {
    type OneWire = ScriptedOneWire;
    type I2c = ScriptedI2c;

    async fn read_digital(&mut self, pin: u8, pull: Pull) -> Result<bool, HardwareError> {
        let script = self.enter(pin, format!("digital:{pin}:{pull:?}"))?;
        script
            .digital
            .get(&pin)
            .copied()
            .ok_or_else(|| HardwareError::Unavailable(format!("digital pin {pin}")))
    }

    async fn read_analog_microvolts(&mut self, pin: u8) -> Result<u32, HardwareError> {
        let script = self.enter(pin, format!("analog:{pin}"))?;
        script
            .analog
            .get(&pin)
            .copied()
            .ok_or_else(|| HardwareError::Unavailable(format!("adc pin {pin}")))
    }

    async fn measure_dht(
        &mut self,
        model: DhtModel,
        pin: u8,
    ) -> Result<DhtMeasurement, HardwareError> {
        let script = self.enter(pin, format!("dht:{pin}:{model:?}"))?;
        script.dht.get(&pin).copied().ok_or(HardwareError::Timeout)
    }

    fn open_onewire(&mut self, pin: u8) -> Result<Self::OneWire, HardwareError> {
        drop(self.enter(pin, format!("onewire:open:{pin}"))?);
        Ok(ScriptedOneWire {
            board: self.clone(),
            pin,
        })
    }

    fn open_i2c(&mut self, scl_pin: u8, sda_pin: u8) -> Result<Self::I2c, HardwareError> {
        drop(self.enter(scl_pin, format!("i2c:open:{scl_pin}:{sda_pin}"))?);
        drop(self.enter(sda_pin, format!("i2c:pin:{sda_pin}"))?);
        Ok(ScriptedI2c {
            board: self.clone(),
            scl_pin,
        })
    }
}

/// 1-Wire handle of a [`ScriptedBoard`].
#[derive(Debug)]
pub struct ScriptedOneWire {
    board: ScriptedBoard,
    pin: u8,
}

impl OneWireBus for ScriptedOneWire {
    async fn scan(&mut self) -> Result<Vec<RomCode>, HardwareError> {
        let pin = self.pin;
        let script = self.board.enter(pin, format!("onewire:scan:{pin}"))?;
        Ok(script
            .onewire
            .get(&pin)
            .map(|devices| devices.iter().map(|(rom, _)| *rom).collect())
            .unwrap_or_default())
    }

    async fn convert_all(&mut self) -> Result<(), HardwareError> {
        let pin = self.pin;
        let mut script = self.board.enter(pin, format!("onewire:convert:{pin}"))?;
        script.converted.insert(pin, true);
        Ok(())
    }

    async fn read_temperature(&mut self, rom: &RomCode) -> Result<f64, HardwareError> {
        let pin = self.pin;
        let script = self.board.enter(pin, format!("onewire:read:{pin}:{rom}"))?;
        if !script.converted.get(&pin).copied().unwrap_or(false) {
            return Err(HardwareError::InvalidData(
                "read before conversion".to_string(),
            ));
        }
        script
            .onewire
            .get(&pin)
            .and_then(|devices| devices.iter().find(|(r, _)| r == rom))
            .map(|(_, temp)| *temp)
            .ok_or(HardwareError::Timeout)
    }
}

/// I2C handle of a [`ScriptedBoard`].
#[derive(Debug)]
pub struct ScriptedI2c {
    board: ScriptedBoard,
    scl_pin: u8,
}

impl I2cBus for ScriptedI2c {
    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), HardwareError> {
        let mut script = self
            .board
            .enter(self.scl_pin, format!("i2c:write:{address:#04x}:{bytes:02x?}"))?;
        let file = script
            .i2c
            .get_mut(&address)
            .ok_or(HardwareError::Nack(address))?;
        // First byte selects the register, the rest are written sequentially.
        if let Some((register, data)) = bytes.split_first() {
            for (offset, byte) in data.iter().enumerate() {
                if let Some(slot) = file.get_mut(*register as usize + offset) {
                    *slot = *byte;
                }
            }
        }
        Ok(())
    }

    async fn read_registers(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), HardwareError> {
        let script = self
            .board
            .enter(self.scl_pin, format!("i2c:read:{address:#04x}:{register:#04x}"))?;
        let file = script
            .i2c
            .get(&address)
            .ok_or(HardwareError::Nack(address))?;
        let start = register as usize;
        let end = start + buf.len();
        let source = file
            .get(start..end)
            .ok_or_else(|| HardwareError::InvalidData(format!("register {register:#04x}")))?;
        buf.copy_from_slice(source);
        Ok(())
    }
}
