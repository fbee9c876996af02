//! Simulated board.
//!
//! Produces slowly drifting, plausible values for every capability so the hub
//! can run end to end on a development host without attached sensors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::{
    Board, DhtMeasurement, DhtModel, HardwareError, I2cBus, OneWireBus, Pull, RomCode,
};
use crate::config::SimulationConfig;

/// I2C addresses answered by the simulated MPU6050.
const MPU6050_ADDRESSES: [u8; 2] = [0x68, 0x69];
const PWR_MGMT_1: usize = 0x6b;
const SLEEP_BIT: u8 = 0x40;
const DATA_START: usize = 0x3b;
const DATA_LEN: usize = 14;

/// DS18B20 family code.
const DS18B20_FAMILY: u8 = 0x28;

struct SimState {
    rng: SmallRng,
    failure_rate: f64,
    onewire_devices: usize,
    analog: HashMap<u8, f64>,
    buses: HashMap<u8, Vec<RomCode>>,
    mpu_registers: HashMap<u8, [u8; 0x80]>,
}

impl SimState {
    fn maybe_fail(&mut self) -> Result<(), HardwareError> {
        if self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate.min(1.0)) {
            return Err(HardwareError::Timeout);
        }
        Ok(())
    }

    fn random_rom(&mut self) -> RomCode {
        let mut bytes = [0u8; 8];
        bytes[0] = DS18B20_FAMILY;
        for byte in bytes.iter_mut().take(7).skip(1) {
            *byte = self.rng.random();
        }
        bytes[7] = dallas_crc8(&bytes[..7]);
        RomCode(bytes)
    }
}

/// Board producing synthetic readings.
#[derive(Clone)]
pub struct SimulatedBoard {
    state: Arc<Mutex<SimState>>,
}

impl std::fmt::Debug for SimulatedBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBoard").finish_non_exhaustive()
    }
}

impl SimulatedBoard {
    /// Create a simulated board from configuration.
    pub fn new(config: &SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Self {
            state: Arc::new(Mutex::new(SimState {
                rng,
                failure_rate: config.failure_rate,
                onewire_devices: config.onewire_devices,
                analog: HashMap::new(),
                buses: HashMap::new(),
                mpu_registers: HashMap::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Board for SimulatedBoard {
    type OneWire = SimOneWire;
    type I2c = SimI2c;

    async fn read_digital(&mut self, pin: u8, pull: Pull) -> Result<bool, HardwareError> {
        let mut state = self.state();
        state.maybe_fail()?;
        let asserted = state.rng.random_bool(0.1);
        trace!(pin, asserted, "sim digital read");
        Ok(match pull {
            Pull::Up => !asserted,
            Pull::Down | Pull::None => asserted,
        })
    }

    async fn read_analog_microvolts(&mut self, pin: u8) -> Result<u32, HardwareError> {
        let mut state = self.state();
        state.maybe_fail()?;
        let start = state.rng.random_range(500_000.0..2_500_000.0);
        let step = state.rng.random_range(-50_000.0..50_000.0);
        let level = state.analog.entry(pin).or_insert(start);
        *level = (*level + step).clamp(0.0, 3_300_000.0);
        Ok(*level as u32)
    }

    async fn measure_dht(
        &mut self,
        model: DhtModel,
        pin: u8,
    ) -> Result<DhtMeasurement, HardwareError> {
        let mut state = self.state();
        state.maybe_fail()?;
        let temperature = 21.0 + state.rng.random_range(-1.5..1.5);
        let humidity = 45.0 + state.rng.random_range(-5.0..5.0);
        trace!(pin, ?model, temperature, humidity, "sim dht measurement");
        Ok(DhtMeasurement {
            temperature,
            humidity,
        })
    }

    fn open_onewire(&mut self, pin: u8) -> Result<Self::OneWire, HardwareError> {
        let mut state = self.state();
        state.maybe_fail()?;
        if !state.buses.contains_key(&pin) {
            let roms = (0..state.onewire_devices)
                .map(|_| state.random_rom())
                .collect();
            state.buses.insert(pin, roms);
        }
        Ok(SimOneWire {
            board: self.clone(),
            pin,
        })
    }

    fn open_i2c(&mut self, scl_pin: u8, sda_pin: u8) -> Result<Self::I2c, HardwareError> {
        let mut state = self.state();
        state.maybe_fail()?;
        for address in MPU6050_ADDRESSES {
            state.mpu_registers.entry(address).or_insert_with(|| {
                let mut file = [0u8; 0x80];
                file[PWR_MGMT_1] = SLEEP_BIT;
                file[0x75] = 0x68; // WHO_AM_I
                file
            });
        }
        trace!(scl_pin, sda_pin, "sim i2c open");
        Ok(SimI2c {
            board: self.clone(),
        })
    }
}

/// 1-Wire handle of a [`SimulatedBoard`].
pub struct SimOneWire {
    board: SimulatedBoard,
    pin: u8,
}

impl OneWireBus for SimOneWire {
    async fn scan(&mut self) -> Result<Vec<RomCode>, HardwareError> {
        let mut state = self.board.state();
        state.maybe_fail()?;
        Ok(state.buses.get(&self.pin).cloned().unwrap_or_default())
    }

    async fn convert_all(&mut self) -> Result<(), HardwareError> {
        self.board.state().maybe_fail()
    }

    async fn read_temperature(&mut self, rom: &RomCode) -> Result<f64, HardwareError> {
        let mut state = self.board.state();
        state.maybe_fail()?;
        // Spread devices a little apart, then quantize to the 12-bit step.
        let base = 17.0 + f64::from(rom.0[1] % 8) * 0.5;
        let raw = base + state.rng.random_range(-0.25..0.25);
        Ok((raw * 16.0).round() / 16.0)
    }
}

/// I2C handle of a [`SimulatedBoard`] with MPU6050 devices attached.
pub struct SimI2c {
    board: SimulatedBoard,
}

impl I2cBus for SimI2c {
    async fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), HardwareError> {
        let mut state = self.board.state();
        state.maybe_fail()?;
        let file = state
            .mpu_registers
            .get_mut(&address)
            .ok_or(HardwareError::Nack(address))?;
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
        let mut state = self.board.state();
        state.maybe_fail()?;
        let awake = state
            .mpu_registers
            .get(&address)
            .map(|file| file[PWR_MGMT_1] & SLEEP_BIT == 0)
            .ok_or(HardwareError::Nack(address))?;

        if awake {
            let sample = mpu_sample(&mut state.rng);
            if let Some(file) = state.mpu_registers.get_mut(&address) {
                file[DATA_START..DATA_START + DATA_LEN].copy_from_slice(&sample);
            }
        }

        let file = state
            .mpu_registers
            .get(&address)
            .ok_or(HardwareError::Nack(address))?;
        let start = register as usize;
        let source = file
            .get(start..start + buf.len())
            .ok_or_else(|| HardwareError::InvalidData(format!("register {register:#04x}")))?;
        buf.copy_from_slice(source);
        Ok(())
    }
}

/// One burst of MPU6050 data registers: a board lying flat, at rest, ~25 °C.
fn mpu_sample(rng: &mut SmallRng) -> [u8; DATA_LEN] {
    let words: [i16; 7] = [
        rng.random_range(-200..200),
        rng.random_range(-200..200),
        16384 + rng.random_range(-300..300),
        -3920 + rng.random_range(-60..60),
        rng.random_range(-150..150),
        rng.random_range(-150..150),
        rng.random_range(-150..150),
    ];
    let mut out = [0u8; DATA_LEN];
    for (chunk, word) in out.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// Dallas/Maxim 1-Wire CRC-8 (polynomial x^8 + x^5 + x^4 + 1).
pub fn dallas_crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8c;
            }
            b >>= 1;
        }
    }
    crc
}
