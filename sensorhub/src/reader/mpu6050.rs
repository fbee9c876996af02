//! GY-521 breakout (MPU6050 accelerometer and gyroscope) on I2C.

use sensorhub_common::Reading;

use super::{ReadError, reading, round2};
use crate::hardware::{Board, I2cBus};
use crate::registry::{SensorDescriptor, Wiring};

const PWR_MGMT_1: u8 = 0x6b;
const ACCEL_XOUT_H: u8 = 0x3b;
const BURST_LEN: usize = 14;

/// LSB per g at the default ±2 g range.
const ACCEL_SCALE: f64 = 16384.0;
/// LSB per °/s at the default ±250 °/s range.
const GYRO_SCALE: f64 = 131.0;

/// Channel names in register order.
pub const MOTION_CHANNELS: [&str; 7] = [
    "accel_x", "accel_y", "accel_z", "temp", "gyro_x", "gyro_y", "gyro_z",
];

/// One converted burst of motion data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// g
    pub accel: [f64; 3],
    /// °C
    pub temp: f64,
    /// °/s
    pub gyro: [f64; 3],
}

impl MotionSample {
    /// Convert the 14 data registers starting at ACCEL_XOUT_H.
    pub fn from_registers(raw: &[u8; BURST_LEN]) -> Self {
        let word = |i: usize| f64::from(i16::from_be_bytes([raw[2 * i], raw[2 * i + 1]]));
        Self {
            accel: [word(0) / ACCEL_SCALE, word(1) / ACCEL_SCALE, word(2) / ACCEL_SCALE],
            temp: word(3) / 340.0 + 36.53,
            gyro: [word(4) / GYRO_SCALE, word(5) / GYRO_SCALE, word(6) / GYRO_SCALE],
        }
    }

    /// Values paired with [`MOTION_CHANNELS`], in the same order.
    pub fn channels(&self) -> [(&'static str, f64); 7] {
        let values = [
            self.accel[0],
            self.accel[1],
            self.accel[2],
            self.temp,
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
        ];
        let mut out = [("", 0.0); 7];
        for (slot, (name, value)) in out.iter_mut().zip(MOTION_CHANNELS.into_iter().zip(values)) {
            *slot = (name, value);
        }
        out
    }
}

pub(super) fn check(desc: &SensorDescriptor) -> Result<(), String> {
    if !matches!(desc.wiring, Wiring::I2c { .. }) {
        return Err("needs 'scl_pin' and 'sda_pin'".to_string());
    }
    for (name, spec) in &desc.provides {
        if !MOTION_CHANNELS.contains(&name.as_str()) {
            return Err(format!(
                "unknown measurement '{name}' (expected one of {})",
                MOTION_CHANNELS.join(", ")
            ));
        }
        if spec.fixed_id().is_none() {
            return Err(format!("measurement '{name}' needs a fixed 'id'"));
        }
    }
    Ok(())
}

pub(super) async fn read<B: Board>(
    board: &mut B,
    desc: &SensorDescriptor,
) -> Result<Vec<Reading>, ReadError> {
    let Wiring::I2c {
        scl_pin,
        sda_pin,
        address,
    } = desc.wiring
    else {
        return Err(ReadError::Wiring("expected I2C wiring".to_string()));
    };

    let mut bus = board.open_i2c(scl_pin, sda_pin)?;
    bus.write(address, &[PWR_MGMT_1, 0x00]).await?;

    let mut raw = [0u8; BURST_LEN];
    bus.read_registers(address, ACCEL_XOUT_H, &mut raw).await?;
    let sample = MotionSample::from_registers(&raw);

    Ok(sample
        .channels()
        .into_iter()
        .filter_map(|(name, value)| {
            let spec = desc.measurement(name)?;
            let id = spec.fixed_id()?;
            Some(reading(desc, id, round2(value), &spec.unit))
        })
        .collect())
}
