//! Per-kind unit readers.
//!
//! Each supported [`SensorKind`] maps to exactly one [`UnitReader`] variant.
//! A reader turns one descriptor plus the current hardware state into zero or
//! more [`Reading`]s, and reports failures as a [`ReadError`] instead of
//! panicking or aborting the cycle.

mod analog;
mod dht;
mod digital;
mod ds18b20;
mod mpu6050;

use std::time::Duration;

use thiserror::Error;

use sensorhub_common::{Reading, ReadingValue, SensorKind};

use crate::hardware::{Board, DhtModel, HardwareError};
use crate::registry::{MeasurementSpec, SensorDescriptor, Wiring};

pub use ds18b20::{CONVERSION_TIME, device_ids};
pub use mpu6050::{MOTION_CHANNELS, MotionSample};

/// Failure of one unit read.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReadError {
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("no '{0}' measurement configured")]
    MissingMeasurement(String),

    #[error("wiring does not fit this kind: {0}")]
    Wiring(String),

    #[error("unit read timed out after {0:?}")]
    Timeout(Duration),
}

/// Acquisition strategy for a family of sensor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitReader {
    /// One digital input, one boolean reading.
    Digital,
    /// One ADC input, one integer reading.
    Analog,
    /// One DHT measurement, temperature and humidity readings.
    Dual(DhtModel),
    /// 1-Wire bus scan, one reading per discovered device.
    BusScan,
    /// MPU6050 burst read, one reading per configured channel.
    Motion,
}

impl UnitReader {
    /// Reader for a kind, or `None` if the kind is unsupported.
    pub fn for_kind(kind: &SensorKind) -> Option<Self> {
        match kind {
            SensorKind::Button => Some(Self::Digital),
            SensorKind::Ldr | SensorKind::SoilMoisture => Some(Self::Analog),
            SensorKind::Dht11 => Some(Self::Dual(DhtModel::Dht11)),
            SensorKind::Dht22 => Some(Self::Dual(DhtModel::Dht22)),
            SensorKind::Ds18b20 => Some(Self::BusScan),
            SensorKind::Gy521 => Some(Self::Motion),
            SensorKind::Unsupported(_) => None,
        }
    }

    /// Check that a descriptor has the wiring and measurements this reader needs.
    pub fn check(&self, desc: &SensorDescriptor) -> Result<(), String> {
        match self {
            Self::Digital | Self::Analog => {
                require_pin(desc)?;
                match desc.single_measurement() {
                    Some((_, spec)) if spec.fixed_id().is_some() => Ok(()),
                    Some((name, _)) => Err(format!("measurement '{name}' needs a fixed 'id'")),
                    None => Err("exactly one measurement must be configured".to_string()),
                }
            }
            Self::Dual(_) => dht::check(desc),
            Self::BusScan => ds18b20::check(desc),
            Self::Motion => mpu6050::check(desc),
        }
    }

    /// Acquire readings for one descriptor.
    pub async fn read<B: Board>(
        &self,
        board: &mut B,
        desc: &SensorDescriptor,
    ) -> Result<Vec<Reading>, ReadError> {
        match self {
            Self::Digital => digital::read(board, desc).await,
            Self::Analog => analog::read(board, desc).await,
            Self::Dual(model) => dht::read(board, desc, *model).await,
            Self::BusScan => ds18b20::read(board, desc).await,
            Self::Motion => mpu6050::read(board, desc).await,
        }
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// NaN and infinities have no wire encoding.
fn finite(name: &str, value: f64) -> Result<f64, ReadError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(HardwareError::InvalidData(format!("{name} is {value}")).into())
    }
}

fn require_pin(desc: &SensorDescriptor) -> Result<u8, String> {
    match desc.wiring {
        Wiring::Pin(pin) => Ok(pin),
        Wiring::I2c { .. } => Err("expected a single 'pin', found I2C wiring".to_string()),
        Wiring::Unwired => Err("missing 'pin'".to_string()),
    }
}

fn pin(desc: &SensorDescriptor) -> Result<u8, ReadError> {
    require_pin(desc).map_err(ReadError::Wiring)
}

/// The single fixed-id measurement of a one-value unit.
fn single_fixed(desc: &SensorDescriptor) -> Result<(&str, &MeasurementSpec), ReadError> {
    desc.single_measurement()
        .and_then(|(_, spec)| spec.fixed_id().map(|id| (id, spec)))
        .ok_or_else(|| ReadError::MissingMeasurement("fixed id".to_string()))
}

/// Build a reading carrying the descriptor's location and activation flag.
fn reading(
    desc: &SensorDescriptor,
    id: impl Into<String>,
    value: impl Into<ReadingValue>,
    unit: &str,
) -> Reading {
    Reading::new(
        desc.kind.clone(),
        id,
        value,
        unit,
        desc.location.clone(),
        desc.active,
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_kind_has_a_reader() {
        for kind in SensorKind::SUPPORTED {
            assert!(UnitReader::for_kind(&kind).is_some(), "{kind} has no reader");
        }
        assert_eq!(
            UnitReader::for_kind(&SensorKind::Unsupported("BME280".into())),
            None
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.98765), 0.99);
        assert_eq!(round2(-1.234), -1.23);
        assert_eq!(round2(36.53), 36.53);
    }
}
