//! Sensor descriptor registry.
//!
//! Descriptors are parsed from configuration into typed records, checked once
//! at startup, and then held in an immutable ordered registry for the life of
//! the process.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use sensorhub_common::SensorKind;

use crate::hardware::Pull;
use crate::reader::UnitReader;

/// Default I2C address of an MPU6050 with AD0 tied low.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x68;

/// How one measurement is identified on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// One physical channel with a fixed identifier.
    Fixed(String),
    /// Bus-scanned devices; the identifier is this prefix plus a device suffix.
    Prefix(String),
}

/// Identifier and unit for one named measurement of a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawMeasurementSpec")]
pub struct MeasurementSpec {
    pub channel: Channel,
    /// Engineering unit label; descriptive only.
    pub unit: String,
}

impl MeasurementSpec {
    /// Spec with a fixed id.
    pub fn fixed(id: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            channel: Channel::Fixed(id.into()),
            unit: unit.into(),
        }
    }

    /// Spec with an id prefix.
    pub fn prefixed(id_prefix: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            channel: Channel::Prefix(id_prefix.into()),
            unit: unit.into(),
        }
    }

    pub fn fixed_id(&self) -> Option<&str> {
        match &self.channel {
            Channel::Fixed(id) => Some(id),
            Channel::Prefix(_) => None,
        }
    }

    pub fn id_prefix(&self) -> Option<&str> {
        match &self.channel {
            Channel::Prefix(prefix) => Some(prefix),
            Channel::Fixed(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawMeasurementSpec {
    id: Option<String>,
    id_prefix: Option<String>,
    unit: String,
}

impl TryFrom<RawMeasurementSpec> for MeasurementSpec {
    type Error = String;

    fn try_from(raw: RawMeasurementSpec) -> Result<Self, Self::Error> {
        let channel = match (raw.id, raw.id_prefix) {
            (Some(id), None) if !id.is_empty() => Channel::Fixed(id),
            (None, Some(prefix)) if !prefix.is_empty() => Channel::Prefix(prefix),
            (Some(_), Some(_)) => {
                return Err("measurement must have either 'id' or 'id_prefix', not both".into());
            }
            _ => return Err("measurement needs a non-empty 'id' or 'id_prefix'".into()),
        };
        Ok(Self {
            channel,
            unit: raw.unit,
        })
    }
}

/// Physical connection of a sensor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// A single GPIO/ADC pin.
    Pin(u8),
    /// An I2C bus and the device address on it.
    I2c { scl_pin: u8, sda_pin: u8, address: u8 },
    /// No wiring given (only acceptable for unsupported kinds).
    Unwired,
}

/// One configured sensor unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct SensorDescriptor {
    /// Unique key.
    pub name: String,
    pub kind: SensorKind,
    pub wiring: Wiring,
    /// Input bias for digital kinds.
    pub pull: Pull,
    pub location: String,
    /// Inactive units are skipped entirely.
    pub active: bool,
    /// Measurement name to spec.
    pub provides: HashMap<String, MeasurementSpec>,
}

impl SensorDescriptor {
    /// Look up a measurement spec by name.
    pub fn measurement(&self, name: &str) -> Option<&MeasurementSpec> {
        self.provides.get(name)
    }

    /// The only measurement of a single-value unit.
    pub fn single_measurement(&self) -> Option<(&str, &MeasurementSpec)> {
        let mut iter = self.provides.iter();
        match (iter.next(), iter.next()) {
            (Some((name, spec)), None) => Some((name.as_str(), spec)),
            _ => None,
        }
    }

    fn fixed_ids(&self) -> impl Iterator<Item = &str> {
        self.provides.values().filter_map(MeasurementSpec::fixed_id)
    }

    fn id_prefixes(&self) -> impl Iterator<Item = &str> {
        self.provides.values().filter_map(MeasurementSpec::id_prefix)
    }
}

#[derive(Deserialize)]
struct RawDescriptor {
    name: String,
    kind: SensorKind,
    pin: Option<u8>,
    scl_pin: Option<u8>,
    sda_pin: Option<u8>,
    i2c_address: Option<u8>,
    #[serde(default)]
    pull: Pull,
    #[serde(default)]
    location: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    provides: HashMap<String, MeasurementSpec>,
}

impl TryFrom<RawDescriptor> for SensorDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let wiring = match (raw.pin, raw.scl_pin, raw.sda_pin) {
            (None, Some(scl_pin), Some(sda_pin)) => Wiring::I2c {
                scl_pin,
                sda_pin,
                address: raw.i2c_address.unwrap_or(DEFAULT_I2C_ADDRESS),
            },
            (Some(_), None, None) if raw.i2c_address.is_some() => {
                return Err(format!(
                    "sensor '{}': 'i2c_address' needs 'scl_pin'/'sda_pin' wiring",
                    raw.name
                ));
            }
            (Some(pin), None, None) => Wiring::Pin(pin),
            (None, None, None) => Wiring::Unwired,
            (Some(_), _, _) => {
                return Err(format!(
                    "sensor '{}': use either 'pin' or 'scl_pin'/'sda_pin', not both",
                    raw.name
                ));
            }
            _ => {
                return Err(format!(
                    "sensor '{}': I2C wiring needs both 'scl_pin' and 'sda_pin'",
                    raw.name
                ));
            }
        };

        Ok(Self {
            name: raw.name,
            kind: raw.kind,
            wiring,
            pull: raw.pull,
            location: raw.location,
            active: raw.active,
            provides: raw.provides,
        })
    }
}

/// Ordered, immutable table of configured sensor units.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    descriptors: Vec<SensorDescriptor>,
}

impl SensorRegistry {
    /// Build the registry from raw configuration entries.
    ///
    /// An entry that does not parse is left out with a warning. Parsed
    /// entries go through [`SensorRegistry::new`].
    pub fn from_entries(entries: &[Value]) -> Self {
        let descriptors = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match SensorDescriptor::deserialize(entry) {
                Ok(desc) => Some(desc),
                Err(e) => {
                    warn!(
                        sensor = %entry_name(entry, index),
                        error = %e,
                        "Skipping malformed sensor entry"
                    );
                    None
                }
            })
            .collect();
        Self::new(descriptors)
    }

    /// Check descriptors and build the registry.
    ///
    /// A descriptor that fails its checks is dropped with a warning and the
    /// rest are kept. When two descriptors clash on name or id, the later one
    /// is dropped. Inactive descriptors are only checked for a unique name.
    /// Unsupported kinds are kept and skipped at dispatch.
    pub fn new(descriptors: Vec<SensorDescriptor>) -> Self {
        let mut accepted: Vec<SensorDescriptor> = Vec::with_capacity(descriptors.len());
        for desc in descriptors {
            match admit(&accepted, &desc) {
                Ok(()) => accepted.push(desc),
                Err(reason) => warn!(sensor = %desc.name, error = %reason, "Skipping sensor"),
            }
        }

        if !accepted.iter().any(|d| d.active) {
            warn!("No active sensors configured");
        }
        Self {
            descriptors: accepted,
        }
    }

    /// All descriptors in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.descriptors.iter()
    }

    /// Active descriptors in configuration order.
    pub fn active(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.descriptors.iter().filter(|d| d.active)
    }

    pub fn get(&self, name: &str) -> Option<&SensorDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn entry_name(entry: &Value, index: usize) -> String {
    entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index))
}

/// Checks `desc` against the descriptors accepted before it.
fn admit(accepted: &[SensorDescriptor], desc: &SensorDescriptor) -> Result<(), String> {
    if desc.name.is_empty() {
        return Err("sensor name cannot be empty".to_string());
    }
    if accepted.iter().any(|d| d.name == desc.name) {
        return Err(format!("duplicate sensor name '{}'", desc.name));
    }
    if !desc.active {
        return Ok(());
    }

    if desc.provides.is_empty() {
        return Err("'provides' must name at least one measurement".to_string());
    }
    match UnitReader::for_kind(&desc.kind) {
        Some(reader) => reader.check(desc)?,
        None => warn!(
            sensor = %desc.name,
            kind = %desc.kind,
            "No reader for sensor kind; it will be skipped"
        ),
    }

    let mut own_ids = HashSet::new();
    for id in desc.fixed_ids() {
        if !own_ids.insert(id) {
            return Err(format!("id '{}' is used by two measurements", id));
        }
    }

    // A scanned id is "<prefix>_<suffix>"; it must not shadow a fixed id
    // or another bus.
    for other in accepted.iter().filter(|d| d.active) {
        for id in desc.fixed_ids() {
            if other.fixed_ids().any(|o| o == id) {
                return Err(format!("id '{}' is already used by sensor '{}'", id, other.name));
            }
            if other.id_prefixes().any(|p| shadows(p, id)) {
                return Err(format!(
                    "id '{}' can collide with scanned ids of sensor '{}'",
                    id, other.name
                ));
            }
        }
        for prefix in desc.id_prefixes() {
            if other.id_prefixes().any(|p| p == prefix) {
                return Err(format!(
                    "id_prefix '{}' is already used by sensor '{}'",
                    prefix, other.name
                ));
            }
            if let Some(id) = other.fixed_ids().find(|id| shadows(prefix, id)) {
                return Err(format!(
                    "id_prefix '{}' can collide with id '{}' of sensor '{}'",
                    prefix, id, other.name
                ));
            }
        }
    }
    Ok(())
}

fn shadows(prefix: &str, id: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('_'))
}
