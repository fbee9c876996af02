use serde::{Deserialize, Serialize};

/// A single reported value produced by one sensor unit during one cycle.
///
/// `kind` is the owning sensor's kind and selects the publish route;
/// `payload` is what goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Kind of the sensor that produced this reading.
    pub kind: SensorKind,

    /// Fields published to the telemetry sink.
    pub payload: ReadingPayload,
}

impl Reading {
    /// Create a new reading.
    pub fn new(
        kind: SensorKind,
        id: impl Into<String>,
        value: impl Into<ReadingValue>,
        unit: impl Into<String>,
        location: impl Into<String>,
        active: bool,
    ) -> Self {
        Self {
            kind,
            payload: ReadingPayload {
                id: id.into(),
                value: value.into(),
                unit: unit.into(),
                location: location.into(),
                active,
            },
        }
    }

    /// Resolved identifier of this reading.
    pub fn id(&self) -> &str {
        &self.payload.id
    }
}

/// Message body of a reading.
///
/// Field order is the wire order: `id`, `value`, `unit`, `location`, `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPayload {
    /// Concrete identifier (fixed id, or prefix plus device suffix).
    pub id: String,

    /// The measured value.
    pub value: ReadingValue,

    /// Engineering unit label (descriptive only).
    pub unit: String,

    /// Free-text location of the sensor.
    pub location: String,

    /// Activation flag of the owning sensor.
    pub active: bool,
}

/// Typed reading value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    /// Boolean state (digital inputs).
    Boolean(bool),

    /// Whole number (raw ADC values, DHT11 readings).
    Integer(i64),

    /// Real number.
    Float(f64),
}

impl ReadingValue {
    /// Numeric view of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Boolean(_) => None,
            ReadingValue::Integer(v) => Some(*v as f64),
            ReadingValue::Float(v) => Some(*v),
        }
    }
}

impl From<bool> for ReadingValue {
    fn from(v: bool) -> Self {
        ReadingValue::Boolean(v)
    }
}

impl From<i64> for ReadingValue {
    fn from(v: i64) -> Self {
        ReadingValue::Integer(v)
    }
}

impl From<u32> for ReadingValue {
    fn from(v: u32) -> Self {
        ReadingValue::Integer(i64::from(v))
    }
}

impl From<f64> for ReadingValue {
    fn from(v: f64) -> Self {
        ReadingValue::Float(v)
    }
}

/// Sensor unit type.
///
/// The set of supported kinds is closed; anything else read from
/// configuration is kept as [`SensorKind::Unsupported`] so it can be
/// reported and skipped instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorKind {
    /// Momentary push button on a digital input.
    Button,
    /// Light dependent resistor on an ADC pin.
    Ldr,
    /// Capacitive/resistive soil moisture probe on an ADC pin.
    SoilMoisture,
    /// DHT11 temperature and humidity sensor.
    Dht11,
    /// DHT22 (AM2302) temperature and humidity sensor.
    Dht22,
    /// DS18B20 temperature sensors on a shared 1-Wire bus.
    Ds18b20,
    /// GY-521 breakout (MPU6050 accelerometer/gyroscope) on I2C.
    Gy521,
    /// A kind this hub has no reader for.
    Unsupported(String),
}

impl SensorKind {
    /// All kinds with a reader implementation.
    pub const SUPPORTED: [SensorKind; 7] = [
        SensorKind::Button,
        SensorKind::Ldr,
        SensorKind::SoilMoisture,
        SensorKind::Dht11,
        SensorKind::Dht22,
        SensorKind::Ds18b20,
        SensorKind::Gy521,
    ];

    /// Parse a kind name. Matching is case-insensitive.
    pub fn parse(name: &str) -> Self {
        Self::SUPPORTED
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| SensorKind::Unsupported(name.to_string()))
    }

    /// Canonical name, used as the route suffix.
    pub fn as_str(&self) -> &str {
        match self {
            SensorKind::Button => "Button",
            SensorKind::Ldr => "LDR",
            SensorKind::SoilMoisture => "SoilMoisture",
            SensorKind::Dht11 => "DHT11",
            SensorKind::Dht22 => "DHT22",
            SensorKind::Ds18b20 => "DS18B20",
            SensorKind::Gy521 => "GY521",
            SensorKind::Unsupported(name) => name,
        }
    }

    /// Whether a reader exists for this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SensorKind::Unsupported(_))
    }
}

impl From<String> for SensorKind {
    fn from(name: String) -> Self {
        SensorKind::parse(&name)
    }
}

impl From<SensorKind> for String {
    fn from(kind: SensorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_creation() {
        let reading = Reading::new(
            SensorKind::Dht11,
            "Sensor_DHT11_Temp",
            21i64,
            "°C",
            "Living Room",
            true,
        );

        assert_eq!(reading.kind, SensorKind::Dht11);
        assert_eq!(reading.id(), "Sensor_DHT11_Temp");
        assert_eq!(reading.payload.value, ReadingValue::Integer(21));
        assert_eq!(reading.payload.location, "Living Room");
        assert!(reading.payload.active);
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(SensorKind::parse("dht11"), SensorKind::Dht11);
        assert_eq!(SensorKind::parse("ds18b20"), SensorKind::Ds18b20);
        assert_eq!(SensorKind::parse("BUTTON"), SensorKind::Button);
        assert_eq!(SensorKind::parse("ldr"), SensorKind::Ldr);
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let kind = SensorKind::parse("BME280");
        assert_eq!(kind, SensorKind::Unsupported("BME280".to_string()));
        assert!(!kind.is_supported());
        assert_eq!(kind.as_str(), "BME280");
    }

    #[test]
    fn test_kind_serde_uses_canonical_name() {
        let json = serde_json::to_string(&SensorKind::Gy521).unwrap();
        assert_eq!(json, "\"GY521\"");

        let kind: SensorKind = serde_json::from_str("\"gy521\"").unwrap();
        assert_eq!(kind, SensorKind::Gy521);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ReadingValue::from(true), ReadingValue::Boolean(true));
        assert_eq!(ReadingValue::from(42i64), ReadingValue::Integer(42));
        assert_eq!(ReadingValue::from(1_250_000u32), ReadingValue::Integer(1_250_000));
        assert_eq!(ReadingValue::from(0.25), ReadingValue::Float(0.25));
        assert_eq!(ReadingValue::Boolean(false).as_f64(), None);
        assert_eq!(ReadingValue::Integer(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_payload_field_order() {
        let reading = Reading::new(SensorKind::Button, "btn", true, "boolean", "Workshop", true);
        let json = serde_json::to_string(&reading.payload).unwrap();
        assert_eq!(
            json,
            r#"{"id":"btn","value":true,"unit":"boolean","location":"Workshop","active":true}"#
        );
    }
}
