use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire encoding for reading payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON (the default; what most dashboards and brokers expect).
    #[default]
    Json,

    /// CBOR (compact binary, for constrained links).
    Cbor,
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Reading, ReadingPayload, ReadingValue, SensorKind};

    fn sample() -> ReadingPayload {
        Reading::new(
            SensorKind::Ds18b20,
            "Sensor_DS18B20_a1f0",
            18.4375,
            "°C",
            "Basement",
            true,
        )
        .payload
    }

    #[test]
    fn test_json_payload_decodes_field_for_field() {
        let payload = sample();

        let encoded = encode(&payload, Format::Json).unwrap();
        let decoded: ReadingPayload = decode(&encoded, Format::Json).unwrap();

        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_cbor_payload_decodes_field_for_field() {
        let payload = sample();

        let encoded = encode(&payload, Format::Cbor).unwrap();
        let decoded: ReadingPayload = decode(&encoded, Format::Cbor).unwrap();

        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_cbor_is_smaller() {
        let payload = sample();

        let json = encode(&payload, Format::Json).unwrap();
        let cbor = encode(&payload, Format::Cbor).unwrap();

        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
    }

    #[test]
    fn test_integer_and_boolean_values_keep_their_type() {
        let mut payload = sample();

        payload.value = ReadingValue::Integer(1_830_000);
        let encoded = encode(&payload, Format::Json).unwrap();
        let decoded: ReadingPayload = decode(&encoded, Format::Json).unwrap();
        assert_eq!(decoded.value, ReadingValue::Integer(1_830_000));

        payload.value = ReadingValue::Boolean(true);
        let encoded = encode(&payload, Format::Cbor).unwrap();
        let decoded: ReadingPayload = decode(&encoded, Format::Cbor).unwrap();
        assert_eq!(decoded.value, ReadingValue::Boolean(true));
    }
}
