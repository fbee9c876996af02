//! Integration tests for sensorhub-common.

use sensorhub_common::{
    Format, Reading, ReadingPayload, ReadingValue, RouteBuilder, SensorKind, decode, encode,
};

#[test]
fn test_reading_to_wire_and_back() {
    let reading = Reading::new(
        SensorKind::Gy521,
        "Sensor_GY521_AccelX",
        -0.98,
        "g",
        "Drone",
        true,
    );

    let route = RouteBuilder::new().build(&reading.kind);
    assert_eq!(route, "Sensor/GY521");

    let json_bytes = encode(&reading.payload, Format::Json).expect("JSON encode failed");
    let decoded: ReadingPayload = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded, reading.payload);

    let cbor_bytes = encode(&reading.payload, Format::Cbor).expect("CBOR encode failed");
    assert!(
        cbor_bytes.len() < json_bytes.len(),
        "CBOR should be smaller than JSON"
    );

    let cbor_decoded: ReadingPayload = decode(&cbor_bytes, Format::Cbor).expect("CBOR decode failed");
    assert_eq!(cbor_decoded, reading.payload);
}

#[test]
fn test_route_with_custom_prefix() {
    let routes = RouteBuilder::with_prefix("greenhouse");
    assert_eq!(routes.build(&SensorKind::SoilMoisture), "greenhouse/SoilMoisture");
    assert_eq!(
        routes.build(&SensorKind::Unsupported("BME280".to_string())),
        "greenhouse/BME280"
    );
}

#[test]
fn test_all_supported_kinds_route_distinctly() {
    let routes = RouteBuilder::new();
    let mut seen = std::collections::HashSet::new();

    for kind in SensorKind::SUPPORTED {
        let route = routes.build(&kind);
        assert!(route.starts_with("Sensor/"), "unexpected route {route}");
        assert!(seen.insert(route.clone()), "duplicate route {route}");
    }
}

#[test]
fn test_payload_json_shape() {
    let reading = Reading::new(
        SensorKind::Ldr,
        "Sensor_LDR_Light",
        1_204_000u32,
        "raw",
        "Greenhouse",
        true,
    );

    let value: serde_json::Value =
        serde_json::from_slice(&encode(&reading.payload, Format::Json).unwrap()).unwrap();

    assert_eq!(value["id"], "Sensor_LDR_Light");
    assert_eq!(value["value"], 1_204_000);
    assert_eq!(value["unit"], "raw");
    assert_eq!(value["location"], "Greenhouse");
    assert_eq!(value["active"], true);
    assert_eq!(reading.payload.value, ReadingValue::Integer(1_204_000));
}
