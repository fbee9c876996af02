//! DHT11 / DHT22 temperature and humidity sensors.

use sensorhub_common::{Reading, ReadingValue};

use super::{ReadError, finite, pin, reading, require_pin};
use crate::hardware::{Board, DhtModel};
use crate::registry::SensorDescriptor;

const MEASUREMENTS: [&str; 2] = ["temperature", "humidity"];

pub(super) fn check(desc: &SensorDescriptor) -> Result<(), String> {
    require_pin(desc)?;
    for name in MEASUREMENTS {
        match desc.measurement(name) {
            Some(spec) if spec.fixed_id().is_some() => {}
            Some(_) => return Err(format!("measurement '{name}' needs a fixed 'id'")),
            None => return Err(format!("missing '{name}' measurement")),
        }
    }
    if let Some(extra) = desc.provides.keys().find(|k| !MEASUREMENTS.contains(&k.as_str())) {
        return Err(format!("unknown measurement '{extra}'"));
    }
    Ok(())
}

/// DHT11 resolution is one unit, so it reports whole numbers.
fn value(model: DhtModel, raw: f64) -> ReadingValue {
    match model {
        DhtModel::Dht11 => ReadingValue::Integer(raw.round() as i64),
        DhtModel::Dht22 => ReadingValue::Float(raw),
    }
}

pub(super) async fn read<B: Board>(
    board: &mut B,
    desc: &SensorDescriptor,
    model: DhtModel,
) -> Result<Vec<Reading>, ReadError> {
    let pin = pin(desc)?;
    let measurement = board.measure_dht(model, pin).await?;

    let mut readings = Vec::with_capacity(2);
    for (name, raw) in MEASUREMENTS
        .into_iter()
        .zip([measurement.temperature, measurement.humidity])
    {
        let spec = desc
            .measurement(name)
            .ok_or_else(|| ReadError::MissingMeasurement(name.to_string()))?;
        let id = spec
            .fixed_id()
            .ok_or_else(|| ReadError::MissingMeasurement(name.to_string()))?;
        let raw = finite(name, raw)?;
        readings.push(reading(desc, id, value(model, raw), &spec.unit));
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HardwareError, ScriptedBoard};
    use crate::reader::test_support::descriptor;
    use crate::registry::{MeasurementSpec, Wiring};
    use sensorhub_common::SensorKind;

    fn dht(kind: SensorKind) -> SensorDescriptor {
        descriptor(
            "dht",
            kind,
            Wiring::Pin(14),
            &[
                ("temperature", MeasurementSpec::fixed("Sensor_DHT_Temp", "°C")),
                ("humidity", MeasurementSpec::fixed("Sensor_DHT_Hum", "%")),
            ],
        )
    }

    #[tokio::test]
    async fn test_dht11_reports_integers_in_order() {
        let mut board = ScriptedBoard::new();
        board.set_dht(14, 22.6, 41.2);

        let readings = read(&mut board, &dht(SensorKind::Dht11), DhtModel::Dht11)
            .await
            .unwrap();

        let ids: Vec<_> = readings.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["Sensor_DHT_Temp", "Sensor_DHT_Hum"]);
        assert_eq!(readings[0].payload.value, ReadingValue::Integer(23));
        assert_eq!(readings[1].payload.value, ReadingValue::Integer(41));
        assert_eq!(readings[1].payload.unit, "%");
    }

    #[tokio::test]
    async fn test_dht22_reports_floats() {
        let mut board = ScriptedBoard::new();
        board.set_dht(14, 22.6, 41.2);

        let readings = read(&mut board, &dht(SensorKind::Dht22), DhtModel::Dht22)
            .await
            .unwrap();

        assert_eq!(readings[0].payload.value, ReadingValue::Float(22.6));
        assert_eq!(readings[1].payload.value, ReadingValue::Float(41.2));
        assert_eq!(board.calls(), vec!["dht:14:Dht22".to_string()]);
    }

    #[tokio::test]
    async fn test_no_response_yields_timeout() {
        let mut board = ScriptedBoard::new();
        let result = read(&mut board, &dht(SensorKind::Dht11), DhtModel::Dht11).await;
        assert_eq!(result, Err(ReadError::Hardware(HardwareError::Timeout)));
    }

    #[tokio::test]
    async fn test_non_finite_value_fails_the_unit() {
        let mut board = ScriptedBoard::new();
        board.set_dht(14, 22.6, f64::NAN);

        for (kind, model) in [(SensorKind::Dht22, DhtModel::Dht22), (SensorKind::Dht11, DhtModel::Dht11)] {
            let result = read(&mut board, &dht(kind), model).await;
            assert!(
                matches!(result, Err(ReadError::Hardware(HardwareError::InvalidData(_)))),
                "{:?}",
                result
            );
        }
    }

    #[test]
    fn test_check_requires_both_measurements() {
        let mut desc = dht(SensorKind::Dht11);
        assert!(check(&desc).is_ok());

        desc.provides.remove("humidity");
        assert!(check(&desc).unwrap_err().contains("humidity"));
    }

    #[test]
    fn test_check_rejects_unknown_measurement() {
        let mut desc = dht(SensorKind::Dht22);
        desc.provides
            .insert("dew_point".to_string(), MeasurementSpec::fixed("dp", "°C"));
        assert!(check(&desc).is_err());
    }
}
