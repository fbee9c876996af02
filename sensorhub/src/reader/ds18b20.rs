//! DS18B20 temperature sensors sharing one 1-Wire bus.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use sensorhub_common::Reading;

use super::{ReadError, finite, pin, reading, require_pin};
use crate::hardware::{Board, OneWireBus, RomCode};
use crate::registry::SensorDescriptor;

/// Wait after opening the bus before the first transaction.
pub const SETTLE_TIME: Duration = Duration::from_millis(100);

/// 12-bit conversion time.
pub const CONVERSION_TIME: Duration = Duration::from_millis(750);

/// Hex digits of the ROM kept in the short device suffix.
const SUFFIX_DIGITS: usize = 4;

pub(super) fn check(desc: &SensorDescriptor) -> Result<(), String> {
    require_pin(desc)?;
    match desc.single_measurement() {
        Some((_, spec)) if spec.id_prefix().is_some() => Ok(()),
        Some((name, _)) => Err(format!("measurement '{name}' needs an 'id_prefix'")),
        None => Err("exactly one measurement must be configured".to_string()),
    }
}

/// Per-device reading ids for one scan, in scan order.
///
/// The short form is `<prefix>_<last four hex digits of the ROM>`. Devices
/// whose short suffix collides with another device in the same scan use the
/// full ROM instead.
pub fn device_ids(prefix: &str, roms: &[RomCode]) -> Vec<String> {
    let hex: Vec<String> = roms.iter().map(RomCode::to_hex).collect();
    let short = |h: &str| h[h.len().saturating_sub(SUFFIX_DIGITS)..].to_string();

    let mut seen: HashMap<String, usize> = HashMap::new();
    for h in &hex {
        *seen.entry(short(h)).or_default() += 1;
    }

    hex.iter()
        .map(|h| {
            let suffix = short(h);
            if seen.get(&suffix).copied().unwrap_or(0) > 1 {
                warn!(
                    rom = %h,
                    suffix = %suffix,
                    "1-Wire ROM suffix collides with another device; using full ROM"
                );
                format!("{prefix}_{h}")
            } else {
                format!("{prefix}_{suffix}")
            }
        })
        .collect()
}

pub(super) async fn read<B: Board>(
    board: &mut B,
    desc: &SensorDescriptor,
) -> Result<Vec<Reading>, ReadError> {
    let pin = pin(desc)?;
    let (prefix, spec) = desc
        .single_measurement()
        .and_then(|(_, spec)| spec.id_prefix().map(|p| (p, spec)))
        .ok_or_else(|| ReadError::MissingMeasurement("id_prefix".to_string()))?;

    let mut bus = board.open_onewire(pin)?;
    tokio::time::sleep(SETTLE_TIME).await;

    let roms = bus.scan().await?;
    debug!(sensor = %desc.name, devices = roms.len(), "1-Wire scan complete");
    if roms.is_empty() {
        return Ok(Vec::new());
    }

    bus.convert_all().await?;
    tokio::time::sleep(CONVERSION_TIME).await;

    let ids = device_ids(prefix, &roms);
    let mut readings = Vec::with_capacity(roms.len());
    for (rom, id) in roms.iter().zip(ids) {
        let celsius = finite("temperature", bus.read_temperature(rom).await?)?;
        readings.push(reading(desc, id, celsius, &spec.unit));
    }
    Ok(readings)
}
