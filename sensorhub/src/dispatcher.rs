//! Acquisition dispatcher: one full pass over the sensor registry.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use sensorhub_common::Reading;

use crate::hardware::Board;
use crate::reader::{ReadError, UnitReader};
use crate::registry::{SensorDescriptor, SensorRegistry};

/// Counters for one acquisition pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Units that returned readings (possibly none).
    pub units_read: usize,
    /// Units whose read failed or timed out.
    pub units_failed: usize,
    /// Active units with an unsupported kind.
    pub units_skipped: usize,
    /// Readings dropped because their id was already in the batch.
    pub duplicates: usize,
    /// Readings in the batch.
    pub readings: usize,
}

/// Runs every active unit reader against a board.
pub struct Dispatcher<B: Board> {
    board: B,
    registry: SensorRegistry,
    unit_timeout: Duration,
    last_summary: AcquisitionSummary,
}

impl<B: Board> Dispatcher<B> {
    /// Create a dispatcher owning the board.
    pub fn new(board: B, registry: SensorRegistry, unit_timeout: Duration) -> Self {
        Self {
            board,
            registry,
            unit_timeout,
            last_summary: AcquisitionSummary::default(),
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// Counters of the most recent [`read_all`](Self::read_all).
    pub fn last_summary(&self) -> AcquisitionSummary {
        self.last_summary
    }

    /// Read every active unit in registry order.
    ///
    /// A failing unit contributes nothing; it never stops the pass. Readings
    /// whose id already appeared earlier in the batch are dropped.
    pub async fn read_all(&mut self) -> Vec<Reading> {
        let mut summary = AcquisitionSummary::default();
        let mut batch = Vec::new();
        let mut seen = HashSet::new();

        for desc in self.registry.active() {
            let Some(reader) = UnitReader::for_kind(&desc.kind) else {
                warn!(
                    sensor = %desc.name,
                    kind = %desc.kind,
                    "No reader implemented for sensor kind, skipping"
                );
                summary.units_skipped += 1;
                continue;
            };

            match read_unit(&mut self.board, reader, desc, self.unit_timeout).await {
                Ok(readings) => {
                    debug!(sensor = %desc.name, readings = readings.len(), "Unit read");
                    summary.units_read += 1;
                    for reading in readings {
                        if seen.insert(reading.payload.id.clone()) {
                            batch.push(reading);
                        } else {
                            warn!(
                                sensor = %desc.name,
                                id = %reading.payload.id,
                                "Duplicate reading id in batch, dropping"
                            );
                            summary.duplicates += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(sensor = %desc.name, kind = %desc.kind, error = %e, "Unit read failed");
                    summary.units_failed += 1;
                }
            }
        }

        summary.readings = batch.len();
        info!(
            units_read = summary.units_read,
            units_failed = summary.units_failed,
            units_skipped = summary.units_skipped,
            readings = summary.readings,
            "Acquisition pass complete"
        );
        self.last_summary = summary;
        batch
    }
}

async fn read_unit<B: Board>(
    board: &mut B,
    reader: UnitReader,
    desc: &SensorDescriptor,
    timeout: Duration,
) -> Result<Vec<Reading>, ReadError> {
    tokio::time::timeout(timeout, reader.read(board, desc))
        .await
        .map_err(|_| ReadError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HardwareError, ScriptedBoard};
    use crate::reader::test_support::descriptor;
    use crate::registry::{MeasurementSpec, Wiring};
    use crate::test_support::CapturedLogs;
    use sensorhub_common::{ReadingValue, SensorKind};

    fn button(name: &str, pin: u8, id: &str) -> SensorDescriptor {
        descriptor(
            name,
            SensorKind::Button,
            Wiring::Pin(pin),
            &[("state", MeasurementSpec::fixed(id, "boolean"))],
        )
    }

    fn dispatcher(board: &ScriptedBoard, units: Vec<SensorDescriptor>) -> Dispatcher<ScriptedBoard> {
        let registry = SensorRegistry::new(units);
        Dispatcher::new(board.clone(), registry, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_failing_unit_does_not_stop_pass() {
        let board = ScriptedBoard::new();
        board.set_digital(1, false);
        board.fail_pin(2, HardwareError::Timeout);
        board.set_digital(3, true);

        let mut dispatcher = dispatcher(
            &board,
            vec![button("a", 1, "A"), button("b", 2, "B"), button("c", 3, "C")],
        );
        let batch = dispatcher.read_all().await;

        let ids: Vec<_> = batch.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(batch[0].payload.value, ReadingValue::Boolean(true));
        assert_eq!(dispatcher.last_summary().units_failed, 1);
        assert_eq!(dispatcher.last_summary().units_read, 2);
    }

    #[tokio::test]
    async fn test_inactive_unit_is_never_touched() {
        let board = ScriptedBoard::new();
        board.set_digital(1, false);
        let mut idle = button("idle", 9, "IDLE");
        idle.active = false;

        let mut dispatcher = dispatcher(&board, vec![idle, button("a", 1, "A")]);
        let batch = dispatcher.read_all().await;

        assert_eq!(batch.len(), 1);
        assert!(board.calls().iter().all(|c| !c.contains(":9")));
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_skipped() {
        let board = ScriptedBoard::new();
        board.set_digital(1, true);
        let mut odd = button("odd", 5, "ODD");
        odd.kind = SensorKind::Unsupported("BME280".to_string());

        let mut dispatcher = dispatcher(&board, vec![odd, button("a", 1, "A")]);
        let batch = dispatcher.read_all().await;

        assert_eq!(batch.len(), 1);
        assert_eq!(dispatcher.last_summary().units_skipped, 1);
        assert_eq!(board.calls(), vec!["digital:1:Up".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_logged_each_pass() {
        let logs = CapturedLogs::default();
        let board = ScriptedBoard::new();
        let mut odd = button("odd", 5, "ODD");
        odd.kind = SensorKind::Unsupported("BME280".to_string());
        let mut dispatcher = dispatcher(&board, vec![odd]);

        let _guard = tracing::subscriber::set_default(logs.subscriber());
        dispatcher.read_all().await;
        dispatcher.read_all().await;

        let output = logs.contents();
        let warnings: Vec<_> = output
            .lines()
            .filter(|line| line.contains("WARN") && line.contains("No reader implemented"))
            .collect();
        assert_eq!(warnings.len(), 2, "{}", output);
        assert!(warnings[0].contains("sensor=odd"));
        assert!(warnings[0].contains("kind=BME280"));
    }

    #[tokio::test]
    async fn test_empty_registry_yields_empty_batch() {
        let board = ScriptedBoard::new();
        let mut dispatcher = dispatcher(&board, Vec::new());
        assert!(dispatcher.read_all().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_unit_times_out() {
        let board = ScriptedBoard::new();
        let bus = descriptor(
            "bus",
            SensorKind::Ds18b20,
            Wiring::Pin(27),
            &[("temperature", MeasurementSpec::prefixed("T", "°C"))],
        );
        board.set_onewire(27, vec![(crate::hardware::RomCode([0x28, 0, 0, 0, 0, 0, 0, 1]), 20.0)]);

        let registry = SensorRegistry::new(vec![bus]);
        // Shorter than settle plus conversion time.
        let mut dispatcher = Dispatcher::new(board, registry, Duration::from_millis(500));

        assert!(dispatcher.read_all().await.is_empty());
        assert_eq!(dispatcher.last_summary().units_failed, 1);
    }
}
