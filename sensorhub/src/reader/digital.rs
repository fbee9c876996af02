//! Single digital input (push buttons, reed contacts).

use sensorhub_common::Reading;

use super::{ReadError, pin, reading, single_fixed};
use crate::hardware::{Board, Pull};
use crate::registry::SensorDescriptor;

/// Map an electrical level to "asserted".
///
/// With a pull-up the idle level is high, so a low level means asserted.
pub fn asserted(level: bool, pull: Pull) -> bool {
    match pull {
        Pull::Up => !level,
        Pull::Down | Pull::None => level,
    }
}

pub(super) async fn read<B: Board>(
    board: &mut B,
    desc: &SensorDescriptor,
) -> Result<Vec<Reading>, ReadError> {
    let pin = pin(desc)?;
    let (id, spec) = single_fixed(desc)?;
    let level = board.read_digital(pin, desc.pull).await?;

    Ok(vec![reading(desc, id, asserted(level, desc.pull), &spec.unit)])
}
