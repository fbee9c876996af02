//! Single ADC input (light dependent resistor, soil moisture probe).

use sensorhub_common::Reading;

use super::{ReadError, pin, reading, single_fixed};
use crate::hardware::Board;
use crate::registry::SensorDescriptor;

pub(super) async fn read<B: Board>(
    board: &mut B,
    desc: &SensorDescriptor,
) -> Result<Vec<Reading>, ReadError> {
    let pin = pin(desc)?;
    let (id, spec) = single_fixed(desc)?;
    let microvolts = board.read_analog_microvolts(pin).await?;

    Ok(vec![reading(desc, id, microvolts, &spec.unit)])
}
