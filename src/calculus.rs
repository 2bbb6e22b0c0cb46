//! Numeric derivative and integral on the gradient raster.

use crate::resample::raster_coordinate;
use crate::types::RASTER_TIME;

/// mT/m per raster tick to T/m/s
pub const SLEW_RATE_SCALE: f64 = 1e-3;

/// Integrated mT/m to 1/m
pub const KSPACE_SCALE: f64 = 1e-3 * crate::types::GAMMA;

/// Forward difference in place: `data[t] = (data[t + 1] - data[t]) / dt * scale`.
/// The last sample has no successor and is set to zero.
pub fn derivative(data: &mut [f64], scale: f64) {
    let Some(last) = data.len().checked_sub(1) else {
        return;
    };
    for t in 0..last {
        data[t] = (data[t + 1] - data[t]) / RASTER_TIME * scale;
    }
    data[last] = 0.0;
}

/// Running sum in place: `data[0] = 0`, `data[t] = data[t - 1] + data[t] * dt * scale`.
///
/// With `resets`, the accumulator is nulled at the first tick at or after
/// each of the given times (seconds, increasing), e.g. at every excitation
/// center for k-space.
pub fn integral(data: &mut [f64], scale: f64, resets: Option<&[f64]>) {
    let mut resets = resets
        .unwrap_or_default()
        .iter()
        .map(|&time| raster_coordinate(time).ceil().max(0.0) as usize)
        .peekable();

    let mut acc = 0.0;
    for (t, value) in data.iter_mut().enumerate() {
        if t > 0 {
            acc += *value * RASTER_TIME * scale;
        }
        let mut reset = false;
        while resets.next_if(|&idx| idx <= t).is_some() {
            reset = true;
        }
        if reset {
            acc = 0.0;
        }
        *value = acc;
    }
}
