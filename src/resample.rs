//! Resampling of raster series onto readout sample times.

use crate::error::{Error, Result};
use crate::types::RASTER_TIME;

/// Coordinates closer than this to a raster tick are taken as on the tick.
const SNAP_TICKS: f64 = 1e-6;

/// Fractional raster index of an absolute time. Index 0 lies one raster
/// period after the start of the sequence.
pub fn raster_coordinate(time: f64) -> f64 {
    let x = time / RASTER_TIME - 1.0;
    let nearest = x.round();
    if (x - nearest).abs() < SNAP_TICKS {
        nearest
    } else {
        x
    }
}

/// Linear interpolation of `dense` at every time of `times` (seconds).
pub fn interpolate(dense: &[f64], times: &[f64]) -> Result<Vec<f64>> {
    let Some(last) = dense.len().checked_sub(1) else {
        return Err(Error::SampleTimeOutOfRange {
            time: times.first().copied().unwrap_or_default(),
        });
    };

    times
        .iter()
        .map(|&time| {
            let x = raster_coordinate(time);
            let lo = x.floor();
            if !x.is_finite() || lo < 0.0 || lo > last as f64 {
                return Err(Error::SampleTimeOutOfRange { time });
            }
            let lo = lo as usize;
            let hi = (x.ceil() as usize).min(last);
            if lo == hi {
                Ok(dense[lo])
            } else {
                Ok(dense[lo] + (dense[hi] - dense[lo]) * (x - lo as f64))
            }
        })
        .collect()
}

/// Make every time relative to the center of the latest transmit pulse at
/// or before it. Both slices must be increasing. Times before the first
/// pulse are left unchanged.
pub fn rebase(times: &mut [f64], tx_centers: &[f64]) {
    let mut next = 0;
    let mut current = None;
    for time in times {
        while next < tx_centers.len() && tx_centers[next] <= *time {
            current = Some(tx_centers[next]);
            next += 1;
        }
        if let Some(center) = current {
            *time -= center;
        }
    }
}
