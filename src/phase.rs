use num_complex::Complex;

use crate::error::{Error, Result};

/// Removes the eddy current phase from acquired readouts. Holds the eddy
/// phase interpolated onto every valid readout sample and the readout
/// boundaries it was computed with.
#[derive(Debug, Clone)]
pub struct PhaseCorrector {
    phase: Vec<f64>,
    /// Cumulative sample count after each readout
    rx_event_length: Vec<u32>,
}

impl PhaseCorrector {
    pub fn new(phase: Vec<f64>, rx_event_length: Vec<u32>) -> Self {
        Self {
            phase,
            rx_event_length,
        }
    }

    pub fn readouts(&self) -> usize {
        self.rx_event_length.len()
    }

    /// Sample window of readout `scan`.
    fn window(&self, scan: usize) -> (usize, usize) {
        let end = self.rx_event_length[scan] as usize;
        let start = match scan {
            0 => 0,
            _ => self.rx_event_length[scan - 1] as usize,
        };
        (start, end)
    }

    /// Rotate the first `sample_count` samples of readout `scan` by the
    /// negative eddy phase. `scan == readouts()` is the acquisition end
    /// marker and leaves the data untouched.
    pub fn apply(&self, samples: &mut [Complex<f32>], sample_count: usize, scan: usize) -> Result<()> {
        let count = self.readouts();
        if scan == count {
            return Ok(());
        }
        if scan > count {
            return Err(Error::ScanOutOfRange { scan, count });
        }

        let (start, end) = self.window(scan);
        if end - start != sample_count || samples.len() < sample_count {
            return Err(Error::SampleCountMismatch {
                scan,
                expected: end - start,
                actual: sample_count.min(samples.len()),
            });
        }

        for (sample, &phase) in samples.iter_mut().zip(&self.phase[start..end]) {
            let rotation = Complex::from_polar(1.0, -phase);
            let corrected = Complex::new(sample.re as f64, sample.im as f64) * rotation;
            *sample = Complex::new(corrected.re as f32, corrected.im as f32);
        }
        Ok(())
    }
}
