//! B0 eddy currents: the slew rate convolved with a multi-exponential decay
//! kernel per axis.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::calculus;
use crate::config::DecayCoefficients;
use crate::error::{Error, Result};
use crate::types::{AxisSeries, Verbosity, GAMMA, RASTER_TIME};

/// Radians per tesla-second
pub const EDDY_PHASE_SCALE: f64 = std::f64::consts::TAU * GAMMA;

/// Number of decay time constants covered by the kernel
const KERNEL_SPAN: f64 = 5.0;

/// Length of the decay kernel in raster ticks: five times the longest time
/// constant, and at least one tick.
pub fn exponential_length(largest_tau: Option<f64>) -> usize {
    let Some(tau) = largest_tau else {
        return 1;
    };
    let ticks = KERNEL_SPAN * tau / RASTER_TIME;
    // 0.002 s / 10 µs is not exactly 200 in floating point
    let ticks = if (ticks - ticks.round()).abs() < 1e-6 {
        ticks.round()
    } else {
        ticks.ceil()
    };
    (ticks as usize).max(1)
}

/// Length of a linear (not circular) convolution of both sequences.
pub fn convolution_length(shape_length: usize, exponential_length: usize) -> usize {
    shape_length + exponential_length - 1
}

/// `kernel[t] = scale * sum(amp * exp(-t * dt / tau))` for `t < exponential_length`,
/// zero padded to `convolution_length`. Terms with `tau == 0` are skipped.
pub fn decay_kernel(
    coefficients: &DecayCoefficients,
    exponential_length: usize,
    convolution_length: usize,
    scale: f64,
) -> Vec<f64> {
    let mut kernel = vec![0.0; convolution_length.max(exponential_length)];
    for term in coefficients.active() {
        for (t, value) in kernel[..exponential_length].iter_mut().enumerate() {
            *value += term.amplitude * (-(t as f64) * RASTER_TIME / term.tau).exp();
        }
    }
    for value in &mut kernel {
        *value *= scale;
    }
    kernel
}

pub struct EddyCurrentModel {
    pub shape_length: usize,
    pub exponential_length: usize,
    pub convolution_length: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// Spectra of the X, Y and Z kernels
    kernels: [Vec<Complex<f64>>; 3],
}

impl EddyCurrentModel {
    pub fn new(
        coefficients: &[DecayCoefficients; 3],
        shape_length: usize,
        scale: f64,
        verbosity: Verbosity,
    ) -> Self {
        let largest_tau = coefficients
            .iter()
            .filter_map(DecayCoefficients::largest_tau)
            .reduce(f64::max);
        let exponential_length = exponential_length(largest_tau);
        let convolution_length = convolution_length(shape_length, exponential_length);

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(convolution_length);
        let inverse = planner.plan_fft_inverse(convolution_length);

        let kernels = coefficients.clone().map(|coeffs| {
            let kernel = decay_kernel(&coeffs, exponential_length, convolution_length, scale);
            let mut spectrum: Vec<Complex<f64>> =
                kernel.into_iter().map(|v| Complex::new(v, 0.0)).collect();
            forward.process(&mut spectrum);
            spectrum
        });

        if verbosity.contains(Verbosity::DSP_INFO) {
            log::info!(
                "eddy currents: gradient length {shape_length}, kernel length {exponential_length}, FFT length {convolution_length}"
            );
        }

        Self {
            shape_length,
            exponential_length,
            convolution_length,
            forward,
            inverse,
            kernels,
        }
    }

    /// Convolve the slew rate of every axis with its kernel. The slew rate
    /// must have the length the model was built for.
    pub fn eddy_currents(&self, slew_rate: &AxisSeries) -> Result<AxisSeries> {
        if slew_rate.len() != self.shape_length {
            return Err(Error::CountMismatch {
                what: "slew rate samples",
                planned: self.shape_length,
                written: slew_rate.len(),
            });
        }
        let [x, y, z] = slew_rate.axes();
        Ok(AxisSeries {
            x: self.convolve(x, &self.kernels[0]),
            y: self.convolve(y, &self.kernels[1]),
            z: self.convolve(z, &self.kernels[2]),
        })
    }

    fn convolve(&self, signal: &[f64], kernel: &[Complex<f64>]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        buffer.resize(self.convolution_length, Complex::new(0.0, 0.0));

        self.forward.process(&mut buffer);
        for (value, k) in buffer.iter_mut().zip(kernel) {
            *value *= *k;
        }
        self.inverse.process(&mut buffer);

        let norm = self.convolution_length as f64;
        buffer
            .iter()
            .take(self.shape_length)
            .map(|c| c.re / norm)
            .collect()
    }
}

/// Accumulated phase of the summed eddy currents of all axes. Unit: `rad`
pub fn eddy_phase(eddy_currents: &AxisSeries) -> Vec<f64> {
    let mut phase = eddy_currents.sum();
    calculus::integral(&mut phase, EDDY_PHASE_SCALE, None);
    phase
}
