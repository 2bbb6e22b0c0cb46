use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{DataType, OutputMode, Verbosity, DEFAULT_ECC_SCALE};

/// One term of a multi-exponential impulse response.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DecayTerm {
    pub amplitude: f64,
    /// Unit: `s`. Terms with a time constant of zero are ignored.
    pub tau: f64,
}

/// Coefficients describing the decay of the B0 eddy currents on one axis.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DecayCoefficients(pub Vec<DecayTerm>);

impl DecayCoefficients {
    /// Build from the separate amplitude and time constant lists used by
    /// calibration files.
    pub fn from_vectors(amplitude: &[f64], tau: &[f64]) -> Result<Self> {
        if amplitude.len() != tau.len() {
            return Err(Error::InvalidCoefficients(format!(
                "{} amplitudes but {} time constants",
                amplitude.len(),
                tau.len()
            )));
        }
        if let Some(tau) = tau.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(Error::InvalidCoefficients(format!(
                "time constant {tau} is not a finite, non-negative number"
            )));
        }
        Ok(Self(
            amplitude
                .iter()
                .zip(tau)
                .map(|(&amplitude, &tau)| DecayTerm { amplitude, tau })
                .collect(),
        ))
    }

    /// Terms which contribute to the kernel.
    pub fn active(&self) -> impl Iterator<Item = &DecayTerm> + '_ {
        self.0.iter().filter(|term| term.tau != 0.0)
    }

    pub fn largest_tau(&self) -> Option<f64> {
        self.active().map(|term| term.tau).reduce(f64::max)
    }
}

/// Settings of a single run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_type: DataType,
    pub output_mode: OutputMode,
    pub verbosity: Verbosity,
    /// Decay coefficients of the X, Y and Z axis
    pub decay: [DecayCoefficients; 3],
    pub ecc_scale: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_type: DataType::default(),
            output_mode: OutputMode::default(),
            verbosity: Verbosity::NONE,
            decay: Default::default(),
            ecc_scale: DEFAULT_ECC_SCALE,
        }
    }
}

impl RunConfig {
    pub fn new(data_type: DataType, output_mode: OutputMode) -> Self {
        Self {
            data_type,
            output_mode,
            ..Default::default()
        }
    }

    /// Longest time constant over all three axes, or `None` if no axis has
    /// an active term.
    pub fn largest_tau(&self) -> Option<f64> {
        self.decay
            .iter()
            .filter_map(DecayCoefficients::largest_tau)
            .reduce(f64::max)
    }

    pub(crate) fn log_coefficients(&self) {
        if !self.verbosity.contains(Verbosity::ECC_COEFFS) {
            return;
        }
        for (axis, coeffs) in ["X", "Y", "Z"].iter().zip(&self.decay) {
            for term in &coeffs.0 {
                log::info!(
                    "ECC {axis}: amplitude = {:e}, tau = {:e} s",
                    term.amplitude,
                    term.tau
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn from_vectors() {
        let coeffs = DecayCoefficients::from_vectors(&[1.0, 0.5], &[1e-3, 0.0]).unwrap();
        check!(coeffs.0.len() == 2);
        check!(coeffs.active().count() == 1);
        check!(coeffs.largest_tau() == Some(1e-3));

        let_assert!(Err(Error::InvalidCoefficients(_)) = DecayCoefficients::from_vectors(&[1.0], &[]));
        let_assert!(
            Err(Error::InvalidCoefficients(_)) = DecayCoefficients::from_vectors(&[1.0], &[-1.0])
        );
    }

    #[test]
    fn largest_tau_over_axes() {
        let mut config = RunConfig::default();
        check!(config.largest_tau() == None);
        config.decay[1] = DecayCoefficients::from_vectors(&[1.0, 1.0], &[2e-3, 5e-4]).unwrap();
        config.decay[2] = DecayCoefficients::from_vectors(&[1.0], &[3e-3]).unwrap();
        check!(config.largest_tau() == Some(3e-3));
    }

    #[test]
    fn deserialize() {
        let json = r#"{
            "data_type": "eddy_phase",
            "output_mode": "interpolated_to_rx",
            "verbosity": 3,
            "decay": [[{"amplitude": 0.01, "tau": 0.002}], [], []]
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        check!(config.data_type == DataType::EddyPhase);
        check!(config.output_mode == OutputMode::InterpolatedToRx);
        check!(config.verbosity == Verbosity::ADVANCED);
        check!(config.decay[0].0[0].tau == 0.002);
        check!(config.ecc_scale == DEFAULT_ECC_SCALE);
    }
}
