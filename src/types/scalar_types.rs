use serde::Deserialize;

/// Gradient raster time. Unit: `s`
pub const RASTER_TIME: f64 = 10e-6;

/// Gradient raster time. Unit: `µs`
pub const RASTER_TIME_US: f64 = 10.0;

/// Gyromagnetic ratio of 1H divided by 2π. Unit: `Hz / T`
pub const GAMMA: f64 = 42_576_385.43;

/// Scale applied to the multi-exponential decay kernel. It has no physical
/// derivation, it was fitted against phantom measurements. Override it with
/// `RunConfig::ecc_scale`.
pub const DEFAULT_ECC_SCALE: f64 = 1e-5;

/// The product a run computes.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Unit: `mT / m`
    #[default]
    Gradient,
    /// Unit: `1 / m`, nulled at every excitation center
    Kspace,
    /// Unit: `T / m / s`
    SlewRate,
    /// Per-axis convolution of the slew rate with the decay kernel
    EddyCurrent,
    /// Unit: `rad`, a single series
    EddyPhase,
}

impl DataType {
    /// File suffixes of the produced series, in output order.
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            DataType::Gradient => &["GX", "GY", "GZ"],
            DataType::Kspace => &["KX", "KY", "KZ"],
            DataType::SlewRate => &["SX", "SY", "SZ"],
            DataType::EddyCurrent => &["ECX", "ECY", "ECZ"],
            DataType::EddyPhase => &["EP"],
        }
    }
}

/// Density of the produced series.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One value per gradient raster tick
    #[default]
    Full,
    /// One value per readout sample
    InterpolatedToRx,
}

/// Two gradients are allowed to overlap, each one is steered through its own
/// rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalAxis {
    A,
    B,
}

/// The three logical gradient directions, which are the columns of a
/// rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientAxis {
    PhaseEncode,
    Readout,
    Slice,
}

impl GradientAxis {
    pub fn index(self) -> usize {
        match self {
            GradientAxis::PhaseEncode => 0,
            GradientAxis::Readout => 1,
            GradientAxis::Slice => 2,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    #[default]
    Undefined,
    Excitation,
    Inversion,
}

/// Bit flags selecting which diagnostics are logged. They never change
/// what a run computes.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Verbosity(pub u32);

impl Verbosity {
    pub const NONE: Verbosity = Verbosity(0b000000);
    pub const BASIC: Verbosity = Verbosity(0b000001);
    pub const ADVANCED: Verbosity = Verbosity(0b000011);
    pub const ROTMAT: Verbosity = Verbosity(0b000100);
    pub const INCR_OFFSET: Verbosity = Verbosity(0b001000);
    pub const ECC_COEFFS: Verbosity = Verbosity(0b010000);
    pub const DSP_INFO: Verbosity = Verbosity(0b100000);
    pub const ALL: Verbosity = Verbosity(0b111111);

    pub fn contains(self, flags: Verbosity) -> bool {
        flags.0 != 0 && self.0 & flags.0 == flags.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn verbosity_flags() {
        check!(Verbosity::ALL.contains(Verbosity::ADVANCED));
        check!(Verbosity::ADVANCED.contains(Verbosity::BASIC));
        check!(!Verbosity::BASIC.contains(Verbosity::ADVANCED));
        check!(!Verbosity::ALL.contains(Verbosity::NONE));
        check!(!Verbosity(0b100).contains(Verbosity::BASIC));
    }

    #[test]
    fn suffixes() {
        check!(DataType::Kspace.suffixes() == ["KX", "KY", "KZ"]);
        check!(DataType::EddyPhase.suffixes() == ["EP"]);
    }
}
