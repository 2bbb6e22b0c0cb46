//! Reconstructs the physical output of an MRI pulse sequence from its DSP
//! instruction documents: gradient waveforms, k-space trajectory, slew rate,
//! B0 eddy currents and the eddy current phase, either densely on the
//! gradient raster or interpolated to the readout sample times.
//!
//! A run first counts everything it is going to produce ([`Plan`]), then
//! replays the instructions into buffers of exactly that size
//! ([`Interpreter`]) and finally derives the requested data type from the
//! gradients. [`Simulator`] ties these steps together and keeps the eddy
//! phase of the last run to correct acquired readouts with
//! [`Simulator::apply_phase_modulation`].

pub mod buffer;
pub mod calculus;
pub mod config;
pub mod document;
pub mod dsv;
pub mod eddy;
mod error;
pub mod instruction;
pub mod interpreter;
mod output;
pub mod phase;
pub mod planner;
pub mod resample;
pub mod rotation;
pub mod shapes;
pub mod simulator;
mod types;

pub use buffer::Storage;
pub use config::{DecayCoefficients, DecayTerm, RunConfig};
pub use document::{DocumentSource, FileSource, MemorySource};
pub use error::{Error, Result};
pub use interpreter::Interpreter;
pub use phase::PhaseCorrector;
pub use planner::Plan;
pub use simulator::Simulator;
pub use types::*;
