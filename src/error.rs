use std::path::PathBuf;
use thiserror::Error;

/// Every failure aborts the run it occurs in, nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("<{tag}> is missing the required attribute or child {attribute:?}")]
    MissingAttribute { tag: String, attribute: &'static str },
    #[error("<{tag}> has an invalid value {value:?} for attribute {attribute:?}")]
    InvalidAttribute {
        tag: String,
        attribute: &'static str,
        value: String,
    },
    #[error("unknown instruction <{0}>")]
    UnknownInstruction(String),
    #[error("failed to load document {name:?}: {reason}")]
    DocumentLoad { name: String, reason: String },
    #[error("document {0:?} is continued more than once in the same chain")]
    ContinuationCycle(String),

    // Planner / interpreter disagreements
    #[error("{buffer} buffer capacity exceeded: {requested} > {capacity}")]
    CapacityExceeded {
        buffer: &'static str,
        capacity: usize,
        requested: usize,
    },
    #[error("planned {planned} {what} but the replay produced {written}")]
    CountMismatch {
        what: &'static str,
        planned: usize,
        written: usize,
    },
    #[error("{0} trigger without a queued event")]
    EventQueueEmpty(&'static str),
    #[error("{count} {kind} event(s) were never triggered")]
    UndrainedEvents { kind: &'static str, count: usize },
    #[error("no gradient shape with ID {0}")]
    UnknownShape(u32),
    #[error("gradient shape {id} has {len} samples but is played for {ticks} ticks")]
    ShapeTooShort { id: u32, len: usize, ticks: usize },
    #[error("sequence contains no gradient ticks")]
    NoGradientTicks,
    #[error("sequence contains no valid readouts")]
    NoReadouts,

    // Resampling and phase correction
    #[error("sample time {time} s lies outside of the gradient waveform")]
    SampleTimeOutOfRange { time: f64 },
    #[error("scan {scan} has {expected} samples, got {actual}")]
    SampleCountMismatch {
        scan: usize,
        expected: usize,
        actual: usize,
    },
    #[error("scan {scan} out of range, the sequence has {count} readouts")]
    ScanOutOfRange { scan: usize, count: usize },
    #[error("phase correction needs a completed eddy phase run with interpolated output")]
    PhaseCorrectionUnavailable,

    #[error("invalid decay coefficients: {0}")]
    InvalidCoefficients(String),
    #[error("invalid DSV file {path}: {reason}")]
    Dsv { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
