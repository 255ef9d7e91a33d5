use std::io;

use thiserror::Error;

/// Errors surfaced by constructors and trace readers.
///
/// The hot paths (`update`, `estimate`, the policy callbacks) never fail;
/// everything fallible in this crate happens at construction or I/O time.
#[derive(Debug, Error)]
pub enum Error {
    #[error("capacity must be greater than 0")]
    ZeroCapacity,

    #[error("aligned allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    #[error("invalid parameter range: min {min} must be positive and below max {max}")]
    InvalidParamRange { min: f64, max: f64 },

    #[error("an arm grid needs at least 2 arms, got {0}")]
    TooFewArms(usize),

    #[error("trace length {len} is not a multiple of the {record}-byte record size")]
    MalformedTrace { len: u64, record: usize },

    #[error("missing '{0}' column in trace header")]
    MissingColumn(&'static str),

    #[error("unparsable record at line {line}: {reason}")]
    BadRecord { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}
