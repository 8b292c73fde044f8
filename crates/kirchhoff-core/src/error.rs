//! Error types shared by the classifier, kernel builder, and runtime driver.
//!
//! These map directly onto spec.md §7: one variant per named failure mode,
//! nothing invented beyond that list.

use thiserror::Error;

/// Errors that can surface from building or running a [`crate::Simulation`].
#[derive(Debug, Error)]
pub enum Error {
    /// The classifier left one or more equations unassigned to any stratum.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The output map referenced a component voltage or node that does not
    /// exist in the circuit.
    #[error("unknown output: {0}")]
    UnknownOutput(String),

    /// An input or output buffer's length did not match the requested
    /// sample count.
    #[error("length mismatch: expected {expected}, got {actual} for `{which}`")]
    LengthMismatch {
        which: String,
        expected: usize,
        actual: usize,
    },

    /// Building the kernel for a new (inputs, outputs, parameters)
    /// signature failed. The kernel cache is not populated, so a later
    /// call may retry.
    #[error("kernel build failure: {0}")]
    BuildFailure(String),

    /// The output buffer's tail went non-finite; only produced by the
    /// optional divergence guard (spec.md §7/§9).
    #[error("simulation diverged")]
    Diverged,
}

pub type Result<T> = std::result::Result<T, Error>;
