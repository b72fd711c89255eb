//! Typed errors for the packing domain (component C9).
//!
//! Two families: [`ValidationError`] for malformed input data, and
//! [`PackingError`] for failures raised while solving (see spec §7's error
//! table). `NoStackablePoint`/`NoStablePoint` are caught by the oracle's
//! caller and folded into per-block "unpacked" bookkeeping rather than
//! bubbled up as a process error; they are still named here so the oracle
//! can report them precisely to its caller.

use thiserror::Error;

/// Raised by the data model's constructors when a [`Block`](crate::model::Block) or
/// [`Container`](crate::model::Container) is given non-physical input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("invalid weight: {0}")]
    InvalidWeight(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failure reasons the placement oracle (C2) can report for a single block.
///
/// These are not fatal: the caller marks the block unpacked and continues
/// scoring, per spec §7.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum OracleFailure {
    /// The stable set was empty only because every candidate support was
    /// unstackable; relaxing that constraint would have produced a point.
    #[error("no stackable point found")]
    NoStackablePoint,
    /// No lattice point satisfies the overlap-zero + three-side-support
    /// predicate at all, even with the stackability constraint relaxed.
    #[error("no stable point found")]
    NoStablePoint,
}

/// Fatal, process-level errors surfaced to the solver façade and HTTP layer.
#[derive(Debug, Error)]
pub enum PackingError {
    #[error("initial assignment infeasible or timed out: {reason}")]
    InitialAssignmentFailed { reason: String },

    #[error("block '{name}' does not fit in any configured container")]
    BlockTooLargeForContainer { name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("operation cancelled")]
    CancelRequested,
}
