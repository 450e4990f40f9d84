//! Error types for shape matching

use thiserror::Error;

/// Everything that can make a match call fail.
///
/// All variants are deterministic precondition failures: retrying with the
/// same input gives the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("feature vector has {got} values but the histogram has {expected} bands")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid binning: {0}")]
    InvalidBinning(String),

    #[error("histograms have different sizes: {first} vs {second} bins")]
    BinningMismatch { first: usize, second: usize },

    #[error("descriptor sets differ in length: {first} vs {second}")]
    HistogramCountMismatch { first: usize, second: usize },

    #[error("cost matrix is {rows}x{cols}, expected a square matrix")]
    NonSquareCostMatrix { rows: usize, cols: usize },

    #[error("cost matrix entry ({row}, {col}) is not finite")]
    NonFiniteCost { row: usize, col: usize },

    #[error("assignment solver hit its deadline after {steps} steps")]
    Timeout { steps: usize },

    #[error("assignment solver was cancelled")]
    Cancelled,

    #[error("assignment solver finished with row {row} unassigned")]
    IncompleteAssignment { row: usize },

    #[error("{which} shape has no points")]
    EmptyShape { which: &'static str },

    #[error("spline needs paired points: {sources} sources vs {targets} targets")]
    CorrespondenceMismatch { sources: usize, targets: usize },

    #[error("thin-plate spline system for {points} points is singular")]
    SingularSystem { points: usize },

    #[error("affine part of the spline fit is degenerate")]
    DegenerateAffine,
}

pub type Result<T> = std::result::Result<T, MatchError>;
