//! Error taxonomy for the alignment core.
//!
//! Invalid input is rejected eagerly with a descriptive message before any
//! alignment is attempted. Degenerate-but-legal input (either side empty) is
//! not an error — see `align::hybrid` and friends, which return a
//! well-formed `AlignmentResult` instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignError {
    #[error("invalid score: {0}")]
    InvalidScore(String),

    #[error("invalid performance: {0}")]
    InvalidPerformance(String),

    #[error("alignment matrix too large: {cells} cells exceeds budget of {budget}")]
    TooLarge { cells: u64, budget: u64 },

    /// Never returned as `Err`: the real-time evaluator's ring buffer was
    /// full and tail-dropped an event. Carried as a non-fatal diagnostic
    /// through `RealTimeEvaluator::on_error_detected` instead.
    #[error("ring buffer full, event dropped")]
    RingBufferFull,
}

pub type Result<T> = std::result::Result<T, AlignError>;
