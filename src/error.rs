//! Error types for the folding execution engine
//!
//! Every fallible operation in the crate returns [`Result`], whose error
//! side is [`BenchError`]. Variants map one-to-one onto the failure classes
//! a benchmark driver needs to tell apart:
//!
//! - [`BenchError::Shape`] - rank/size preconditions in fold/unfold
//! - [`BenchError::Config`] - invalid scheduling or handler parameters
//! - [`BenchError::Validation`] - dtype/rank mismatch caught before dispatch
//! - [`BenchError::UnitComputation`] / [`BenchError::UnitFailures`] - the
//!   opaque unit computation failed
//! - [`BenchError::Stats`] - mismatched or missing timing labels
//! - [`BenchError::NotReady`] - handler used outside the `Ready` state

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error raised by a unit computation callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnitError {
    message: String,
}

impl UnitError {
    /// Create a new unit error from a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A single failed unit in a thread-parallel run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Position of the unit along the folded batch axis
    pub index: usize,
    /// What went wrong
    pub error: UnitError,
}

/// Crate-wide error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BenchError {
    /// Rank or size precondition violated while folding/unfolding
    #[error("shape error: {reason}")]
    Shape {
        /// Human-readable description
        reason: String,
    },

    /// Invalid configuration or scheduling parameter
    #[error("config error: {reason}")]
    Config {
        /// Human-readable description
        reason: String,
    },

    /// Input rejected by a backend before any work was dispatched
    #[error("validation error: {reason}")]
    Validation {
        /// Human-readable description
        reason: String,
    },

    /// The unit computation failed on a chunk (vectorized backend)
    #[error("unit computation failed at index {index}: {source}")]
    UnitComputation {
        /// First folded-batch index covered by the failing call
        index: usize,
        /// Error reported by the callback
        source: UnitError,
    },

    /// One or more units failed in a thread-parallel run
    #[error("{} unit(s) failed at indices {:?}", failures.len(), failure_indices(failures))]
    UnitFailures {
        /// Every failing unit, ascending by index
        failures: Vec<UnitFailure>,
    },

    /// Timing labels could not be paired
    #[error("stats error: {reason}")]
    Stats {
        /// Human-readable description
        reason: String,
    },

    /// Handler used outside the `Ready` state
    #[error("handler not ready (state: {state})")]
    NotReady {
        /// State the handler was in
        state: String,
    },
}

impl BenchError {
    /// Indices of failed units, if this is an aggregate unit failure
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            Self::UnitFailures { failures } => failure_indices(failures),
            Self::UnitComputation { index, .. } => vec![*index],
            _ => Vec::new(),
        }
    }
}

fn failure_indices(failures: &[UnitFailure]) -> Vec<usize> {
    failures.iter().map(|f| f.index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_failures_display_lists_indices() {
        let err = BenchError::UnitFailures {
            failures: vec![
                UnitFailure {
                    index: 2,
                    error: UnitError::new("nan in trace"),
                },
                UnitFailure {
                    index: 7,
                    error: UnitError::new("boom"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 unit(s)"));
        assert!(msg.contains("[2, 7]"));
        assert_eq!(err.failed_indices(), vec![2, 7]);
    }

    #[test]
    fn test_shape_error_display() {
        let err = BenchError::Shape {
            reason: "rank 2 < 3".to_string(),
        };
        assert_eq!(err.to_string(), "shape error: rank 2 < 3");
        assert!(err.failed_indices().is_empty());
    }

    #[test]
    fn test_unit_computation_error_keeps_source() {
        let err = BenchError::UnitComputation {
            index: 6,
            source: UnitError::new("diverged"),
        };
        assert_eq!(err.failed_indices(), vec![6]);
        assert!(err.to_string().contains("diverged"));
    }
}
