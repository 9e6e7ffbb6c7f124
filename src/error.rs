//! Error taxonomy for the CD-CAT engine.
//!
//! Configuration errors abort an invocation before any examinee session starts and
//! surface to Python as `ValueError`. Runtime errors are scoped to a single examinee
//! session; batch entry points catch them and record a status code plus the failing
//! step instead of aborting sibling sessions.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

/// Session status codes reported by the batch entry points.
pub const STATUS_OK: i32 = 0;
pub const STATUS_MALFORMED_RESPONSE: i32 = 1;
pub const STATUS_DEGENERATE_POSTERIOR: i32 = 2;
pub const STATUS_SEARCH_EXHAUSTED: i32 = 3;

#[derive(Debug, Clone, Error)]
pub enum CdcatError {
    #[error("unknown item-selection strategy '{0}' (expected GDI, JSD, PWKL, MPWKL, or random)")]
    UnknownStrategy(String),

    #[error("unknown gate '{0}' (expected AND or OR)")]
    UnknownGate(String),

    #[error("unknown pseudo-posterior weighting '{0}' (expected power2 or exponential)")]
    UnknownWeighting(String),

    #[error("number of attributes must lie in 1..=20 (got {0})")]
    InvalidAttributeCount(i64),

    #[error("latent-class count {0} is not a power of two")]
    ClassCount(usize),

    #[error("invalid pattern label '{0}': expected a non-empty string of 0s and 1s")]
    InvalidLabel(String),

    #[error("attribute prior has length {len}, expected {expected}")]
    PriorLength { len: usize, expected: usize },

    #[error("attribute prior must be non-negative and sum to 1 (sum = {sum})")]
    PriorMass { sum: f64 },

    #[error("max_items must be at least 1 (got {0})")]
    InvalidMaxItems(i64),

    #[error("precision cutoff must lie in (0, 1] (got {0})")]
    InvalidCutoff(f64),

    #[error("worker count {requested} is outside 1..={available} available execution units")]
    WorkerCount { requested: usize, available: usize },

    #[error("{context}: got {got}, expected {expected}")]
    ShapeMismatch {
        context: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("attribute {0} is not required by any item in the Q-matrix")]
    AttributeCoverage(usize),

    #[error("response {value} at step {step} (item {item}) is not in {{0, 1}}")]
    MalformedResponse { step: usize, item: usize, value: i32 },

    #[error("posterior mass vanished at step {step}")]
    DegeneratePosterior { step: usize },

    #[error("no remaining item discriminates between candidate patterns at step {step}")]
    SearchExhausted { step: usize },
}

impl CdcatError {
    /// True for errors scoped to one examinee session; batch runners catch these.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            CdcatError::MalformedResponse { .. }
                | CdcatError::DegeneratePosterior { .. }
                | CdcatError::SearchExhausted { .. }
        )
    }

    /// Status code recorded for a failed session in batch output.
    pub fn status_code(&self) -> i32 {
        match self {
            CdcatError::MalformedResponse { .. } => STATUS_MALFORMED_RESPONSE,
            CdcatError::DegeneratePosterior { .. } => STATUS_DEGENERATE_POSTERIOR,
            CdcatError::SearchExhausted { .. } => STATUS_SEARCH_EXHAUSTED,
            _ => STATUS_OK,
        }
    }

    /// Zero-based step at which a session error occurred.
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            CdcatError::MalformedResponse { step, .. }
            | CdcatError::DegeneratePosterior { step }
            | CdcatError::SearchExhausted { step } => Some(*step),
            _ => None,
        }
    }
}

impl From<CdcatError> for PyErr {
    fn from(err: CdcatError) -> PyErr {
        if err.is_session_error() {
            PyRuntimeError::new_err(err.to_string())
        } else {
            PyValueError::new_err(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_carry_status_and_step() {
        let err = CdcatError::MalformedResponse {
            step: 4,
            item: 7,
            value: 9,
        };
        assert!(err.is_session_error());
        assert_eq!(err.status_code(), STATUS_MALFORMED_RESPONSE);
        assert_eq!(err.failed_step(), Some(4));
    }

    #[test]
    fn configuration_errors_have_no_step() {
        let err = CdcatError::UnknownStrategy("bogus".into());
        assert!(!err.is_session_error());
        assert_eq!(err.failed_step(), None);
    }
}
