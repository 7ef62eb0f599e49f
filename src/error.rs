//! Error types for the anofox-anomaly library.

use thiserror::Error;

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors that can occur during an anomaly detection run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Too few points for decomposition or scoring.
    #[error("insufficient data for decomposition: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The series (or its score distribution) has zero variance.
    #[error("cannot score constant series")]
    ConstantSeries,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required column is not present in the raw table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = DetectionError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = DetectionError::InsufficientData { needed: 24, got: 0 };
        assert_eq!(
            err.to_string(),
            "insufficient data for decomposition: need at least 24, got 0"
        );

        let err = DetectionError::ConstantSeries;
        assert_eq!(err.to_string(), "cannot score constant series");

        let err = DetectionError::MissingColumn("Start Time".to_string());
        assert_eq!(err.to_string(), "missing column: Start Time");

        let err = DetectionError::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = DetectionError::ConstantSeries;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
