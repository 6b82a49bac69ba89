//! Error types for network construction and validation.

use thiserror::Error;

/// Errors raised while assembling or validating a [`crate::Network`].
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// Structural data problems (empty network, missing slack, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// An element references an index outside the network tables
    #[error("index error: {0}")]
    Index(String),
}

/// Convenience alias for Results using NetworkError.
pub type NetResult<T> = Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::Validation("no buses".into());
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("no buses"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> NetResult<()> {
            Err(NetworkError::Index("bus 9 out of range".into()))
        }

        fn outer() -> NetResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
