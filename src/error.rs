//! Error types for the change stream tool.
//!
//! This module provides a unified error type for all operations in the crate.

use mongodb::bson;
use thiserror::Error;

/// Represents errors that can occur while configuring or consuming a change stream.
///
/// Configuration errors are raised before any network I/O; the remaining
/// variants come from the driver or the output sink while streaming. None of
/// them are retried.
#[derive(Debug, Error)]
pub enum MongoStreamError {
    /// Both `--start-at` and `--resume-token` were supplied.
    #[error("Cannot use both start-at and resume-token")]
    ConflictingStartCondition,

    /// The `--start-at` value does not match `YYYY-MM-DD HH:MM:SS`.
    #[error("invalid start-at timestamp: {0}")]
    InvalidStartAt(String),

    /// The `--pipeline` value is not a single JSON object.
    #[error("invalid pipeline: {0}")]
    InvalidPipelineSyntax(String),

    /// The resume token could not be turned into a driver token.
    #[error("invalid resume token: {0}")]
    InvalidResumeToken(String),

    /// The client could not be created or the deployment did not answer.
    #[error("failed to connect: {0}")]
    ConnectionFailure(#[source] mongodb::error::Error),

    /// The driver or server ended the stream with an error.
    #[error("change stream failed: {0}")]
    StreamFailure(#[from] mongodb::error::Error),

    /// A change event could not be decoded.
    #[error("malformed change event: {0}")]
    SerializationFailure(#[from] bson::de::Error),

    /// Writing to the output sink failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl MongoStreamError {
    /// Whether the error was detected while validating the configuration,
    /// before any connection was attempted.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConflictingStartCondition
                | Self::InvalidStartAt(_)
                | Self::InvalidPipelineSyntax(_)
                | Self::InvalidResumeToken(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_formatting() {
        let err = MongoStreamError::ConflictingStartCondition;
        assert_eq!(format!("{}", err), "Cannot use both start-at and resume-token");

        let err = MongoStreamError::InvalidPipelineSyntax("expected value".into());
        assert_eq!(format!("{}", err), "invalid pipeline: expected value");
    }

    #[test]
    fn test_config_errors() {
        assert!(MongoStreamError::ConflictingStartCondition.is_config_error());
        assert!(MongoStreamError::InvalidStartAt("x".into()).is_config_error());
        assert!(MongoStreamError::InvalidPipelineSyntax("x".into()).is_config_error());
        assert!(MongoStreamError::InvalidResumeToken("x".into()).is_config_error());

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(!MongoStreamError::from(io).is_config_error());
    }

    #[test]
    fn test_from_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: MongoStreamError = io.into();
        assert!(matches!(err, MongoStreamError::Output(_)));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_from_bson_error() {
        let doc = mongodb::bson::doc! { "operationType": 1 };
        let decode: Result<String, _> = bson::from_bson(doc.get("operationType").cloned().unwrap());
        let err: MongoStreamError = decode.unwrap_err().into();
        assert!(matches!(err, MongoStreamError::SerializationFailure(_)));
    }
}
