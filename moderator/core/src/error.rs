//! Error types for the moderator core

use std::path::PathBuf;

use thiserror::Error;

use crate::transcript::MessageId;

/// Failures talking to the inference server
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP request could not be sent or its body could not be read
    #[error("failed to reach inference server: {0}")]
    Http(#[from] reqwest::Error),

    /// The server could not be reached (reported without an HTTP error value)
    #[error("inference server unavailable: {0}")]
    Unavailable(String),

    /// The server answered with a non-success status
    #[error("inference server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The response stream failed mid-generation
    #[error("response stream failed: {0}")]
    Stream(String),

    /// The stream closed before a terminal fragment arrived
    #[error("response stream ended before the final fragment")]
    Incomplete,
}

/// Illegal transcript mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// No message with this ID exists
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// The message is finalized or is not the active message
    #[error("message {0} is read-only")]
    ReadOnly(MessageId),
}

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("{0}")]
    Invalid(String),
}

/// Reasons a discussion stopped early
#[derive(Debug, Error)]
pub enum DiscussionError {
    /// A turn's generate call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The transcript rejected a mutation
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 404,
            body: "model 'x' not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "inference server returned 404: model 'x' not found"
        );
        assert_eq!(
            BackendError::Incomplete.to_string(),
            "response stream ended before the final fragment"
        );
    }

    #[test]
    fn test_discussion_error_is_transparent() {
        let err = DiscussionError::from(BackendError::Stream("connection reset".to_string()));
        assert_eq!(err.to_string(), "response stream failed: connection reset");
    }
}
