//! Error types for the client library.

use serde_json::Value;
use thiserror::Error;

use streamchat_common::SchemaError;

/// Message used when an in-band error carries no usable text.
pub const DEFAULT_STREAM_ERROR: &str = "Stream error";

/// Errors that can occur when talking to the agent server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP request failure.
    ///
    /// Covers DNS resolution, connection resets, timeouts and body read
    /// failures in the middle of a stream.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {reason}")]
    HttpError {
        /// Status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
    },

    /// A streaming response arrived without a body.
    #[error("Response body is not readable")]
    MissingBody,

    /// The server reported an error inside the stream.
    ///
    /// Terminates the stream; nothing is yielded for the failing frame.
    #[error("{0}")]
    StreamError(String),

    /// Client configuration issue, such as an unparsable base URL.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A payload failed schema validation.
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),
}

impl ClientError {
    /// Builds an HTTP error from a response status.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self::HttpError {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// Builds a stream error from the `error` field of an in-band frame.
    ///
    /// Uses `error.message` for objects and the value itself for strings,
    /// falling back to a generic message.
    #[must_use]
    pub fn from_stream_payload(error: &Value) -> Self {
        let message = match error {
            Value::String(message) if !message.is_empty() => message.clone(),
            Value::Object(fields) => fields
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_STREAM_ERROR)
                .to_string(),
            _ => DEFAULT_STREAM_ERROR.to_string(),
        };
        Self::StreamError(message)
    }

    /// Returns the HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the server answered with a non-2xx status.
    pub const fn is_http_error(&self) -> bool {
        matches!(self, Self::HttpError { .. })
    }

    /// Check if this error was reported inside a stream.
    pub const fn is_stream_error(&self) -> bool {
        matches!(self, Self::StreamError(_))
    }
}
