//! Schema errors raised while decoding or validating conversation items.

use thiserror::Error;

/// Errors produced by the schema/validation layer.
///
/// Structural failures come from serde when a payload does not match the
/// shape of its variant. Semantic failures are raised by `validate()` on
/// payloads that decoded but break an invariant.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// The payload has no string `type` discriminant.
    #[error("Missing `type` discriminant")]
    MissingType,

    /// The payload has a discriminant but does not match that variant's shape.
    #[error("Invalid `{kind}` item: {source}")]
    InvalidItem {
        /// Discriminant of the item that failed to decode.
        kind: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The payload is not a recognized stream event.
    #[error("Invalid stream event: {0}")]
    InvalidEvent(#[source] serde_json::Error),

    /// The payload is not a valid response object.
    #[error("Invalid response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    /// The discriminant names a variant this client does not know.
    #[error("Unrecognized item type: {0}")]
    UnknownItemType(String),

    /// An annotation span falls outside its text.
    #[error("Annotation span {start}..{end} is out of bounds for text of length {len}")]
    AnnotationOutOfBounds {
        /// Start offset (inclusive).
        start: usize,
        /// End offset (exclusive).
        end: usize,
        /// Byte length of the annotated text.
        len: usize,
    },

    /// An error item carries an empty code.
    #[error("Error item has an empty code")]
    EmptyErrorCode,
}
