//! Stream event types carried by `data:` frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::items::{Annotation, ResponseOutputItem};

/// A decoded streaming frame.
///
/// Only [`StreamEvent::OutputItemDone`] and [`StreamEvent::Error`] contribute
/// items to a conversation. Delta and annotation events describe work in
/// progress on an item that is later delivered whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A completed output item.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// The completed item.
        item: ResponseOutputItem,
    },

    /// An incremental chunk of output text.
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Text appended to the item.
        delta: String,
        /// ID of the item being written.
        item_id: String,
        /// Position of the item in the response output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_index: Option<u32>,
        /// Monotonic event counter.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
        /// Position of the text block inside the item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_index: Option<u32>,
    },

    /// A citation attached to text already streamed.
    #[serde(rename = "response.output_text.annotation.added")]
    AnnotationAdded {
        /// The citation.
        annotation: Annotation,
        /// Position of the annotation in the text block.
        annotation_index: u32,
        /// Position of the text block inside the item.
        content_index: u32,
        /// ID of the annotated item.
        item_id: String,
        /// Position of the item in the response output.
        output_index: u32,
        /// Monotonic event counter.
        sequence_number: u64,
    },

    /// An error reported by the agent as a regular event.
    #[serde(rename = "error")]
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl StreamEvent {
    /// Decodes and validates a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidEvent`] if the payload is not a known
    /// event, or the validation error of a contained item.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let event: Self = serde_json::from_value(value).map_err(SchemaError::InvalidEvent)?;
        event.validate()?;
        Ok(event)
    }

    /// Checks semantic invariants of the event payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a completed item is invalid or an error event has
    /// an empty code.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Self::OutputItemDone { item } => item.validate(),
            Self::Error { code, .. } if code.is_empty() => Err(SchemaError::EmptyErrorCode),
            _ => Ok(()),
        }
    }

    /// Converts the event into the conversation item it carries, if any.
    #[must_use]
    pub fn into_item(self) -> Option<ResponseOutputItem> {
        match self {
            Self::OutputItemDone { item } => Some(item),
            Self::Error { code, message } => Some(ResponseOutputItem::error(code, message)),
            Self::OutputTextDelta { .. } | Self::AnnotationAdded { .. } => None,
        }
    }

    /// Returns the wire name of the event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OutputItemDone { .. } => "response.output_item.done",
            Self::OutputTextDelta { .. } => "response.output_text.delta",
            Self::AnnotationAdded { .. } => "response.output_text.annotation.added",
            Self::Error { .. } => "error",
        }
    }
}
