//! # streamchat-common
//!
//! Shared types for talking to a streaming agent backend.
//!
//! This crate defines the wire schema and its validation:
//! - Conversation items, a tagged union over messages, tool calls, tool
//!   outputs, reasoning traces and errors
//! - Stream events carried by `data:` frames
//! - Request and response bodies
//! - Client configuration
//!
//! ## Example
//!
//! ```
//! use streamchat_common::{ResponseOutputItem, StreamEvent};
//! use serde_json::json;
//!
//! let event = StreamEvent::from_value(json!({
//!     "type": "response.output_item.done",
//!     "item": {"type": "reasoning", "id": "r1", "summary": "thinking"}
//! }))?;
//!
//! let item = event.into_item();
//! assert!(matches!(item, Some(ResponseOutputItem::Reasoning(_))));
//! # Ok::<(), streamchat_common::SchemaError>(())
//! ```

/// Client configuration and validation modes.
pub mod config;
/// Schema decoding and validation errors.
pub mod error;
/// Stream event types.
pub mod events;
/// Conversation item types.
///
/// Provides the output item union and the input items sent as history.
pub mod items;
pub mod request;

pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_HEALTH_TIMEOUT, ValidationMode, normalize_base_url,
};
pub use error::SchemaError;
pub use events::StreamEvent;
pub use items::{
    Annotation, AnnotationKind, AssistantRole, ErrorItem, InputRole, OutputMessage, OutputText,
    Reasoning, ResponseInputItem, ResponseInputMessage, ResponseOutputItem, ToolCall,
    ToolCallOutput, ToolCallStatus, ToolDialect,
};
pub use request::{RequestOptions, ResponsesAgentRequest, ResponsesResponse};
