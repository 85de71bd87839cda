//! Conversation item types.
//!
//! A conversation is an ordered list of [`ResponseInputItem`]s: user-authored
//! [`ResponseInputMessage`]s interleaved with the [`ResponseOutputItem`]s the
//! agent produced. Output items are a tagged union discriminated by the JSON
//! `type` field, with an explicit [`ResponseOutputItem::Unknown`] variant so
//! that unrecognized discriminants survive decoding.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

// ============================================================================
// Roles
// ============================================================================

/// Role of an output message. The backend only ever produces assistant messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantRole {
    /// Assistant-authored message.
    #[default]
    Assistant,
}

/// Role of an input message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    /// End-user input.
    User,
    /// Developer instructions.
    Developer,
    /// System prompt.
    System,
}

// ============================================================================
// Text and Annotations
// ============================================================================

/// Kind of citation carried by an [`Annotation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Citation of an uploaded file.
    FileCitation,
    /// Citation of a web page.
    UrlCitation,
    /// Citation of a file inside a container.
    ContainerFileCitation,
}

/// A citation attached to a span of output text.
///
/// `start_index..end_index` is a half-open byte range into the owning
/// [`OutputText::text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Citation kind.
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Start of the annotated span (inclusive).
    pub start_index: usize,
    /// End of the annotated span (exclusive).
    pub end_index: usize,
    /// Cited text, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Cited URL for URL citations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cited file ID for file citations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Container file ID for container citations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_file_id: Option<String>,
}

/// A block of text inside an output message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputText {
    /// Content block type as sent by the backend (usually `"text"`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The text itself.
    pub text: String,
    /// Citations over spans of `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

impl OutputText {
    /// Creates an unannotated text block.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: text.into(),
            annotations: None,
        }
    }

    /// Checks that every annotation span lies inside the text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::AnnotationOutOfBounds`] for the first span
    /// violating `start_index <= end_index <= text.len()`.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let len = self.text.len();
        for annotation in self.annotations.iter().flatten() {
            if annotation.start_index > annotation.end_index || annotation.end_index > len {
                return Err(SchemaError::AnnotationOutOfBounds {
                    start: annotation.start_index,
                    end: annotation.end_index,
                    len,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Output Item Payloads
// ============================================================================

/// An assistant message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMessage {
    /// Message ID.
    pub id: String,
    /// Always [`AssistantRole::Assistant`].
    #[serde(default)]
    pub role: AssistantRole,
    /// Text blocks in order.
    pub content: Vec<OutputText>,
    /// Fields this client does not model, passed back to the backend as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OutputMessage {
    /// Joins all text blocks with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Execution status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    /// Not yet executed.
    Pending,
    /// Executed successfully.
    Completed,
    /// Execution failed.
    Failed,
}

/// Wire vocabulary of a tool item.
///
/// Backends name tool items either `tool_call` / `tool_call_output` (keyed by
/// `tool_call_id`) or `function_call` / `function_call_output` (keyed by
/// `call_id`). Items are sent back in the vocabulary they arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolDialect {
    /// `tool_call`, `tool_call_output`, `tool_call_id`.
    #[default]
    Tool,
    /// `function_call`, `function_call_output`, `call_id`.
    Function,
}

impl ToolDialect {
    fn from_tag(tag: &str) -> Self {
        if tag.starts_with("function_") {
            Self::Function
        } else {
            Self::Tool
        }
    }

    /// Discriminant of a call in this vocabulary.
    #[must_use]
    pub const fn call_tag(self) -> &'static str {
        match self {
            Self::Tool => "tool_call",
            Self::Function => "function_call",
        }
    }

    /// Discriminant of a call output in this vocabulary.
    #[must_use]
    pub const fn output_tag(self) -> &'static str {
        match self {
            Self::Tool => "tool_call_output",
            Self::Function => "function_call_output",
        }
    }
}

/// A tool (function) call requested by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID.
    pub id: String,
    /// Name of the tool.
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
    /// Execution status, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    /// Vocabulary the call arrived in.
    #[serde(skip)]
    pub dialect: ToolDialect,
    /// Fields this client does not model, passed back to the backend as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolCall {
    /// Parses `arguments` into a JSON object, if it holds one.
    #[must_use]
    pub fn parsed_arguments(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Output produced by executing a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallOutput {
    /// ID of the call this output answers.
    #[serde(alias = "call_id")]
    pub tool_call_id: String,
    /// Tool output.
    pub output: String,
    /// Error text if the tool failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Vocabulary the output arrived in.
    #[serde(skip)]
    pub dialect: ToolDialect,
    /// Fields this client does not model, passed back to the backend as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reasoning trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    /// Reasoning item ID.
    pub id: String,
    /// Short summary.
    pub summary: String,
    /// Full reasoning text, if exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Fields this client does not model, passed back to the backend as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An error surfaced as a conversation item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    /// Fields this client does not model, passed back to the backend as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorItem {
    /// Creates an error item without details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Output Item Union
// ============================================================================

/// Discriminants decoded into typed variants.
const KNOWN_TAGS: &[&str] = &[
    "message",
    "tool_call",
    "function_call",
    "tool_call_output",
    "function_call_output",
    "reasoning",
    "error",
];

/// An item produced by the agent.
///
/// Serialized with a `type` discriminant: `message`, `tool_call`,
/// `tool_call_output`, `reasoning` or `error`. Tool items decoded from the
/// `function_call` / `function_call_output` vocabulary serialize back in it
/// (see [`ToolDialect`]), and unmodelled fields are kept in each payload's
/// `extra` map.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutputItem {
    /// Assistant message.
    Message(OutputMessage),
    /// Tool call request.
    ToolCall(ToolCall),
    /// Tool call result.
    ToolCallOutput(ToolCallOutput),
    /// Reasoning trace.
    Reasoning(Reasoning),
    /// Error.
    Error(ErrorItem),
    /// An item this client could not type, kept as raw JSON.
    Unknown(Value),
}

impl ResponseOutputItem {
    /// Creates an error item.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorItem::new(code, message))
    }

    /// Returns the `type` discriminant of this item.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::ToolCall(_) => "tool_call",
            Self::ToolCallOutput(_) => "tool_call_output",
            Self::Reasoning(_) => "reasoning",
            Self::Error(_) => "error",
            Self::Unknown(raw) => raw.get("type").and_then(Value::as_str).unwrap_or("unknown"),
        }
    }

    /// Decodes a JSON value by its discriminant without semantic checks.
    ///
    /// Unrecognized discriminants decode to [`ResponseOutputItem::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value has no string `type` field or does not
    /// match the shape of the variant it names.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingType)?
            .to_owned();

        if !KNOWN_TAGS.contains(&kind.as_str()) {
            return Ok(Self::Unknown(value));
        }

        // The discriminant is carried by the variant, not by `extra`.
        let mut body = value;
        if let Some(fields) = body.as_object_mut() {
            fields.remove("type");
        }

        let invalid = |source| SchemaError::InvalidItem {
            kind: kind.clone(),
            source,
        };
        let dialect = ToolDialect::from_tag(&kind);

        let item = match kind.as_str() {
            "message" => Self::Message(serde_json::from_value(body).map_err(invalid)?),
            "tool_call" | "function_call" => {
                let mut call: ToolCall = serde_json::from_value(body).map_err(invalid)?;
                call.dialect = dialect;
                Self::ToolCall(call)
            }
            "tool_call_output" | "function_call_output" => {
                let mut output: ToolCallOutput = serde_json::from_value(body).map_err(invalid)?;
                output.dialect = dialect;
                Self::ToolCallOutput(output)
            }
            "reasoning" => Self::Reasoning(serde_json::from_value(body).map_err(invalid)?),
            _ => Self::Error(serde_json::from_value(body).map_err(invalid)?),
        };

        Ok(item)
    }

    /// Decodes and validates a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the item breaks an invariant.
    pub fn decode(value: Value) -> Result<Self, SchemaError> {
        let item = Self::from_value(value)?;
        item.validate()?;
        Ok(item)
    }

    /// Best-effort decoding that never fails.
    ///
    /// Values that cannot be typed are kept as [`ResponseOutputItem::Unknown`].
    #[must_use]
    pub fn lenient(value: Value) -> Self {
        match Self::from_value(value.clone()) {
            Ok(item) => item,
            Err(e) => {
                log::debug!("Keeping untyped item: {e}");
                Self::Unknown(value)
            }
        }
    }

    /// Checks semantic invariants of a decoded item.
    ///
    /// # Errors
    ///
    /// Returns an error for annotation spans outside their text, error items
    /// with an empty code, and [`ResponseOutputItem::Unknown`] items.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Self::Message(message) => message.content.iter().try_for_each(OutputText::validate),
            Self::Error(error) if error.code.is_empty() => Err(SchemaError::EmptyErrorCode),
            Self::Unknown(_) => Err(SchemaError::UnknownItemType(self.kind().to_string())),
            _ => Ok(()),
        }
    }
}

/// Serialization helper that prefixes a payload with its `type` discriminant.
#[derive(Serialize)]
struct Tagged<'a, T> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

/// Wire shape of a `function_call_output`, keyed by `call_id`.
#[derive(Serialize)]
struct FunctionCallOutput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    call_id: &'a str,
    output: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl Serialize for ResponseOutputItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Message(body) => Tagged {
                kind: "message",
                body,
            }
            .serialize(serializer),
            Self::ToolCall(body) => Tagged {
                kind: body.dialect.call_tag(),
                body,
            }
            .serialize(serializer),
            Self::ToolCallOutput(body) => match body.dialect {
                ToolDialect::Tool => Tagged {
                    kind: ToolDialect::Tool.output_tag(),
                    body,
                }
                .serialize(serializer),
                ToolDialect::Function => FunctionCallOutput {
                    kind: ToolDialect::Function.output_tag(),
                    call_id: &body.tool_call_id,
                    output: &body.output,
                    error: body.error.as_deref(),
                    extra: &body.extra,
                }
                .serialize(serializer),
            },
            Self::Reasoning(body) => Tagged {
                kind: "reasoning",
                body,
            }
            .serialize(serializer),
            Self::Error(body) => Tagged {
                kind: "error",
                body,
            }
            .serialize(serializer),
            Self::Unknown(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ResponseOutputItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<ErrorItem> for ResponseOutputItem {
    fn from(error: ErrorItem) -> Self {
        Self::Error(error)
    }
}

// ============================================================================
// Input Items
// ============================================================================

/// A message authored on the client side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInputMessage {
    /// Author role.
    pub role: InputRole,
    /// Plain text content.
    pub content: String,
}

impl ResponseInputMessage {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::User,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::System,
            content: content.into(),
        }
    }

    /// Creates a developer message.
    pub fn developer(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::Developer,
            content: content.into(),
        }
    }
}

/// One entry of the conversation history sent back to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseInputItem {
    /// Client-authored message.
    Input(ResponseInputMessage),
    /// Agent-authored item re-fed as history.
    Output(ResponseOutputItem),
}

impl ResponseInputItem {
    /// Returns the agent-authored item, if this is one.
    #[must_use]
    pub const fn as_output(&self) -> Option<&ResponseOutputItem> {
        match self {
            Self::Output(item) => Some(item),
            Self::Input(_) => None,
        }
    }

    /// Returns the client-authored message, if this is one.
    #[must_use]
    pub const fn as_input(&self) -> Option<&ResponseInputMessage> {
        match self {
            Self::Input(message) => Some(message),
            Self::Output(_) => None,
        }
    }

    /// Returns `true` for error items.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Output(ResponseOutputItem::Error(_)))
    }
}

impl Serialize for ResponseInputItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Input(body) => Tagged {
                kind: "message",
                body,
            }
            .serialize(serializer),
            Self::Output(item) => item.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ResponseInputItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_input_message = value.get("type").and_then(Value::as_str) == Some("message")
            && value.get("content").is_some_and(Value::is_string);

        if is_input_message {
            serde_json::from_value(value)
                .map(Self::Input)
                .map_err(serde::de::Error::custom)
        } else {
            ResponseOutputItem::from_value(value)
                .map(Self::Output)
                .map_err(serde::de::Error::custom)
        }
    }
}

impl From<ResponseInputMessage> for ResponseInputItem {
    fn from(message: ResponseInputMessage) -> Self {
        Self::Input(message)
    }
}

impl From<ResponseOutputItem> for ResponseInputItem {
    fn from(item: ResponseOutputItem) -> Self {
        Self::Output(item)
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn annotation_validation_matches_bounds(
            text in ".{0,32}",
            start in 0usize..48,
            end in 0usize..48,
        ) {
            let block = OutputText {
                kind: None,
                text: text.clone(),
                annotations: Some(vec![Annotation {
                    kind: AnnotationKind::UrlCitation,
                    start_index: start,
                    end_index: end,
                    text: None,
                    url: None,
                    file_id: None,
                    container_file_id: None,
                }]),
            };
            let in_bounds = start <= end && end <= text.len();
            prop_assert_eq!(block.validate().is_ok(), in_bounds);
        }
    }
}
