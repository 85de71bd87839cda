//! Request and response bodies for the `/invocations` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::error::SchemaError;
use crate::items::{ErrorItem, ResponseInputItem, ResponseOutputItem};

/// Backend-specific request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Ask the agent to attach its execution trace to the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_trace: Option<bool>,
}

/// Body of a request to the agent.
///
/// # Examples
///
/// ```
/// use streamchat_common::{ResponseInputMessage, ResponsesAgentRequest};
///
/// let request = ResponsesAgentRequest::builder()
///     .input(vec![ResponseInputMessage::user("Hello").into()])
///     .build();
/// assert!(request.stream.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct ResponsesAgentRequest {
    /// Conversation history in chronological order, newest last.
    pub input: Vec<ResponseInputItem>,
    /// Whether the reply should be streamed.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Backend-specific options.
    #[builder(default, setter(strip_option))]
    #[serde(
        rename = "databricks_options",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub options: Option<RequestOptions>,
}

impl ResponsesAgentRequest {
    /// Returns a copy of this request with streaming forced on.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }

    /// Returns whether streaming was requested.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Body of a non-streaming reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesResponse {
    /// Response ID.
    pub id: String,
    /// Output items in the order the agent produced them.
    pub output: Vec<ResponseOutputItem>,
    /// Error reported alongside the output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorItem>,
}

impl ResponsesResponse {
    /// Decodes and validates a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is malformed or any output item is invalid.
    pub fn decode(value: &Value) -> Result<Self, SchemaError> {
        let response = Self::deserialize(value).map_err(SchemaError::InvalidResponse)?;
        response.validate()?;
        Ok(response)
    }

    /// Checks every output item and the trailing error.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.output.iter().try_for_each(ResponseOutputItem::validate)?;
        if self.error.as_ref().is_some_and(|e| e.code.is_empty()) {
            return Err(SchemaError::EmptyErrorCode);
        }
        Ok(())
    }

    /// Best-effort decoding of a response that failed validation.
    ///
    /// Output items that cannot be typed are kept as
    /// [`ResponseOutputItem::Unknown`]; a missing `id` becomes empty and a
    /// malformed `error` is dropped.
    #[must_use]
    pub fn from_value_lenient(value: &Value) -> Self {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let output = value
            .get("output")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .cloned()
                    .map(ResponseOutputItem::lenient)
                    .collect()
            })
            .unwrap_or_default();

        let error = value
            .get("error")
            .cloned()
            .and_then(|e| serde_json::from_value(e).ok());

        Self { id, output, error }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::items::ResponseInputMessage;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = ResponsesAgentRequest::builder()
            .input(vec![
                ResponseInputMessage::system("be brief").into(),
                ResponseInputMessage::user("hi").into(),
            ])
            .options(RequestOptions {
                return_trace: Some(true),
            })
            .build()
            .streaming();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "input": [
                    {"type": "message", "role": "system", "content": "be brief"},
                    {"type": "message", "role": "user", "content": "hi"}
                ],
                "stream": true,
                "databricks_options": {"return_trace": true}
            })
        );
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = ResponsesAgentRequest::builder().input(vec![]).build();
        assert!(!request.is_streaming());
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"input": []}));
    }

    #[test]
    fn test_response_decode_preserves_order() {
        let response = ResponsesResponse::decode(&json!({
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "id": "r1", "summary": "thinking"},
                {"type": "tool_call", "id": "c1", "name": "search", "arguments": "{}"},
                {"type": "tool_call_output", "tool_call_id": "c1", "output": "found"},
                {"type": "message", "id": "m1", "role": "assistant", "content": [{"text": "done"}]}
            ]
        }))
        .unwrap();

        let kinds: Vec<_> = response.output.iter().map(ResponseOutputItem::kind).collect();
        assert_eq!(kinds, ["reasoning", "tool_call", "tool_call_output", "message"]);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_with_unknown_item_fails_validation() {
        let value = json!({
            "id": "resp_1",
            "output": [{"type": "web_search_call", "id": "ws_1"}]
        });
        assert!(ResponsesResponse::decode(&value).is_err());

        let lenient = ResponsesResponse::from_value_lenient(&value);
        assert_eq!(lenient.id, "resp_1");
        assert!(matches!(lenient.output[0], ResponseOutputItem::Unknown(_)));
    }

    #[test]
    fn test_lenient_tolerates_missing_fields() {
        let lenient = ResponsesResponse::from_value_lenient(&json!({"error": "nope"}));
        assert!(lenient.id.is_empty());
        assert!(lenient.output.is_empty());
        assert!(lenient.error.is_none());
    }
}
