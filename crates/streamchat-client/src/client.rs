//! HTTP transport for the agent server.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use streamchat_common::{ClientConfig, ResponsesAgentRequest, ResponsesResponse, normalize_base_url};

use crate::decoder::decode_lines;
use crate::error::ClientError;
use crate::stream::{ItemStream, parse_stream};

/// Path of the agent invocation endpoint.
pub const INVOCATIONS_PATH: &str = "/invocations";

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Operations offered by an agent backend.
///
/// The conversation controller is generic over this trait so that tests can
/// substitute an in-memory backend.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Sends a request and waits for the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-2xx status, or the body is not JSON.
    async fn send_message(
        &self,
        request: &ResponsesAgentRequest,
    ) -> Result<ResponsesResponse, ClientError>;

    /// Sends a request with streaming enabled and returns its output items.
    ///
    /// The returned stream stops early once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-2xx status, or the response has no body.
    async fn stream_message(
        &self,
        request: &ResponsesAgentRequest,
        cancel: CancellationToken,
    ) -> Result<ItemStream, ClientError>;

    /// Probes the server. Never fails; any error reads as unhealthy.
    async fn health_check(&self) -> bool;
}

/// Client for an agent server speaking the `/invocations` protocol.
///
/// No retries are performed at any level.
pub struct AgentClient {
    http: reqwest::Client,
    base_url: RwLock<String>,
    config: ClientConfig,
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentClient {
    /// Create a new client from configuration.
    ///
    /// The request timeout, when configured, bounds whole responses
    /// including streamed bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::ConfigurationError(e.to_string()))?;

        let http = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            None => reqwest::Client::builder().build()?,
        };

        Ok(Self {
            http,
            base_url: RwLock::new(normalize_base_url(&config.base_url)),
            config,
        })
    }

    /// Returns the current base URL.
    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the base URL. Requests already in flight are unaffected.
    pub fn update_base_url(&self, base_url: &str) {
        let base_url = normalize_base_url(base_url);
        debug!("Updating base URL to {base_url}");
        *self
            .base_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = base_url;
    }

    /// Returns the client configuration.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<String, ClientError> {
        let url = format!("{}{path}", self.base_url());

        // Validate URL construction
        reqwest::Url::parse(&url)
            .map_err(|e| ClientError::ConfigurationError(format!("Invalid URL '{url}': {e}")))?;

        Ok(url)
    }

    fn check_status(status: StatusCode) -> Result<(), ClientError> {
        if status.is_success() {
            return Ok(());
        }
        let error = ClientError::from_status(status);
        error!("Agent request failed: {error}");
        Err(error)
    }
}

#[async_trait]
impl AgentApi for AgentClient {
    async fn send_message(
        &self,
        request: &ResponsesAgentRequest,
    ) -> Result<ResponsesResponse, ClientError> {
        let url = self.endpoint(INVOCATIONS_PATH)?;

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(request)?)
            .send()
            .await?;

        Self::check_status(response.status())?;

        let response_text = response.text().await?;
        debug!("Raw agent response: {response_text}");
        let body: Value = serde_json::from_str(&response_text)?;

        match ResponsesResponse::decode(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!("Response validation failed: {e}");
                Ok(ResponsesResponse::from_value_lenient(&body))
            }
        }
    }

    async fn stream_message(
        &self,
        request: &ResponsesAgentRequest,
        cancel: CancellationToken,
    ) -> Result<ItemStream, ClientError> {
        let url = self.endpoint(INVOCATIONS_PATH)?;
        let request = request.clone().streaming();

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        Self::check_status(status)?;

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            error!("Streaming response from {url} has no body");
            return Err(ClientError::MissingBody);
        }

        debug!("Stream connection opened to {url}");
        let lines = decode_lines(response.bytes_stream());
        Ok(parse_stream(lines, self.config.validation, cancel))
    }

    async fn health_check(&self) -> bool {
        let Ok(url) = self.endpoint(HEALTH_PATH) else {
            return false;
        };

        match self
            .http
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use streamchat_common::{ResponseInputMessage, ResponseOutputItem, ValidationMode};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(base_url: &str) -> AgentClient {
        AgentClient::new(ClientConfig::new(base_url)).unwrap()
    }

    fn create_test_request() -> ResponsesAgentRequest {
        ResponsesAgentRequest::builder()
            .input(vec![ResponseInputMessage::user("Hello").into()])
            .build()
    }

    fn sse_body(frames: &[&str]) -> String {
        frames.iter().map(|f| format!("{f}\n")).collect()
    }

    async fn mount_stream(server: &MockServer, body: String) {
        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "input": [{"type": "message", "role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "resp_1",
                "output": [
                    {"type": "reasoning", "id": "r1", "summary": "thinking", "content": "long"},
                    {"type": "tool_call", "id": "c1", "name": "search", "arguments": "{\"q\":1}", "status": "completed"},
                    {"type": "tool_call_output", "tool_call_id": "c1", "output": "found"},
                    {"type": "message", "id": "m1", "role": "assistant", "content": [{"type": "text", "text": "Done"}]}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let response = client.send_message(&create_test_request()).await.unwrap();

        assert_eq!(response.id, "resp_1");
        let kinds: Vec<_> = response.output.iter().map(ResponseOutputItem::kind).collect();
        assert_eq!(kinds, ["reasoning", "tool_call", "tool_call_output", "message"]);

        let ResponseOutputItem::Reasoning(reasoning) = &response.output[0] else {
            panic!("Expected reasoning");
        };
        assert_eq!(reasoning.content.as_deref(), Some("long"));
        let ResponseOutputItem::ToolCall(call) = &response.output[1] else {
            panic!("Expected tool call");
        };
        assert_eq!(call.arguments, "{\"q\":1}");
    }

    #[tokio::test]
    async fn test_send_message_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let error = client
            .send_message(&create_test_request())
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(503));
        assert!(error.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_send_message_invalid_response_is_returned_leniently() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "resp_2",
                "output": [
                    {"type": "file_search_call", "id": "fs_1"},
                    {"type": "reasoning", "id": "r1", "summary": "ok"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let response = client.send_message(&create_test_request()).await.unwrap();

        assert_eq!(response.id, "resp_2");
        assert!(matches!(response.output[0], ResponseOutputItem::Unknown(_)));
        assert!(matches!(response.output[1], ResponseOutputItem::Reasoning(_)));
    }

    #[tokio::test]
    async fn test_send_message_non_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let error = client
            .send_message(&create_test_request())
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_stream_message_yields_items_until_done() {
        let mock_server = MockServer::start().await;
        mount_stream(
            &mock_server,
            sse_body(&[
                "event: output",
                r#"data: {"type":"response.output_item.done","item":{"type":"reasoning","id":"r1","summary":"x"}}"#,
                "",
                r#"data: {"type":"response.output_text.delta","delta":"Hi","item_id":"m1"}"#,
                r#"data: {"type":"response.output_item.done","item":{"type":"message","id":"m1","role":"assistant","content":[{"text":"Hi"}]}}"#,
                "data: [DONE]",
                r#"data: {"type":"error","code":"LATE","message":"never seen"}"#,
            ]),
        )
        .await;

        let client = create_test_client(&mock_server.uri());
        let items: Vec<_> = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().kind(), "reasoning");
        assert_eq!(items[1].as_ref().unwrap().kind(), "message");
    }

    #[tokio::test]
    async fn test_stream_message_skips_malformed_frames() {
        let mock_server = MockServer::start().await;
        mount_stream(
            &mock_server,
            sse_body(&[
                "data: not-json",
                r#"data: {"type":"response.output_item.done","item":{"type":"reasoning","id":"r1","summary":"x"}}"#,
                "data: [DONE]",
            ]),
        )
        .await;

        let client = create_test_client(&mock_server.uri());
        let items: Vec<_> = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn test_stream_message_in_band_error() {
        let mock_server = MockServer::start().await;
        mount_stream(
            &mock_server,
            sse_body(&[r#"data: {"error":{"message":"boom"}}"#, "data: [DONE]"]),
        )
        .await;

        let client = create_test_client(&mock_server.uri());
        let mut stream = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await
            .unwrap();

        let error = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(&error, ClientError::StreamError(m) if m == "boom"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_message_strict_mode_drops_unknown_items() {
        let mock_server = MockServer::start().await;
        mount_stream(
            &mock_server,
            sse_body(&[
                r#"data: {"type":"response.output_item.done","item":{"type":"web_search_call","id":"ws"}}"#,
                "data: [DONE]",
            ]),
        )
        .await;

        let config = ClientConfig::new(mock_server.uri()).with_validation(ValidationMode::Strict);
        let client = AgentClient::new(config).unwrap();
        let items: Vec<_> = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_stream_message_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await;

        let Err(error) = result else {
            panic!("Expected HTTP error");
        };
        assert_eq!(error.to_string(), "HTTP 500: Internal Server Error");
    }

    #[tokio::test]
    async fn test_stream_message_without_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOCATIONS_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client
            .stream_message(&create_test_request(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ClientError::MissingBody)));
    }

    #[tokio::test]
    async fn test_stream_message_cancellation_stops_reading() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Sends one frame, then holds the connection open without finishing
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = vec![0u8; 4096];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;

            let frame = r#"data: {"type":"response.output_item.done","item":{"type":"reasoning","id":"r1","summary":"x"}}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: text/event-stream\r\n\
                 Transfer-Encoding: chunked\r\n\
                 \r\n\
                 {:x}\r\n{frame}\n\r\n",
                frame.len() + 1
            );

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = create_test_client(&format!("http://{addr}"));
        let cancel = CancellationToken::new();
        let mut stream = client
            .stream_message(&create_test_request(), cancel.clone())
            .await
            .unwrap();

        assert!(stream.next().await.unwrap().is_ok());

        cancel.cancel();
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("cancellation should end the stream promptly");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_non_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let config = ClientConfig::new(mock_server.uri())
            .with_health_timeout(Duration::from_millis(100));
        let client = AgentClient::new(config).unwrap();
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        // Nothing listens on the discard port
        let client = create_test_client("http://127.0.0.1:9");
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_update_base_url_affects_subsequent_calls() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;

        for server in [&first, &second] {
            Mock::given(method("GET"))
                .and(path(HEALTH_PATH))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(server)
                .await;
        }

        let client = create_test_client(&first.uri());
        assert!(client.health_check().await);

        client.update_base_url(&format!("{}/", second.uri()));
        assert_eq!(client.base_url(), second.uri());
        assert!(client.health_check().await);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = AgentClient::new(ClientConfig::new("not a url"));
        assert!(matches!(result, Err(ClientError::ConfigurationError(_))));
    }
}
