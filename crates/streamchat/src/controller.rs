//! Conversation state and the send/cancel lifecycle.
//!
//! Each send moves through `Idle -> Sending -> {Completed, Cancelled, Failed}`
//! and back to idle. At most one send is active per controller; starting a
//! new one cancels the previous one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use streamchat_client::AgentApi;
use streamchat_common::{
    ErrorItem, ResponseInputItem, ResponseInputMessage, ResponseOutputItem, ResponsesAgentRequest,
};

use crate::error::ChatError;
use crate::events::{ChatEvent, EventCallback, SendOutcome};

/// Error code recorded when a streamed send fails.
pub const STREAM_ERROR_CODE: &str = "STREAM_ERROR";

/// Error code recorded when a non-streaming send fails.
pub const REQUEST_ERROR_CODE: &str = "REQUEST_ERROR";

#[derive(Debug, Default)]
struct ChatState {
    items: Vec<ResponseInputItem>,
    streaming: bool,
    last_error: Option<String>,
    active: Option<CancellationToken>,
    /// Incremented per send so a superseded send never touches its
    /// successor's streaming flag.
    generation: u64,
}

/// Builds the request for a new user message.
///
/// A non-empty system prompt comes first, then the history in order, then
/// the new message.
#[must_use]
pub fn build_request(
    system_prompt: Option<&str>,
    history: &[ResponseInputItem],
    user: ResponseInputMessage,
) -> ResponsesAgentRequest {
    let mut input = Vec::with_capacity(history.len() + 2);
    if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
        input.push(ResponseInputMessage::system(prompt).into());
    }
    input.extend_from_slice(history);
    input.push(user.into());

    ResponsesAgentRequest::builder().input(input).build()
}

/// Owns a conversation and drives sends against an agent backend.
///
/// Handles are cheap to clone and share state, so one task can `cancel()`
/// while another awaits `send()`.
pub struct ChatController<C: AgentApi> {
    client: Arc<C>,
    state: Arc<Mutex<ChatState>>,
    event_callback: Option<EventCallback>,
}

impl<C: AgentApi> Clone for ChatController<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            state: Arc::clone(&self.state),
            event_callback: self.event_callback.clone(),
        }
    }
}

impl<C: AgentApi> std::fmt::Debug for ChatController<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<C: AgentApi> ChatController<C> {
    /// Creates an empty conversation over `client`.
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            state: Arc::new(Mutex::new(ChatState::default())),
            event_callback: None,
        }
    }

    /// Registers a callback invoked for every [`ChatEvent`].
    #[must_use]
    pub fn with_event_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Arc::new(callback));
        self
    }

    /// Returns the backend client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns a snapshot of the conversation.
    pub fn items(&self) -> Vec<ResponseInputItem> {
        self.lock().items.clone()
    }

    /// Returns `true` while a send is in flight.
    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Returns the message of the most recent failed send.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Sends `text` and streams the reply into the conversation.
    ///
    /// The user item is appended before the request is issued. Failures are
    /// recorded as a `STREAM_ERROR` item rather than returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank input, before any state
    /// changes.
    pub async fn send(
        &self,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<SendOutcome, ChatError> {
        let (request, cancel, generation) = self.begin(text, system_prompt)?;
        let request = request.streaming();

        let result = self.pump(&request, &cancel).await;
        Ok(self.finish(generation, &cancel, STREAM_ERROR_CODE, result))
    }

    /// Sends `text` without streaming and appends the complete reply.
    ///
    /// Output items are appended in order, followed by the response error if
    /// one was reported. Transport failures are recorded as a
    /// `REQUEST_ERROR` item.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank input, before any state
    /// changes.
    pub async fn send_once(
        &self,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<SendOutcome, ChatError> {
        let (mut request, cancel, generation) = self.begin(text, system_prompt)?;
        request.stream = Some(false);

        let result = self.request_once(&request, &cancel).await;
        Ok(self.finish(generation, &cancel, REQUEST_ERROR_CODE, result))
    }

    /// Cancels the active send, if any.
    ///
    /// Items still in flight are discarded and no error item is recorded.
    /// Returns `true` if a send was active.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        let Some(token) = state.active.take() else {
            return false;
        };
        debug!("Cancelling active stream");
        token.cancel();
        state.streaming = false;
        true
    }

    /// Empties the conversation, cancelling any active send first.
    pub fn clear_messages(&self) {
        let mut state = self.lock();
        if let Some(token) = state.active.take() {
            debug!("Cancelling active stream before clearing");
            token.cancel();
        }
        state.items.clear();
        state.streaming = false;
        state.last_error = None;
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: &ChatEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// Moves to `Sending`: supersedes any active send, records the user
    /// item and registers a fresh cancellation token.
    fn begin(
        &self,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<(ResponsesAgentRequest, CancellationToken, u64), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let user = ResponseInputMessage::user(text);
        let cancel = CancellationToken::new();

        let (request, generation) = {
            let mut state = self.lock();
            if let Some(previous) = state.active.take() {
                debug!("Superseding active stream");
                previous.cancel();
            }

            let request = build_request(system_prompt, &state.items, user.clone());
            state.items.push(user.clone().into());
            state.streaming = true;
            state.generation += 1;
            state.active = Some(cancel.clone());
            (request, state.generation)
        };

        self.emit(&ChatEvent::StreamStarted);
        self.emit(&ChatEvent::ItemAppended(user.into()));

        Ok((request, cancel, generation))
    }

    /// Pulls items from the stream until it ends, fails or is cancelled.
    ///
    /// Returns the number of items appended. The stream, and with it the
    /// response body, is dropped on return.
    async fn pump(
        &self,
        request: &ResponsesAgentRequest,
        cancel: &CancellationToken,
    ) -> Result<usize, ChatError> {
        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(0),
            stream = self.client.stream_message(request, cancel.clone()) => stream?,
        };

        let mut appended = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                next = stream.next() => next,
            };
            let Some(item) = next else {
                break;
            };

            if !self.append(cancel, item?) {
                break;
            }
            appended += 1;
        }

        Ok(appended)
    }

    async fn request_once(
        &self,
        request: &ResponsesAgentRequest,
        cancel: &CancellationToken,
    ) -> Result<usize, ChatError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(0),
            response = self.client.send_message(request) => response?,
        };

        let trailing_error = response.error.map(ResponseOutputItem::from);
        let mut appended = 0;
        for item in response.output.into_iter().chain(trailing_error) {
            if !self.append(cancel, item) {
                break;
            }
            appended += 1;
        }

        Ok(appended)
    }

    /// Appends an item unless the send was cancelled.
    ///
    /// The token is checked under the state lock, so an item can never land
    /// in a conversation that was cleared after the item arrived.
    fn append(&self, cancel: &CancellationToken, item: ResponseOutputItem) -> bool {
        let item = ResponseInputItem::from(item);
        {
            let mut state = self.lock();
            if cancel.is_cancelled() {
                debug!("Discarding {} item received after cancellation", item_kind(&item));
                return false;
            }
            state.items.push(item.clone());
        }
        self.emit(&ChatEvent::ItemAppended(item));
        true
    }

    fn outcome(cancel: &CancellationToken, result: Result<usize, ChatError>) -> SendOutcome {
        if cancel.is_cancelled() {
            return SendOutcome::Cancelled;
        }
        match result {
            Ok(appended) => SendOutcome::Completed { appended },
            Err(e) => SendOutcome::Failed {
                message: e.to_string(),
            },
        }
    }

    /// Returns to idle, recording a failure as an error item.
    ///
    /// The outcome is decided under the state lock, the same lock `cancel()`
    /// and `clear_messages()` cancel under, so a cancelled send never records
    /// an error.
    fn finish(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        error_code: &str,
        result: Result<usize, ChatError>,
    ) -> SendOutcome {
        let (outcome, error_item) = {
            let mut state = self.lock();
            let outcome = Self::outcome(cancel, result);

            let error_item = match &outcome {
                SendOutcome::Failed { message } => {
                    warn!("Send failed: {message}");
                    let item = ResponseInputItem::from(ResponseOutputItem::Error(ErrorItem::new(
                        error_code,
                        message.clone(),
                    )));
                    state.items.push(item.clone());
                    state.last_error = Some(message.clone());
                    Some(item)
                }
                SendOutcome::Completed { .. } => {
                    state.last_error = None;
                    None
                }
                SendOutcome::Cancelled => None,
            };

            if state.generation == generation {
                state.streaming = false;
                state.active = None;
            }
            (outcome, error_item)
        };

        if let Some(item) = error_item {
            self.emit(&ChatEvent::ItemAppended(item));
        }
        self.emit(&ChatEvent::StreamFinished(outcome.clone()));
        outcome
    }
}

fn item_kind(item: &ResponseInputItem) -> &str {
    match item {
        ResponseInputItem::Input(_) => "input",
        ResponseInputItem::Output(output) => output.kind(),
    }
}
