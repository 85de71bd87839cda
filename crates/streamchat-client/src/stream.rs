//! Frame parsing for streamed agent responses.
//!
//! A streamed body is a sequence of `data: <json>` lines terminated by
//! `data: [DONE]`. Each payload is classified into a completed output item, an
//! ignorable event, or an in-band failure that ends the stream.

use std::pin::Pin;

use futures::stream::{Stream, StreamExt};
use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use streamchat_common::{ResponseOutputItem, StreamEvent, ValidationMode};

use crate::error::ClientError;

/// Prefix of every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Line that ends a stream.
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// A lazy, single-pass sequence of output items.
pub type ItemStream = Pin<Box<dyn Stream<Item = Result<ResponseOutputItem, ClientError>> + Send>>;

/// Result of parsing one line.
#[derive(Debug)]
pub enum LineOutcome {
    /// Nothing to yield; keep reading.
    Skip,
    /// The terminator was reached.
    Done,
    /// A completed output item.
    Item(ResponseOutputItem),
    /// The server reported an error; the stream must end.
    Failed(ClientError),
}

/// Stateless classifier for stream lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameParser {
    mode: ValidationMode,
}

impl FrameParser {
    /// Creates a parser with the given validation mode.
    #[must_use]
    pub const fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Returns the validation mode.
    #[must_use]
    pub const fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Classifies a single line.
    ///
    /// Malformed payloads never fail the stream: they are logged and skipped,
    /// or passed through when running in [`ValidationMode::Lenient`].
    #[must_use]
    pub fn parse_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            return LineOutcome::Skip;
        }
        if line == DONE_SENTINEL {
            debug!("Stream completed with [DONE] marker");
            return LineOutcome::Done;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            // event:, id:, retry: and comment lines carry nothing for us
            return LineOutcome::Skip;
        };

        let data: Value = match serde_json::from_str(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to parse stream line: {e}");
                debug!("Problematic line: {line}");
                return LineOutcome::Skip;
            }
        };

        if let Some(error) = data.get("error").filter(|e| is_truthy(e)) {
            let error = ClientError::from_stream_payload(error);
            warn!("Stream reported an error: {error}");
            return LineOutcome::Failed(error);
        }

        self.classify(data)
    }

    fn classify(&self, data: Value) -> LineOutcome {
        // Only an object can stand in for an item.
        let fallback = match self.mode {
            ValidationMode::Lenient => data.get("item").filter(|item| item.is_object()).cloned(),
            ValidationMode::Strict => None,
        };

        match StreamEvent::from_value(data) {
            Ok(event) => {
                let kind = event.event_type();
                event.into_item().map_or_else(
                    || {
                        debug!("Ignoring {kind} event");
                        LineOutcome::Skip
                    },
                    LineOutcome::Item,
                )
            }
            Err(e) => {
                warn!("Stream event validation failed: {e}");
                fallback.map_or(LineOutcome::Skip, |item| {
                    LineOutcome::Item(ResponseOutputItem::lenient(item))
                })
            }
        }
    }
}

/// Whether a JSON `error` field signals a failure.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Bool(true) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// Logs when the underlying body reader is dropped.
struct ReaderRelease {
    lines: usize,
}

impl Drop for ReaderRelease {
    fn drop(&mut self) {
        debug!("Stream reader released after {} lines", self.lines);
    }
}

/// Turns a line stream into an item stream.
///
/// The sequence ends at `data: [DONE]`, at the end of the input, at the first
/// transport or in-band error (yielded once), or when `cancel` fires. The
/// cancellation token is checked before every line and raced against every
/// read, so a pending read does not delay cancellation.
pub fn parse_stream<S>(lines: S, mode: ValidationMode, cancel: CancellationToken) -> ItemStream
where
    S: Stream<Item = Result<String, ClientError>> + Send + 'static,
{
    let parser = FrameParser::new(mode);

    Box::pin(async_stream::stream! {
        // Dropped with the generator on every exit path
        let mut release = ReaderRelease { lines: 0 };
        futures::pin_mut!(lines);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                next = lines.next() => Some(next),
            };

            let Some(next) = next else {
                debug!("Stream cancelled");
                break;
            };
            let Some(line) = next else {
                debug!("Stream ended without [DONE] marker");
                break;
            };
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            release.lines += 1;
            if cancel.is_cancelled() {
                debug!("Stream cancelled");
                break;
            }

            match parser.parse_line(&line) {
                LineOutcome::Skip => {}
                LineOutcome::Done => break,
                LineOutcome::Item(item) => yield Ok(item),
                LineOutcome::Failed(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}
