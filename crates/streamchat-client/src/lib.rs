//! # streamchat-client
//!
//! Transport and streaming protocol handling for agent chat backends.
//!
//! The streaming path is layered:
//! - [`LineDecoder`] turns body chunks into text lines, tolerating
//!   multi-byte characters split across chunks
//! - [`FrameParser`] classifies each `data:` line into an output item, an
//!   ignorable event, or an in-band failure
//! - [`AgentClient`] issues the HTTP requests and wires the two together
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use streamchat_client::{AgentApi, AgentClient};
//! use streamchat_common::{ClientConfig, ResponseInputMessage, ResponsesAgentRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = AgentClient::new(ClientConfig::new("http://localhost:8000"))?;
//!
//! let request = ResponsesAgentRequest::builder()
//!     .input(vec![ResponseInputMessage::user("Hello").into()])
//!     .build();
//!
//! let mut items = client.stream_message(&request, CancellationToken::new()).await?;
//! while let Some(item) = items.next().await {
//!     println!("{}", item?.kind());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod decoder;
pub mod error;
pub mod stream;

pub use client::{AgentApi, AgentClient, HEALTH_PATH, INVOCATIONS_PATH};
pub use decoder::{LineDecoder, decode_lines};
pub use error::ClientError;
pub use stream::{DATA_PREFIX, DONE_SENTINEL, FrameParser, ItemStream, LineOutcome, parse_stream};
