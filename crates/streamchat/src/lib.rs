//! # streamchat
//!
//! Conversation state for streaming agent backends.
//!
//! `streamchat` keeps an ordered conversation of heterogeneous items (user
//! messages, assistant messages, tool calls and outputs, reasoning traces and
//! errors), sends it to an agent, and appends the streamed reply item by item
//! while supporting cancellation at any point.
//!
//! ## Quick Start
//!
//! ```no_run
//! use streamchat::{AgentClient, ChatController, ClientConfig, SendOutcome};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = AgentClient::new(ClientConfig::new("http://localhost:8000"))?;
//! let chat = ChatController::new(client);
//!
//! match chat.send("What changed in the last release?", Some("Be brief.")).await? {
//!     SendOutcome::Completed { appended } => println!("{appended} new items"),
//!     SendOutcome::Cancelled => println!("cancelled"),
//!     SendOutcome::Failed { message } => eprintln!("failed: {message}"),
//! }
//!
//! for item in chat.items() {
//!     println!("{item:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Streaming**: items are appended as soon as each frame completes
//! - **Cancellation**: `cancel()` and `clear_messages()` stop an in-flight
//!   stream without waiting for the next chunk
//! - **Events**: an optional callback observes every state change

pub mod controller;
pub mod error;
pub mod events;

pub use streamchat_client::*;
pub use streamchat_common::*;

pub use controller::{ChatController, REQUEST_ERROR_CODE, STREAM_ERROR_CODE, build_request};
pub use error::ChatError;
pub use events::{ChatEvent, EventCallback, SendOutcome};
