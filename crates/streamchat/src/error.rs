use thiserror::Error;

use streamchat_client::ClientError;

/// Errors returned by [`ChatController`](crate::ChatController) sends.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChatError {
    /// The message was blank; nothing was sent.
    #[error("Message is empty")]
    EmptyMessage,

    /// The backend request failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
