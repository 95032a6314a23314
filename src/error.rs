//! Error type shared by the API client, the stores and the notification channel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status. `message` is ready to show.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl ClientError {
    /// HTTP status of a rejected request, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
