use thiserror::Error;

/// Failure of the underlying HTTP exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not connect to the server at {base_url}")]
    Unavailable { base_url: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("{0}")]
    Body(String),
}

impl TransportError {
    /// Map a reqwest failure, reporting refused connections as `Unavailable`.
    pub fn from_reqwest(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_connect() {
            Self::Unavailable {
                base_url: base_url.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Why a session ended in failure. Delivered to the consumer through its
/// `Display` text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Server error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Streaming unsupported: the server response has no readable body")]
    NoBody,

    #[error("Stream interrupted: {0}")]
    Interrupted(TransportError),
}

/// A request rejected before anything is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("selection is too short (at least {min} characters required)")]
    SelectionTooShort { min: usize },

    #[error("invalid repository location: {0}")]
    InvalidLocation(String),
}
