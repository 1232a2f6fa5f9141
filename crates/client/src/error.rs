//! Client error types.

use qcarta_protocol::ProtocolError;

/// Errors from the QCarta client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something other than 200.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status of a non-200 reply, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable detail without the status prefix.
    pub fn detail(&self) -> String {
        match self {
            Error::Status { message, .. } => message.clone(),
            Error::Protocol(ProtocolError::Rejected(message)) => message.clone(),
            other => other.to_string(),
        }
    }
}
