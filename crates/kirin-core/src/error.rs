//! Error types for the chat core

use thiserror::Error;

/// Failure talking to the assistant backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The backend answered with a non-success status. Displays the HTTP
    /// reason phrase only, as it is shown to the user verbatim.
    #[error("{reason}")]
    Status { code: u16, reason: String },

    /// The connection could not be established or broke mid-response
    #[error("{0}")]
    Connection(String),

    /// The response body was not what the protocol promises
    #[error("invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(code: u16, reason: Option<&str>) -> Self {
        TransportError::Status {
            code,
            reason: reason
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", code)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::status(status.as_u16(), status.canonical_reason())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

/// Errors returned to the host by the controller
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message text is empty")]
    EmptyMessage,

    #[error("a turn is already in progress")]
    TurnInFlight,

    #[error("session initialization failed: {0}")]
    Initialization(#[source] TransportError),
}
