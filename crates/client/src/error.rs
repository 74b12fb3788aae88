// crates/client/src/error.rs
//! Error taxonomy for the client layer.

use thiserror::Error;

/// Errors surfaced by the transport and API layers.
///
/// `NotFoundYet` is not a failure for callers: a 404 from a result-shaped
/// endpoint means the data does not exist *yet*. The API layer maps it to
/// `Ok(None)` where that reading applies.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The credential was rejected and could not be refreshed. For local
    /// accounts the session has already been cleared when this surfaces.
    #[error("unauthorized")]
    Unauthorized,

    /// 404: the requested data is not available yet.
    #[error("not available yet")]
    NotFoundYet,

    /// Connection-level failure (DNS, TLS, timeout, reset).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-401 HTTP failure from the backend.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Malformed credential or missing identity claims. Aborts a refresh
    /// without forcing logout.
    #[error("credential error: {0}")]
    Credential(String),

    /// Failure reading or writing persisted client state.
    #[error("state storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// Transient failures are retried by polling layers, never by the
    /// transport itself.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFoundYet,
            _ => Self::Server { status, body },
        }
    }
}
