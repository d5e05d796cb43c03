//! Client error types

use common::ValidationError;
use serde::Deserialize;
use thiserror::Error;

/// Error raised by [`crate::ApiClient`]
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be sent or the response not read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error status
    #[error("{status}: {message}")]
    Api { status: u16, message: String },

    /// The call needs a session and none is open
    #[error("Not signed in")]
    NotSignedIn,

    /// Input rejected before anything was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ClientError {
    /// HTTP status of a gateway error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Error envelope returned by the gateway
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Build an [`ClientError::Api`] from a status and a raw body
pub(crate) fn api_error(status: u16, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    ClientError::Api { status, message }
}

/// Type alias for Result with ClientError
pub type ClientResult<T> = Result<T, ClientError>;
