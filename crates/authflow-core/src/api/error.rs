use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat failure taxonomy shown to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ErrorKind {
    Network,
    Unauthorized,
    Server,
    Api,
    Unknown,
    /// Persistence failures only; never produced by a login call.
    Store,
    NotImplemented,
}

impl ErrorKind {
    /// Message shown to the user for a failed login of this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Invalid username or password",
            ErrorKind::Network => "Unable to connect to server. Check your internet connection.",
            ErrorKind::Server => "The server encountered an error. Please try again later.",
            ErrorKind::Api
            | ErrorKind::Unknown
            | ErrorKind::Store
            | ErrorKind::NotImplemented => "Login failed. Please try again.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Server => "server",
            ErrorKind::Api => "api",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Store => "store",
            ErrorKind::NotImplemented => "not_implemented",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid credentials: {0}")]
    Unauthorized(String),

    #[error("Server error (status {status}): {body}")]
    Server { status: u16, body: String },

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected error: {0}")]
    Unknown(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Network(_) => ErrorKind::Network,
            AuthError::Unauthorized(_) => ErrorKind::Unauthorized,
            AuthError::Server { .. } => ErrorKind::Server,
            AuthError::Api { .. } => ErrorKind::Api,
            AuthError::Unknown(_) => ErrorKind::Unknown,
            AuthError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

/// What a single login call observed, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSignal {
    /// The request never produced a response
    Transport(String),
    /// A non-2xx response
    Status { status: u16, body: String },
    /// A 2xx response whose body could not be read or decoded
    MalformedBody(String),
    /// A 2xx response carrying `success: false`
    Rejected,
    /// Anything else that went wrong around the call
    Unexpected(String),
}

/// Map a login call outcome onto the error taxonomy.
///
/// Total over [`ResponseSignal`]: every outcome lands in exactly one kind.
pub fn classify(signal: ResponseSignal) -> AuthError {
    match signal {
        ResponseSignal::Transport(detail) => AuthError::Network(detail),
        ResponseSignal::Status { status: 401, body } => {
            AuthError::Unauthorized(truncate_body(&body))
        }
        ResponseSignal::Status { status, body } if status >= 500 => AuthError::Server {
            status,
            body: truncate_body(&body),
        },
        ResponseSignal::Status { status, body } => AuthError::Api {
            status,
            body: truncate_body(&body),
        },
        ResponseSignal::MalformedBody(detail) => {
            AuthError::Unauthorized(format!("malformed login response: {}", detail))
        }
        ResponseSignal::Rejected => {
            AuthError::Unauthorized("server rejected the credentials".to_string())
        }
        ResponseSignal::Unexpected(detail) => AuthError::Unknown(detail),
    }
}

impl ResponseSignal {
    /// Classify a `send()` failure. Only request construction problems are
    /// unexpected; everything else means no response arrived.
    pub fn from_send_error(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            ResponseSignal::Unexpected(err.to_string())
        } else {
            ResponseSignal::Transport(err.to_string())
        }
    }
}
