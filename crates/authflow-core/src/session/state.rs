use serde::{Deserialize, Serialize};

use crate::api::ErrorKind;
use crate::auth::{AuthToken, Credentials};

/// Current session status, as published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum SessionState {
    /// No session decision made yet
    Initial,
    /// A login attempt or stored-session check is in progress
    Loading,
    /// A valid, unexpired token is active
    Authenticated { token: AuthToken },
    /// The most recent attempt failed; `detail` is the user-facing message
    Failed { reason: ErrorKind, detail: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initial => "initial",
            SessionState::Loading => "loading",
            SessionState::Authenticated { .. } => "authenticated",
            SessionState::Failed { .. } => "failed",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&AuthToken> {
        match self {
            SessionState::Authenticated { token } => Some(token),
            _ => None,
        }
    }
}

/// Intent raised by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Submit(Credentials),
    Reset,
    CheckStoredSession,
}

/// Non-fatal problems reported beside the state stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDiagnostic {
    /// Login succeeded but the token could not be persisted
    TokenWriteFailed { detail: String },
    /// The stored token could not be removed
    TokenClearFailed { detail: String },
}

impl SessionDiagnostic {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Store
    }
}
