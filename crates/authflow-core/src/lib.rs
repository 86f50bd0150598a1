//! Core library for authflow.
//!
//! Manages an authenticated client session: credentials are exchanged for a
//! token pair through [`api::ApiClient`], the pair is persisted by
//! [`auth::TokenStore`], and session status is owned by the
//! [`session::SessionController`] state machine, which publishes every
//! transition to any number of observers.

pub mod api;
pub mod auth;
pub mod config;
pub mod session;

pub use api::{ApiClient, AuthError, Authenticator, ErrorKind};
pub use auth::{AuthToken, Credentials, TokenStore};
pub use config::Config;
pub use session::{SessionController, SessionEvent, SessionHandle, SessionState};
