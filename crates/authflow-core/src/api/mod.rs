//! Remote credential exchange and error classification.
//!
//! `ApiClient` posts credentials to `<base>/login` and returns the token
//! pair. Every failure is classified into an [`ErrorKind`] so the session
//! layer can present a stable message regardless of transport details.

pub mod client;
pub mod error;

pub use client::{ApiClient, Authenticator, UserProfile};
pub use error::{classify, AuthError, ErrorKind, ResponseSignal};
