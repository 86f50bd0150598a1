//! Authentication data and token persistence.
//!
//! This module provides:
//! - `Credentials`: transient username/password pair, never persisted
//! - `AuthToken`: the access/refresh token pair with optional expiry
//! - `TokenStore`: durable storage of the current token pair over a
//!   pluggable `SecretBackend` (memory or JSON file)

pub mod backend;
pub mod store;
pub mod token;

pub use backend::{FileBackend, MemoryBackend, SecretBackend};
pub use store::{StoreError, StoredToken, TokenStore};
pub use token::{AuthToken, Credentials};
