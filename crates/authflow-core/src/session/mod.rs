//! Session state machine.
//!
//! This module provides:
//! - `SessionState`: the closed set of states a session can be in
//! - `SessionEvent`: intent events raised by the UI layer
//! - `SessionController`: the task that owns the state and applies events
//!   one at a time, in arrival order
//! - `SessionHandle`: the cloneable front end used to dispatch events and
//!   observe published states
//!
//! At most one login call is in flight per controller. Results of abandoned
//! attempts are discarded.

pub mod controller;
pub mod state;

pub use controller::{SessionClosed, SessionController, SessionHandle};
pub use state::{SessionDiagnostic, SessionEvent, SessionState};
