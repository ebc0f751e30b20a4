//! Turn log persistence and session windowing.
//!
//! Multi-turn history is a flat append-only log of turns carrying
//! session-start markers. The "current session" is a derived view,
//! reconstructed per request by scanning back to the most recent start
//! marker, rather than a stored entity.

#![warn(clippy::all)]

pub mod store;
pub mod types;
pub mod window;

pub use store::TurnStore;
pub use types::{NewTurn, Turn};
pub use window::{SessionWindow, BOOTSTRAP_PROMPT};
