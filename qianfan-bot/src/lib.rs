//! qianfan-bot - Command-driven chat front-end for the Qianfan platform.
//!
//! Routes user commands to the chat-completion and text-to-image APIs,
//! reconstructing multi-turn context from the turn log when history is
//! enabled and optionally chaining model calls to illustrate replies.

#![warn(clippy::all)]

pub mod dispatch;
pub mod handler;
pub mod reply;
pub mod request;

pub use handler::{ChatHandler, ImagineHandler};
pub use reply::Reply;
