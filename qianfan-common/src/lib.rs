//! Qianfan Common - Shared types and utilities for the qianfan-bot workspace.
//!
//! This crate provides:
//! - Configuration types, loading, and validation
//! - The unified error taxonomy with user-facing reply messages
//! - Logging setup

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ChatModel, Config, HistoryConfig, ImageConfig, ImageStyle};
pub use error::{Error, Result};
