//! # miniform-core
//!
//! Core types, settings, logging, and error types for miniform.
//! This crate has no database or HTTP dependencies and provides the foundation
//! for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`utils`] - Utility types (`MultiValueDict`, HTML escaping, text helpers)
//! - [`settings`] - Settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{MiniformError, MiniformResult, ValidationError};
pub use settings::{DatabaseSettings, Settings, SETTINGS};
