//! HTTP routes.
//!
//! Each module exposes a `router()` with absolute paths; [`crate::app`]
//! merges them and applies auth and limits.

pub mod auth;
pub mod health;
pub mod providers;
pub mod reveal;
pub mod servers;
pub mod settings;
