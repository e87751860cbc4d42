//! `InfraVault` HTTP server.
//!
//! Wires the core library and storage backend into an Axum router: record
//! routes with redacted reads and merge-rule writes, the reveal endpoints,
//! and bearer-token auth.

pub mod app;
pub mod config;
pub mod error;
pub mod hardening;
pub mod middleware;
pub mod routes;
pub mod state;
