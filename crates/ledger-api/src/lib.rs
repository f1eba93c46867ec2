#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Thin web adapter (§6): axum routes, the `X-API-Key` auth check, and
//! environment-variable configuration loading. Business logic lives in
//! `ledger-service`; this crate only adapts it to HTTP.

pub mod auth;
pub mod config;
pub mod routes;

pub use config::LedgerConfig;
pub use routes::{ApiState, router};
