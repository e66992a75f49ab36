//! dkm-relay library target.
//!
//! Exposes config, router and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod config;
pub mod routes;
pub mod state;
pub mod ws;
