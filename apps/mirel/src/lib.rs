//! # mirel application library
//!
//! HTTP API, CLI and configuration for the mirel link mirror. The binary in
//! `main.rs` is a thin wrapper around these modules; keeping them in a
//! library target lets integration tests drive the router and the CLI
//! commands directly.

pub mod api;
pub mod cli;
pub mod config;
