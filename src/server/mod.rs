//! HTTP server
//!
//! Serves the live multipart stream and one-shot snapshots over axum.

pub mod config;
pub mod listener;
mod routes;

pub use config::{ConfigError, ServerConfig};
pub use listener::MjpegServer;
