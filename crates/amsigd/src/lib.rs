//! amsigd - Alertmanager to signald bridge
//!
//! This crate provides the service side of amsig:
//! - A reconnecting client for the signald Unix socket
//! - The output dispatch loop, sole reader of that socket
//! - Inbound chat commands, alert routing and the keepalive self-lookup
//! - Configuration loading, templates, metrics and the HTTP boundary

pub mod app;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod keepalive;
pub mod metrics;
pub mod router;
pub mod status;
pub mod templates;

#[cfg(test)]
mod testing;

pub use app::AppContext;
pub use connection::{DaemonConnection, OnAssigned, RequestSink, DEFAULT_SOCKET_PATH};
pub use error::{ConfigError, ConnectionError, RouteError, TemplateError};
