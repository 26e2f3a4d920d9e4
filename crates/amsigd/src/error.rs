//! Error types for the amsig service.
//!
//! One enum per concern, so callers can tell a dead daemon socket from an
//! unconfigured receiver from a broken template without string matching.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::path::PathBuf;

use amsig_core::DomainError;
use amsig_protocol::ProtocolError;
use thiserror::Error;

// ============================================================================
// Connection Errors
// ============================================================================

/// Transport and protocol failures talking to the daemon.
///
/// Every variant except `Encode` leaves the connection disconnected; the
/// next send reconnects.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No socket is held. Reads never connect implicitly.
    #[error("Not connected to daemon")]
    NotConnected,

    /// Opening the Unix socket failed.
    #[error("Failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The daemon closed its end of the socket.
    #[error("Daemon closed the connection")]
    Closed,

    /// Read or write failure on an open socket.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A line from the daemon could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A request could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// Routing Errors
// ============================================================================

/// Failures routing one alert message.
#[derive(Error, Debug)]
pub enum RouteError {
    /// The message names a receiver that is not in the configuration.
    #[error("Receiver not configured: {0:?}")]
    ReceiverNotConfigured(String),

    /// A send to one destination failed (the last failure, when several did).
    #[error("Failed to deliver to {destination}: {source}")]
    Send {
        destination: String,
        #[source]
        source: ConnectionError,
    },
}

impl RouteError {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ReceiverNotConfigured(_) => "receiver_not_configured",
            Self::Send { .. } => "send",
        }
    }
}

// ============================================================================
// Template Errors
// ============================================================================

/// Failures rendering a template against an alert message.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0:?}")]
    NotFound(String),

    #[error("Unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("Empty placeholder at byte {offset}")]
    EmptyPlaceholder { offset: usize },

    #[error("No value for {path:?}")]
    MissingField { path: String },

    #[error("Failed to build template context: {0}")]
    Context(#[from] serde_json::Error),
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Startup configuration failures. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Receivers(#[from] DomainError),

    #[error("Failed to load template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template file {path} has no usable name")]
    TemplateName { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let error = ConnectionError::Connect {
            path: PathBuf::from("/run/signald.sock"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let display = error.to_string();
        assert!(display.contains("/run/signald.sock"));
        assert!(display.contains("no such file"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_error = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        let error: ConnectionError = io_error.into();
        assert!(matches!(error, ConnectionError::Io(_)));
    }

    #[test]
    fn test_route_error_reason() {
        assert_eq!(
            RouteError::ReceiverNotConfigured("x".to_string()).reason(),
            "receiver_not_configured"
        );
        let send = RouteError::Send {
            destination: "tel:+1".to_string(),
            source: ConnectionError::NotConnected,
        };
        assert_eq!(send.reason(), "send");
        assert!(send.to_string().contains("tel:+1"));
    }

    #[test]
    fn test_config_error_wraps_domain_error() {
        let error: ConfigError = DomainError::NoReceivers.into();
        assert_eq!(error.to_string(), "No receivers defined");
    }
}
