//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The routing table was built from an empty receiver list
    #[error("No receivers defined")]
    NoReceivers,

    /// A receiver entry has no name
    #[error("Receiver #{index} missing 'name'")]
    MissingReceiverName { index: usize },

    /// Two receiver entries share a name
    #[error("Duplicate receiver name: {name:?}")]
    DuplicateReceiver { name: String },

    /// A receiver has no sender identity, even after defaults
    #[error("Receiver {name:?} has no sender")]
    MissingSender { name: String },

    /// A destination string has neither a `tel:` nor a `group:` prefix
    #[error("Unrecognized destination {value:?}, expected tel:+number or group:id")]
    UnrecognizedDestination { value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
