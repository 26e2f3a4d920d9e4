//! amsig Core - Shared domain types for the Alertmanager bridge
//!
//! This crate provides the alert payload received from Alertmanager and the
//! receiver routing table shared between the protocol layer and the daemon
//! service (amsigd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod alert;
pub mod error;
pub mod receiver;

// Re-exports for convenience
pub use alert::{Alert, AlertMessage, AlertStatus};
pub use error::{DomainError, DomainResult};
pub use receiver::{Destination, Receiver, ReceiverTable};
