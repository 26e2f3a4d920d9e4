//! amsig Protocol - signald wire protocol
//!
//! This crate provides the request and response types spoken with the
//! signald daemon over its Unix socket: newline-delimited JSON objects
//! discriminated by a `type` field, with a string `id` correlating
//! responses to requests.
//!
//! Responses are decoded through a [`ResponseRegistry`] so that unknown
//! response types degrade to an open field mapping instead of failing.

pub mod registry;
pub mod request;
pub mod response;
pub mod version;

pub use registry::{ProtocolError, ResponseRegistry};
pub use request::{
    Attachment, GetUser, JsonAddress, Quote, Request, RequestBody, RequestId, SendMessage, Subscribe,
};
pub use response::{
    DataMessage, IncomingMessage, MessageData, Response, Source, Subscribed, UnexpectedError,
    UnknownResponse, UserResponse, VersionInfo, VersionResponse,
};
pub use version::ProtocolVersion;
