//! Response registry: maps a wire `type` to its decoder.
//!
//! Decoding happens in two steps. The envelope is read as a plain JSON
//! object to find `type`; the object is then handed to the decoder
//! registered for that type. Unregistered types never fail: they come back
//! as [`Response::Unknown`] holding the raw fields, so daemon protocol
//! additions do not break the read loop.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::response::{Response, UnknownResponse};

/// Builds a typed response from the full JSON object.
pub type Decoder = fn(Value) -> Result<Response, serde_json::Error>;

/// Errors raised when a line from the daemon cannot be decoded at all.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The line is not valid JSON.
    #[error("Malformed JSON from daemon: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The line is valid JSON but not an object.
    #[error("Expected a JSON object from daemon, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// Table of known response types.
#[derive(Default)]
pub struct ResponseRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl ResponseRegistry {
    /// Creates an empty registry; every type decodes as unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry with every response type amsig understands.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("version", |v| serde_json::from_value(v).map(Response::Version));
        registry.register("subscribed", |v| {
            serde_json::from_value(v).map(Response::Subscribed)
        });
        registry.register("user", |v| serde_json::from_value(v).map(Response::User));
        registry.register("message", |v| {
            serde_json::from_value(v).map(|m| Response::Message(Box::new(m)))
        });
        registry.register("unexpected_error", |v| {
            serde_json::from_value(v).map(Response::UnexpectedError)
        });
        registry
    }

    /// Process-wide registry, populated on first use and read-only afterwards.
    pub fn global() -> &'static ResponseRegistry {
        static GLOBAL: OnceLock<ResponseRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::standard)
    }

    /// Registers (or replaces) the decoder for `type_name`.
    pub fn register(&mut self, type_name: &'static str, decoder: Decoder) {
        self.decoders.insert(type_name, decoder);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Decodes an already-parsed object of the given type.
    ///
    /// Never fails. Unregistered types, and registered types whose body
    /// does not match the expected shape, yield [`Response::Unknown`].
    pub fn decode(&self, type_name: &str, fields: Map<String, Value>) -> Response {
        let Some(decoder) = self.decoders.get(type_name) else {
            return Response::Unknown(UnknownResponse::from_fields(type_name, fields));
        };

        match decoder(Value::Object(fields.clone())) {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    response_type = type_name,
                    error = %e,
                    "Response did not match its registered shape, keeping raw fields"
                );
                Response::Unknown(UnknownResponse::from_fields(type_name, fields))
            }
        }
    }

    /// Decodes one newline-delimited frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedJson` if the line is not JSON
    /// - `ProtocolError::NotAnObject` if the JSON is not an object
    pub fn decode_line(&self, line: &str) -> Result<Response, ProtocolError> {
        let value: Value = serde_json::from_str(line)?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(ProtocolError::NotAnObject {
                    kind: json_kind(&other),
                })
            }
        };

        let type_name = fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(self.decode(&type_name, fields))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_version() {
        let registry = ResponseRegistry::standard();
        let response = registry
            .decode_line(r#"{"type":"version","data":{"name":"signald","version":"0.23.0"}}"#)
            .unwrap();

        match response {
            Response::Version(v) => {
                assert_eq!(v.data.name, "signald");
                assert_eq!(v.data.version, "0.23.0");
            }
            other => panic!("Expected Version, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_user_keeps_id() {
        let registry = ResponseRegistry::standard();
        let response = registry
            .decode_line(r#"{"type":"user","id":"42","data":{"contactName":"me"}}"#)
            .unwrap();

        assert_eq!(response.type_name(), "user");
        assert_eq!(response.id(), Some("42"));
    }

    #[test]
    fn test_decode_message() {
        let registry = ResponseRegistry::standard();
        let line = r#"{"type":"message","data":{"username":"+1000","source":{"number":"+1555"},"dataMessage":{"body":"ping"}}}"#;

        match registry.decode_line(line).unwrap() {
            Response::Message(m) => {
                assert_eq!(m.data.source_number(), Some("+1555"));
                assert_eq!(
                    m.data.data_message.and_then(|d| d.body).as_deref(),
                    Some("ping")
                );
            }
            other => panic!("Expected Message, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_yields_open_mapping() {
        let registry = ResponseRegistry::standard();
        let response = registry
            .decode_line(r#"{"type":"listen_started","id":"9","data":{"x":1}}"#)
            .unwrap();

        match response {
            Response::Unknown(u) => {
                assert_eq!(u.type_name, "listen_started");
                assert_eq!(u.id.as_deref(), Some("9"));
                assert_eq!(u.get("data").and_then(|d| d.get("x")), Some(&Value::from(1)));
            }
            other => panic!("Expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_yields_open_mapping() {
        let registry = ResponseRegistry::standard();
        let response = registry.decode_line(r#"{"data":{}}"#).unwrap();
        assert!(matches!(response, Response::Unknown(ref u) if u.type_name.is_empty()));
    }

    #[test]
    fn test_empty_registry_decodes_everything_as_unknown() {
        let registry = ResponseRegistry::empty();
        let response = registry.decode_line(r#"{"type":"version","data":{}}"#).unwrap();
        assert!(matches!(response, Response::Unknown(_)));
    }

    #[test]
    fn test_shape_mismatch_degrades_to_unknown() {
        let registry = ResponseRegistry::standard();
        let response = registry
            .decode_line(r#"{"type":"version","data":"not an object"}"#)
            .unwrap();
        assert!(matches!(response, Response::Unknown(ref u) if u.type_name == "version"));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let registry = ResponseRegistry::standard();
        assert!(matches!(
            registry.decode_line("{not json"),
            Err(ProtocolError::MalformedJson(_))
        ));
        assert!(matches!(
            registry.decode_line("[1,2]"),
            Err(ProtocolError::NotAnObject { kind: "array" })
        ));
    }

    #[test]
    fn test_global_registry_is_standard() {
        let global = ResponseRegistry::global();
        for name in ["version", "subscribed", "user", "message", "unexpected_error"] {
            assert!(global.is_registered(name), "{name} should be registered");
        }
        assert!(!global.is_registered("send"));
    }
}
