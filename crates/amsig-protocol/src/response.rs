//! Responses and events pushed by the daemon.
//!
//! Every variant keeps the echoed request `id` (when present) next to its
//! `data` payload. Types this crate does not know are kept as
//! [`UnknownResponse`] with all their fields.

use crate::request::JsonAddress;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Daemon identification carried by a `version` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
}

/// `version`: sent by the daemon when a client connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: VersionInfo,
}

/// `subscribed`: acknowledges a `subscribe` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscribed {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// `user`: result of a `get_user` lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// `unexpected_error`: the daemon failed to handle a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnexpectedError {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl UnexpectedError {
    /// Human readable message, when the daemon supplied one.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}

/// `message`: an inbound event for a subscribed account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: MessageData,
}

/// Sender of an inbound event. Older daemons send a bare number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Address(JsonAddress),
    Number(String),
}

impl Source {
    pub fn number(&self) -> Option<&str> {
        match self {
            Self::Address(addr) => addr.number.as_deref(),
            Self::Number(n) => Some(n.as_str()),
        }
    }
}

/// Envelope of an inbound event.
///
/// Only the fields amsig acts on are typed; everything else (receipts,
/// typing indicators, sync messages) stays in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    /// Local account the event was received on
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub source_device: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Present only for chat messages
    #[serde(default)]
    pub data_message: Option<DataMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageData {
    /// Phone number of the sender, if known.
    pub fn source_number(&self) -> Option<&str> {
        self.source.as_ref().and_then(Source::number)
    }
}

/// Chat content of an inbound event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    #[serde(default)]
    pub group_v2: Option<GroupV2>,
}

impl DataMessage {
    /// Group the message was posted in, for either group generation.
    pub fn group_id(&self) -> Option<&str> {
        self.group_v2
            .as_ref()
            .and_then(|g| g.id.as_deref())
            .or_else(|| self.group_info.as_ref().and_then(|g| g.group_id.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupV2 {
    #[serde(default)]
    pub id: Option<String>,
}

/// A response whose `type` is not registered, kept as an open mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownResponse {
    pub type_name: String,
    pub id: Option<String>,
    pub fields: Map<String, Value>,
}

impl UnknownResponse {
    /// Builds the open mapping from a decoded JSON object.
    pub fn from_fields(type_name: impl Into<String>, fields: Map<String, Value>) -> Self {
        let id = fields.get("id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self {
            type_name: type_name.into(),
            id,
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// A decoded daemon response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Version(VersionResponse),
    Subscribed(Subscribed),
    User(UserResponse),
    Message(Box<IncomingMessage>),
    UnexpectedError(UnexpectedError),
    Unknown(UnknownResponse),
}

impl Response {
    /// Wire discriminator this response was decoded from.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Version(_) => "version",
            Self::Subscribed(_) => "subscribed",
            Self::User(_) => "user",
            Self::Message(_) => "message",
            Self::UnexpectedError(_) => "unexpected_error",
            Self::Unknown(u) => &u.type_name,
        }
    }

    /// Echoed request id, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Version(r) => r.id.as_deref(),
            Self::Subscribed(r) => r.id.as_deref(),
            Self::User(r) => r.id.as_deref(),
            Self::Message(r) => r.id.as_deref(),
            Self::UnexpectedError(r) => r.id.as_deref(),
            Self::Unknown(r) => r.id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_with_address_source() {
        let data: MessageData = serde_json::from_value(serde_json::json!({
            "username": "+1000",
            "source": {"number": "+1555", "uuid": "u-1"},
            "timestamp": 1700000000000_i64,
            "dataMessage": {
                "timestamp": 1700000000000_i64,
                "body": "ping",
                "groupInfo": {"groupId": "g1", "type": "DELIVER"}
            },
            "isReceipt": false
        }))
        .unwrap();

        assert_eq!(data.username.as_deref(), Some("+1000"));
        assert_eq!(data.source_number(), Some("+1555"));
        let chat = data.data_message.as_ref().unwrap();
        assert_eq!(chat.body.as_deref(), Some("ping"));
        assert_eq!(chat.group_id(), Some("g1"));
        assert_eq!(data.extra.get("isReceipt"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_message_with_bare_number_source() {
        let data: MessageData = serde_json::from_value(serde_json::json!({
            "username": "+1000",
            "source": "+1555"
        }))
        .unwrap();

        assert_eq!(data.source_number(), Some("+1555"));
        assert!(data.data_message.is_none());
    }

    #[test]
    fn test_group_v2_preferred() {
        let chat: DataMessage = serde_json::from_value(serde_json::json!({
            "groupInfo": {"groupId": "old"},
            "groupV2": {"id": "new"}
        }))
        .unwrap();
        assert_eq!(chat.group_id(), Some("new"));
    }

    #[test]
    fn test_unknown_response_id_extraction() {
        let fields = serde_json::json!({"type": "listen_started", "id": 12, "data": "x"});
        let Value::Object(map) = fields else {
            panic!("expected object")
        };
        let unknown = UnknownResponse::from_fields("listen_started", map);
        assert_eq!(unknown.id.as_deref(), Some("12"));
        assert_eq!(unknown.get("data"), Some(&Value::String("x".to_string())));
    }
}
