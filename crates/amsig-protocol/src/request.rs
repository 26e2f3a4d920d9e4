//! Requests sent from amsig to the daemon.

use crate::version::ProtocolVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a request at send time.
///
/// Ids are decimal strings of a per-process counter; responses echo them
/// back for correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
}

impl JsonAddress {
    /// Address by phone number.
    pub fn number(number: impl Into<String>) -> Self {
        Self {
            number: Some(number.into()),
            ..Default::default()
        }
    }
}

/// File attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_filename: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub voice_note: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Reference to an earlier message, shown as a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Timestamp of the quoted message
    pub id: i64,
    pub author: JsonAddress,
    pub text: String,
}

/// Send a chat message to an account or a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Account to send from
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<JsonAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_group_id: Option<String>,
    pub message_body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
}

impl SendMessage {
    /// Message addressed to a single account by number.
    pub fn to_number(
        username: impl Into<String>,
        number: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            recipient_address: Some(JsonAddress::number(number)),
            recipient_group_id: None,
            message_body: body.into(),
            attachments: Vec::new(),
            quote: None,
        }
    }

    /// Message addressed to a group.
    pub fn to_group(
        username: impl Into<String>,
        group_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            recipient_address: None,
            recipient_group_id: Some(group_id.into()),
            message_body: body.into(),
            attachments: Vec::new(),
            quote: None,
        }
    }

    /// Attaches a quote of an earlier message.
    #[must_use]
    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = Some(quote);
        self
    }
}

/// Ask the daemon to push inbound messages for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub username: String,
}

/// Look up an account as seen by `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUser {
    pub username: String,
    pub recipient_address: JsonAddress,
}

/// Request payloads, discriminated on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    Send(SendMessage),
    Subscribe(Subscribe),
    GetUser(GetUser),
}

impl RequestBody {
    /// Wire discriminator of this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Send(_) => "send",
            Self::Subscribe(_) => "subscribe",
            Self::GetUser(_) => "get_user",
        }
    }

    /// Creates a subscribe request.
    pub fn subscribe(username: impl Into<String>) -> Self {
        Self::Subscribe(Subscribe {
            username: username.into(),
        })
    }

    /// Creates a lookup of `username`'s own account, used as a liveness check.
    pub fn self_lookup(username: impl Into<String>) -> Self {
        let username = username.into();
        Self::GetUser(GetUser {
            recipient_address: JsonAddress::number(username.clone()),
            username,
        })
    }
}

impl From<SendMessage> for RequestBody {
    fn from(send: SendMessage) -> Self {
        Self::Send(send)
    }
}

/// A request with its envelope, as written to the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProtocolVersion>,

    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    /// Wraps a body in an envelope for the current protocol version.
    pub fn new(id: RequestId, body: RequestBody) -> Self {
        Self {
            id,
            version: Some(ProtocolVersion::CURRENT),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_number_serialization() {
        let req = Request::new(
            RequestId::from(7),
            SendMessage::to_number("+1000", "+1555", "disk full").into(),
        );
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();

        assert_eq!(json["type"], "send");
        assert_eq!(json["id"], "7");
        assert_eq!(json["version"], "v0");
        assert_eq!(json["username"], "+1000");
        assert_eq!(json["recipientAddress"]["number"], "+1555");
        assert_eq!(json["messageBody"], "disk full");
        assert!(json.get("recipientGroupId").is_none());
        assert!(json.get("attachments").is_none());
        assert!(json.get("quote").is_none());
    }

    #[test]
    fn test_send_to_group_serialization() {
        let req = Request::new(
            RequestId::from(1),
            SendMessage::to_group("+1000", "abc==", "hi").into(),
        );
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();

        assert_eq!(json["recipientGroupId"], "abc==");
        assert!(json.get("recipientAddress").is_none());
    }

    #[test]
    fn test_quote_serialization() {
        let send = SendMessage::to_number("+1000", "+1555", "pong").with_quote(Quote {
            id: 1700000000000,
            author: JsonAddress::number("+1555"),
            text: "ping".to_string(),
        });
        let json: serde_json::Value = serde_json::to_value(RequestBody::from(send)).unwrap();

        assert_eq!(json["quote"]["id"], 1700000000000_i64);
        assert_eq!(json["quote"]["author"]["number"], "+1555");
    }

    #[test]
    fn test_self_lookup() {
        let body = RequestBody::self_lookup("+1000");
        assert_eq!(body.type_name(), "get_user");

        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "get_user");
        assert_eq!(json["username"], "+1000");
        assert_eq!(json["recipientAddress"]["number"], "+1000");
    }

    #[test]
    fn test_type_name_matches_wire_tag() {
        for body in [
            RequestBody::subscribe("+1000"),
            RequestBody::self_lookup("+1000"),
            SendMessage::to_group("+1000", "g", "b").into(),
        ] {
            let json = serde_json::to_value(&body).unwrap();
            assert_eq!(json["type"], body.type_name());
        }
    }

    #[test]
    fn test_request_roundtrip() {
        let original = Request::new(RequestId::from(3), RequestBody::subscribe("+1000"));
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
