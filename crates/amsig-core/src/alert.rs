//! Alertmanager webhook payload.
//!
//! Field names follow the Alertmanager `webhook_config` JSON format. The
//! message is immutable once received; the router and the template engine
//! only ever borrow it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label or annotation set. Ordered so rendered output is deterministic.
pub type LabelSet = BTreeMap<String, String>;

/// Status of an alert group or of a single alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
    /// Any status string this version does not know about
    #[serde(other)]
    Unknown,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON message POSTed by Alertmanager to a webhook receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMessage {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub status: AlertStatus,
    pub receiver: String,
    #[serde(default)]
    pub group_labels: LabelSet,
    #[serde(default)]
    pub common_labels: LabelSet,
    #[serde(default)]
    pub common_annotations: LabelSet,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// A single alert contained in an [`AlertMessage`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = r#"{
        "version": "4",
        "groupKey": "{}:{alertname=\"HighLoad\"}",
        "status": "firing",
        "receiver": "ops",
        "groupLabels": {"alertname": "HighLoad"},
        "commonLabels": {"alertname": "HighLoad", "severity": "page"},
        "commonAnnotations": {"summary": "load is high"},
        "externalURL": "http://alertmanager:9093",
        "alerts": [
            {
                "status": "firing",
                "labels": {"instance": "web-1"},
                "annotations": {},
                "startsAt": "2024-01-15T10:00:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus:9090/graph"
            },
            {
                "status": "resolved",
                "labels": {"instance": "web-2"},
                "startsAt": "2024-01-15T09:00:00Z",
                "endsAt": "2024-01-15T09:30:00Z",
                "generatorURL": ""
            }
        ]
    }"#;

    #[test]
    fn test_parse_webhook_payload() {
        let msg: AlertMessage = serde_json::from_str(WEBHOOK).unwrap();

        assert_eq!(msg.receiver, "ops");
        assert_eq!(msg.status, AlertStatus::Firing);
        assert_eq!(msg.external_url, "http://alertmanager:9093");
        assert_eq!(msg.common_labels.get("severity").map(String::as_str), Some("page"));
        assert_eq!(msg.alerts.len(), 2);
        assert_eq!(msg.alerts[0].generator_url, "http://prometheus:9090/graph");
        assert!(msg.alerts[0].starts_at.is_some());
    }

    #[test]
    fn test_parse_minimal_payload() {
        let msg: AlertMessage = serde_json::from_str(r#"{"receiver": "ops"}"#).unwrap();
        assert_eq!(msg.receiver, "ops");
        assert!(msg.alerts.is_empty());
        assert!(msg.group_labels.is_empty());
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let msg: AlertMessage =
            serde_json::from_str(r#"{"receiver": "ops", "status": "silenced"}"#).unwrap();
        assert_eq!(msg.status, AlertStatus::Unknown);
    }

    #[test]
    fn test_serialize_uses_webhook_field_names() {
        let msg: AlertMessage = serde_json::from_str(WEBHOOK).unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("externalURL").is_some());
        assert!(value.get("commonLabels").is_some());
        assert_eq!(value["alerts"][0]["generatorURL"], "http://prometheus:9090/graph");
    }
}
