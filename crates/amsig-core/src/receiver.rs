//! Receivers: named routing targets for Alertmanager groups.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DomainError, DomainResult};

/// Prefix of an individual (phone number) destination.
pub const NUMBER_PREFIX: &str = "tel:";

/// Prefix of a group destination.
pub const GROUP_PREFIX: &str = "group:";

// ============================================================================
// Destination
// ============================================================================

/// A classified destination.
///
/// Receivers store their destinations as template strings; once rendered,
/// the string is classified by prefix into one of these forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Destination {
    /// `tel:<number>`
    Number(String),
    /// `group:<id>`
    Group(String),
}

impl Destination {
    /// Classifies a rendered destination string.
    ///
    /// An empty remainder after the prefix is treated as unrecognized.
    pub fn parse(value: &str) -> DomainResult<Self> {
        let value = value.trim();
        let unrecognized = || DomainError::UnrecognizedDestination {
            value: value.to_string(),
        };

        if let Some(number) = value.strip_prefix(NUMBER_PREFIX) {
            if number.is_empty() {
                return Err(unrecognized());
            }
            return Ok(Self::Number(number.to_string()));
        }
        if let Some(group) = value.strip_prefix(GROUP_PREFIX) {
            if group.is_empty() {
                return Err(unrecognized());
            }
            return Ok(Self::Group(group.to_string()));
        }
        Err(unrecognized())
    }

    /// Returns true if an inbound event from `source` (optionally inside
    /// `group_id`) is addressed by this destination.
    pub fn matches(&self, source: &str, group_id: Option<&str>) -> bool {
        match self {
            Self::Number(number) => number == source,
            Self::Group(group) => group_id.is_some_and(|g| g == group),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{NUMBER_PREFIX}{n}"),
            Self::Group(g) => write!(f, "{GROUP_PREFIX}{g}"),
        }
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// A configured routing target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Unique key, matched against the webhook's `receiver` field
    pub name: String,
    /// Daemon account (registered number) messages are sent from
    pub sender: String,
    /// Destination templates, each rendering to `tel:...` or `group:...`
    pub to: Vec<String>,
    /// Name of the notification body template
    pub template: String,
    /// Keep a persistent daemon subscription for `sender`
    pub subscribe: bool,
}

// ============================================================================
// Receiver Table
// ============================================================================

/// Lookup table of receivers keyed by name.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReceiverTable {
    receivers: HashMap<String, Receiver>,
}

impl ReceiverTable {
    /// Builds the table, rejecting ambiguous routing configurations.
    ///
    /// # Errors
    ///
    /// - `DomainError::NoReceivers` if the list is empty
    /// - `DomainError::MissingReceiverName` if an entry has an empty name
    /// - `DomainError::DuplicateReceiver` if two entries share a name
    /// - `DomainError::MissingSender` if an entry has no sender
    pub fn new(receivers: Vec<Receiver>) -> DomainResult<Self> {
        if receivers.is_empty() {
            return Err(DomainError::NoReceivers);
        }

        let mut table = HashMap::with_capacity(receivers.len());
        for (index, receiver) in receivers.into_iter().enumerate() {
            if receiver.name.is_empty() {
                return Err(DomainError::MissingReceiverName { index });
            }
            if receiver.sender.is_empty() {
                return Err(DomainError::MissingSender {
                    name: receiver.name,
                });
            }
            if table.contains_key(&receiver.name) {
                return Err(DomainError::DuplicateReceiver {
                    name: receiver.name,
                });
            }
            table.insert(receiver.name.clone(), receiver);
        }

        Ok(Self { receivers: table })
    }

    /// Looks up a receiver by name.
    pub fn get(&self, name: &str) -> Option<&Receiver> {
        self.receivers.get(name)
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Returns true if an inbound event from `source` (optionally in
    /// `group_id`) matches a destination of any configured receiver.
    ///
    /// Destinations are compared in their configured (unrendered) form;
    /// entries that are not a literal `tel:` or `group:` string never match.
    pub fn authorizes(&self, source: &str, group_id: Option<&str>) -> bool {
        let allowed = self
            .receivers
            .values()
            .flat_map(|r| r.to.iter())
            .filter_map(|to| Destination::parse(to).ok())
            .any(|dest| dest.matches(source, group_id));

        if !allowed {
            debug!(source, group_id = ?group_id, "No receiver destination matches source");
        }
        allowed
    }

    /// Distinct sender identities whose receivers request a subscription.
    pub fn subscribed_senders(&self) -> Vec<String> {
        self.receivers
            .values()
            .filter(|r| r.subscribe)
            .map(|r| r.sender.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
