//! Inbound chat commands.
//!
//! Only sources that appear among the configured receiver destinations get
//! an answer; everything else is dropped so the bridge never relays for
//! strangers.

use std::sync::Arc;

use amsig_core::ReceiverTable;
use amsig_protocol::{JsonAddress, Quote, RequestId, SendMessage};
use tracing::{debug, info, warn};

use crate::connection::RequestSink;
use crate::metrics::BridgeMetrics;

const PING: &str = "ping";
const PONG: &str = "pong";

/// Chat content extracted from a `message` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundChat {
    /// Local account the message arrived on; replies are sent from it
    pub username: String,
    /// Sender's number
    pub source: String,
    pub group_id: Option<String>,
    pub body: String,
    /// Sent timestamp, used to quote the message in replies
    pub timestamp: Option<i64>,
}

/// What the handler did with one inbound message.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Disabled,
    Denied,
    /// Authorized, but not a known command
    Ignored,
    Replied(RequestId),
    Failed,
}

/// Answers `ping` from authorized sources through the shared sink.
pub struct CommandHandler {
    sink: Arc<dyn RequestSink>,
    receivers: Arc<ReceiverTable>,
    enabled: bool,
    metrics: Arc<BridgeMetrics>,
}

impl CommandHandler {
    pub fn new(
        sink: Arc<dyn RequestSink>,
        receivers: Arc<ReceiverTable>,
        enabled: bool,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            sink,
            receivers,
            enabled,
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Authorizes and answers one inbound message. Never fails: send errors
    /// are logged and counted.
    pub async fn handle(&self, chat: &InboundChat) -> CommandOutcome {
        if !self.enabled {
            return CommandOutcome::Disabled;
        }

        if !self
            .receivers
            .authorizes(&chat.source, chat.group_id.as_deref())
        {
            info!(
                source = %chat.source,
                group_id = ?chat.group_id,
                "Dropping message from unrecognized source"
            );
            return CommandOutcome::Denied;
        }

        if !chat.body.eq_ignore_ascii_case(PING) {
            debug!(source = %chat.source, "No command in message");
            return CommandOutcome::Ignored;
        }

        let reply = pong(chat);
        match self.sink.send(reply.into()).await {
            Ok(id) => {
                self.metrics.messages_sent.inc(&[("kind", "reply")]);
                debug!(source = %chat.source, id = %id, "Answered ping");
                CommandOutcome::Replied(id)
            }
            Err(e) => {
                self.metrics.send_errors.inc(&[("kind", "reply")]);
                warn!(error = %e, source = %chat.source, "Failed to answer ping");
                CommandOutcome::Failed
            }
        }
    }
}

fn pong(chat: &InboundChat) -> SendMessage {
    let reply = match &chat.group_id {
        Some(group) => SendMessage::to_group(&chat.username, group, PONG),
        None => SendMessage::to_number(&chat.username, &chat.source, PONG),
    };
    match chat.timestamp {
        Some(ts) => reply.with_quote(Quote {
            id: ts,
            author: JsonAddress::number(&chat.source),
            text: chat.body.clone(),
        }),
        None => reply,
    }
}
