//! Output dispatch loop: the single reader of the daemon socket.
//!
//! Drains responses while connected, then reconnects with exponential
//! backoff. Runs until cancelled.

use std::sync::Arc;
use std::time::Duration;

use amsig_protocol::{IncomingMessage, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{CommandHandler, InboundChat};
use crate::connection::DaemonConnection;
use crate::metrics::BridgeMetrics;
use crate::status::DaemonStatus;

/// Maximum backoff exponent: delays cap at 2^6 = 64 seconds.
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Reconnect delay sequence: 1, 2, 4, ... 64, 64, ... seconds.
#[derive(Debug, Default, Clone)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    /// Starts at the one second step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delay for the current attempt and advances.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(MAX_BACKOFF_EXPONENT);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs(1u64 << exponent)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Sole reader of the daemon socket; routes each response to its handler.
pub struct OutputDispatcher {
    connection: Arc<DaemonConnection>,
    commands: Arc<CommandHandler>,
    status: Arc<DaemonStatus>,
    metrics: Arc<BridgeMetrics>,
    backoff: Backoff,
}

impl OutputDispatcher {
    pub fn new(
        connection: Arc<DaemonConnection>,
        commands: Arc<CommandHandler>,
        status: Arc<DaemonStatus>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            connection,
            commands,
            status,
            metrics,
            backoff: Backoff::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Output dispatch loop started");

        loop {
            self.drain(&cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            let delay = self.backoff.next_delay();
            debug!(delay_secs = delay.as_secs(), "Waiting before reconnect");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.connection.connect().await {
                Ok(()) => {
                    info!("Reconnected to daemon");
                    self.backoff.reset();
                }
                Err(e) => warn!(error = %e, "Reconnect failed"),
            }
        }

        info!("Output dispatch loop stopped");
    }

    async fn drain(&self, cancel: &CancellationToken) {
        while self.connection.is_connected() {
            let response = tokio::select! {
                _ = cancel.cancelled() => return,
                r = self.connection.receive() => r,
            };
            match response {
                Ok(response) => self.handle_response(response).await,
                Err(e) => warn!(error = %e, "Receive from daemon failed"),
            }
        }
    }

    /// Acts on one decoded response.
    pub async fn handle_response(&self, response: Response) {
        match response {
            Response::Version(v) => {
                info!(name = %v.data.name, version = %v.data.version, "Daemon version");
                self.metrics.set_daemon_info(&v.data.name, &v.data.version);
                self.status.set_daemon_info(v.data).await;
            }
            Response::User(user) => {
                if let Some(at) = self
                    .status
                    .record_keepalive_response(user.id.as_deref())
                    .await
                {
                    debug!(id = ?user.id, "Keepalive answered");
                    self.metrics
                        .keepalive_last_success
                        .set(&[], at.timestamp());
                } else {
                    debug!(id = ?user.id, "Ignoring uncorrelated user response");
                }
            }
            Response::Message(message) => {
                if let Some(chat) = extract_chat(&message) {
                    self.commands.handle(&chat).await;
                }
            }
            Response::UnexpectedError(e) => {
                warn!(id = ?e.id, message = ?e.message(), "Daemon reported an error");
            }
            other => {
                debug!(response_type = other.type_name(), id = ?other.id(), "Unhandled response");
            }
        }
    }
}

/// Chat content of an inbound event, if it is a chat message with a known
/// account and sender.
pub fn extract_chat(message: &IncomingMessage) -> Option<InboundChat> {
    let data = &message.data;
    let Some(chat) = data.data_message.as_ref() else {
        debug!("Ignoring message event without chat content");
        return None;
    };
    let (Some(username), Some(source)) = (data.username.as_ref(), data.source_number()) else {
        debug!("Ignoring message event without username or source");
        return None;
    };
    Some(InboundChat {
        username: username.clone(),
        source: source.to_string(),
        group_id: chat.group_id().map(str::to_string),
        body: chat.body.clone().unwrap_or_default(),
        timestamp: chat.timestamp.or(data.timestamp),
    })
}
