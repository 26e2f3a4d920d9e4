//! Periodic self-lookup that keeps the daemon's session warm.

use std::sync::Arc;
use std::time::Duration;

use amsig_protocol::{RequestBody, RequestId};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::RequestSink;
use crate::error::ConnectionError;
use crate::metrics::BridgeMetrics;
use crate::status::DaemonStatus;

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(300);

/// Periodic `get_user` self-lookup whose reply marks the daemon alive.
pub struct Keepalive {
    sink: Arc<dyn RequestSink>,
    status: Arc<DaemonStatus>,
    metrics: Arc<BridgeMetrics>,
    username: String,
    interval: Duration,
}

impl Keepalive {
    pub fn new(
        sink: Arc<dyn RequestSink>,
        status: Arc<DaemonStatus>,
        metrics: Arc<BridgeMetrics>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            status,
            metrics,
            username: username.into(),
            interval: KEEPALIVE_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sends one self-lookup and records its id as the outstanding keepalive.
    ///
    /// The id is recorded before the frame is written, so even an immediate
    /// reply finds it.
    pub async fn lookup_self(&self) -> Result<RequestId, ConnectionError> {
        let status = &self.status;
        match self
            .sink
            .send_tracked(
                RequestBody::self_lookup(self.username.clone()),
                &|id: &RequestId| status.set_keepalive_id(id.clone()),
            )
            .await
        {
            Ok(id) => {
                self.metrics.messages_sent.inc(&[("kind", "keepalive")]);
                debug!(id = %id, username = %self.username, "Keepalive sent");
                Ok(id)
            }
            Err(e) => {
                self.metrics.send_errors.inc(&[("kind", "keepalive")]);
                Err(e)
            }
        }
    }

    /// Sends a self-lookup once per interval, starting one interval from now.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            username = %self.username,
            interval_secs = self.interval.as_secs(),
            "Keepalive loop started"
        );
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.lookup_self().await {
                        warn!(error = %e, "Keepalive failed");
                    }
                }
            }
        }
        info!("Keepalive loop stopped");
    }
}
