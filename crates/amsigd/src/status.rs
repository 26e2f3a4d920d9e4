//! Daemon liveness state shared by the dispatch and keepalive loops.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use amsig_protocol::{RequestId, VersionInfo};

#[derive(Debug, Default)]
struct StatusInner {
    daemon: Option<VersionInfo>,
    last_keepalive: Option<DateTime<Utc>>,
}

/// What is known about the daemon on the other end of the socket.
#[derive(Debug, Default)]
pub struct DaemonStatus {
    inner: RwLock<StatusInner>,

    /// Set from inside the connection's write lock, so it cannot await
    keepalive_id: Mutex<Option<RequestId>>,
}

impl DaemonStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_daemon_info(&self, info: VersionInfo) {
        self.inner.write().await.daemon = Some(info);
    }

    pub async fn daemon_info(&self) -> Option<VersionInfo> {
        self.inner.read().await.daemon.clone()
    }

    /// Records the id of the most recent keepalive lookup, replacing the last.
    pub fn set_keepalive_id(&self, id: RequestId) {
        *self.lock_keepalive_id() = Some(id);
    }

    pub fn keepalive_id(&self) -> Option<RequestId> {
        self.lock_keepalive_id().clone()
    }

    fn lock_keepalive_id(&self) -> MutexGuard<'_, Option<RequestId>> {
        self.keepalive_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a keepalive success if `id` matches the outstanding lookup.
    ///
    /// Only the last issued lookup id is compared. Returns the recorded
    /// timestamp on a match.
    pub async fn record_keepalive_response(&self, id: Option<&str>) -> Option<DateTime<Utc>> {
        let matched = matches!(
            (self.keepalive_id().as_ref(), id),
            (Some(expected), Some(got)) if expected.as_str() == got
        );
        if !matched {
            return None;
        }
        let now = Utc::now();
        self.inner.write().await.last_keepalive = Some(now);
        Some(now)
    }

    pub async fn last_keepalive(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_keepalive
    }
}
