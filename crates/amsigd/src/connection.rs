//! Connection to the signald daemon.
//!
//! `DaemonConnection` owns the Unix socket and is shared by every task that
//! talks to the daemon:
//! - Alert routing and inbound command replies call `send`
//! - The keepalive loop calls `send_tracked`, so the id is known before the
//!   daemon can answer
//! - The output dispatch loop is the only caller of `receive`
//!
//! # Connection Lifecycle
//!
//! ```text
//!            connect() / send() while disconnected
//!   ┌──────────────┐ ───────────────────────────▶ ┌───────────┐
//!   │ Disconnected │                              │ Connected │
//!   └──────────────┘ ◀─────────────────────────── └───────────┘
//!            any read/write/decode error, disconnect()
//! ```
//!
//! The daemon drops its clients when it restarts. Every I/O failure tears the
//! socket down in one place, so the next `send` reconnects lazily and the
//! dispatch loop reconnects with backoff.
//!
//! # Locking
//!
//! The write half, the request id counter and the connection generation
//! live behind one mutex, so concurrent senders never interleave frames or
//! reuse ids. The read half lives behind a second mutex taken only by
//! `receive`. Lock order is write state, then read state; `receive` never
//! waits on the write state while holding the read state.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amsig_protocol::{Request, RequestBody, RequestId, Response, ResponseRegistry};

use crate::error::ConnectionError;

/// Default signald socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/signald/signald.sock";

// ============================================================================
// Request Sink
// ============================================================================

/// Callback invoked with a request's id once it is assigned.
pub type OnAssigned<'a> = &'a (dyn Fn(&RequestId) + Send + Sync);

/// Anything that can deliver a request to the daemon.
///
/// The router, command handler and keepalive loop depend on this rather
/// than on the socket, so they can be exercised without a daemon.
#[async_trait]
pub trait RequestSink: Send + Sync {
    /// Sends one request and returns the id assigned to it.
    async fn send(&self, body: RequestBody) -> Result<RequestId, ConnectionError> {
        self.send_tracked(body, &|_: &RequestId| {}).await
    }

    /// Like `send`, but hands the id to `on_assigned` before the frame is
    /// written. A reply can only be read after the callback has returned.
    async fn send_tracked(
        &self,
        body: RequestBody,
        on_assigned: OnAssigned<'_>,
    ) -> Result<RequestId, ConnectionError>;
}

// ============================================================================
// Connection State
// ============================================================================

struct WriteState {
    writer: Option<OwnedWriteHalf>,
    next_id: u64,
    /// Incremented on every successful connect
    generation: u64,
    /// Cancelled when the current generation is torn down
    closed: CancellationToken,
}

struct ReadState {
    lines: Lines<BufReader<OwnedReadHalf>>,
    generation: u64,
    closed: CancellationToken,
}

/// Reconnecting newline-delimited JSON client for the daemon socket.
pub struct DaemonConnection {
    socket_path: PathBuf,

    /// Accounts re-subscribed after every successful connect
    subscriptions: Vec<String>,

    registry: &'static ResponseRegistry,

    state: Mutex<WriteState>,

    inbound: Mutex<Option<ReadState>>,

    /// Mirrors `state.writer.is_some()` for lock-free checks
    connected: AtomicBool,

    connect_attempts: AtomicU64,
}

impl DaemonConnection {
    /// Creates a disconnected client for the socket at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            subscriptions: Vec::new(),
            registry: ResponseRegistry::global(),
            state: Mutex::new(WriteState {
                writer: None,
                next_id: 0,
                generation: 0,
                closed: CancellationToken::new(),
            }),
            inbound: Mutex::new(None),
            connected: AtomicBool::new(false),
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Sets the accounts to subscribe right after each connect.
    #[must_use]
    pub fn with_subscriptions(mut self, usernames: Vec<String>) -> Self {
        self.subscriptions = usernames;
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// True iff a live socket is held.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of socket opens attempted over the process lifetime.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Opens the socket if not already connected.
    ///
    /// On failure the connection stays disconnected; retrying is up to the
    /// caller.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if state.writer.is_some() {
            return Ok(());
        }
        self.open(&mut state).await
    }

    /// Sends a request, connecting first if needed.
    ///
    /// A disconnected client makes exactly one connect attempt and fails
    /// fast if it does not succeed. Once connected, the request gets the
    /// next id whether or not the write succeeds, so ids are never reused.
    pub async fn send(&self, body: RequestBody) -> Result<RequestId, ConnectionError> {
        self.send_tracked(body, &|_: &RequestId| {}).await
    }

    /// Sends a request, calling `on_assigned` under the write lock after the
    /// id is assigned and before any byte reaches the socket.
    ///
    /// The callback also runs when the write then fails; that id is spent.
    pub async fn send_tracked(
        &self,
        body: RequestBody,
        on_assigned: OnAssigned<'_>,
    ) -> Result<RequestId, ConnectionError> {
        let mut state = self.state.lock().await;
        if state.writer.is_none() {
            self.open(&mut state).await?;
        }
        self.write_locked(&mut state, body, Some(on_assigned)).await
    }

    /// Reads and decodes the next response.
    ///
    /// Never connects: fails with `NotConnected` when no socket is held. Any
    /// read or decode failure tears the connection down before returning.
    /// Unknown response types are not failures.
    pub async fn receive(&self) -> Result<Response, ConnectionError> {
        let mut inbound = self.inbound.lock().await;
        let Some(read) = inbound.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        let generation = read.generation;
        let closed = read.closed.clone();

        let outcome = tokio::select! {
            biased;

            _ = closed.cancelled() => Err(ConnectionError::NotConnected),

            line = next_frame(&mut read.lines) => match line {
                Ok(Some(line)) => {
                    debug!("< {line}");
                    self.registry.decode_line(&line).map_err(ConnectionError::from)
                }
                Ok(None) => Err(ConnectionError::Closed),
                Err(e) => Err(ConnectionError::Io(e)),
            },
        };

        match outcome {
            Ok(response) => Ok(response),
            Err(e) => {
                // Release the read side before taking the write side
                *inbound = None;
                drop(inbound);
                self.teardown(generation).await;
                Err(e)
            }
        }
    }

    /// Closes the socket. No-op when already disconnected.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if state.writer.is_some() {
            info!(socket = %self.socket_path.display(), "Disconnecting from daemon");
        }
        self.teardown_locked(&mut state);
        *self.inbound.lock().await = None;
    }

    async fn open(&self, state: &mut WriteState) -> Result<(), ConnectionError> {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        debug!(socket = %self.socket_path.display(), "Connecting to daemon");

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ConnectionError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        let (reader, writer) = stream.into_split();

        state.generation = state.generation.wrapping_add(1);
        state.closed = CancellationToken::new();
        state.writer = Some(writer);
        *self.inbound.lock().await = Some(ReadState {
            lines: BufReader::new(reader).lines(),
            generation: state.generation,
            closed: state.closed.clone(),
        });
        self.connected.store(true, Ordering::Release);

        info!(
            socket = %self.socket_path.display(),
            generation = state.generation,
            "Connected to daemon"
        );

        for username in &self.subscriptions {
            self.write_locked(state, RequestBody::subscribe(username.clone()), None)
                .await?;
        }
        Ok(())
    }

    async fn write_locked(
        &self,
        state: &mut WriteState,
        body: RequestBody,
        on_assigned: Option<OnAssigned<'_>>,
    ) -> Result<RequestId, ConnectionError> {
        state.next_id = state.next_id.wrapping_add(1);
        let id = RequestId::from(state.next_id);

        let request = Request::new(id.clone(), body);
        let mut frame = serde_json::to_string(&request)?;
        debug!("> {frame}");
        frame.push('\n');

        if let Some(on_assigned) = on_assigned {
            on_assigned(&id);
        }

        let Some(writer) = state.writer.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        let result = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(
                error = %e,
                request_type = request.body.type_name(),
                id = %id,
                "Write to daemon failed, dropping connection"
            );
            self.teardown_locked(state);
            return Err(ConnectionError::Io(e));
        }
        Ok(id)
    }

    /// Tears down `generation` if it is still the live connection.
    async fn teardown(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation {
            self.teardown_locked(&mut state);
        }
    }

    fn teardown_locked(&self, state: &mut WriteState) {
        if state.writer.take().is_some() {
            debug!(generation = state.generation, "Daemon connection torn down");
        }
        state.closed.cancel();
        self.connected.store(false, Ordering::Release);
    }
}

#[async_trait]
impl RequestSink for DaemonConnection {
    async fn send_tracked(
        &self,
        body: RequestBody,
        on_assigned: OnAssigned<'_>,
    ) -> Result<RequestId, ConnectionError> {
        DaemonConnection::send_tracked(self, body, on_assigned).await
    }
}

/// Next non-blank line.
async fn next_frame(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
) -> std::io::Result<Option<String>> {
    loop {
        match lines.next_line().await? {
            Some(line) if line.trim().is_empty() => continue,
            other => return Ok(other),
        }
    }
}
