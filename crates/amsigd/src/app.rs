//! Application context shared by the HTTP handlers and background tasks.
//!
//! Built once at startup from the resolved configuration; every component
//! gets its collaborators from here instead of from globals.

use std::sync::Arc;

use amsig_core::ReceiverTable;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{DaemonConnection, RequestSink};
use crate::dispatch::OutputDispatcher;
use crate::error::ConfigError;
use crate::keepalive::Keepalive;
use crate::metrics::{BridgeMetrics, MetricKind, ScrapeSample};
use crate::router::AlertRouter;
use crate::status::DaemonStatus;
use crate::templates::{PlaceholderTemplates, TemplateEngine};

#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    connection: Arc<DaemonConnection>,
    router: AlertRouter,
    commands: Arc<CommandHandler>,
    status: Arc<DaemonStatus>,
    metrics: Arc<BridgeMetrics>,
    keepalive_sender: Option<String>,
}

impl AppContext {
    /// Builds the context, loading template files. Does not connect.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let templates: Arc<dyn TemplateEngine> =
            Arc::new(PlaceholderTemplates::load_files(&config.template_files)?);

        let receivers = Arc::new(config.receivers);
        let connection = Arc::new(
            DaemonConnection::new(config.socket_path)
                .with_subscriptions(receivers.subscribed_senders()),
        );
        let keepalive_sender = if config.keepalive_enabled {
            config.keepalive_sender
        } else {
            None
        };

        Ok(Self::with_connection(
            connection,
            receivers,
            templates,
            config.commands_enabled,
            keepalive_sender,
        ))
    }

    /// Assembles the context around an existing connection.
    pub fn with_connection(
        connection: Arc<DaemonConnection>,
        receivers: Arc<ReceiverTable>,
        templates: Arc<dyn TemplateEngine>,
        commands_enabled: bool,
        keepalive_sender: Option<String>,
    ) -> Self {
        let metrics = Arc::new(BridgeMetrics::default());
        let status = Arc::new(DaemonStatus::new());
        let sink: Arc<dyn RequestSink> = connection.clone();

        let router = AlertRouter::new(
            sink.clone(),
            receivers.clone(),
            templates,
            metrics.clone(),
        );
        let commands = Arc::new(CommandHandler::new(
            sink,
            receivers,
            commands_enabled,
            metrics.clone(),
        ));

        Self {
            inner: Arc::new(AppContextInner {
                connection,
                router,
                commands,
                status,
                metrics,
                keepalive_sender,
            }),
        }
    }

    pub fn connection(&self) -> &Arc<DaemonConnection> {
        &self.inner.connection
    }

    pub fn router(&self) -> &AlertRouter {
        &self.inner.router
    }

    pub fn status(&self) -> &Arc<DaemonStatus> {
        &self.inner.status
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.inner.metrics
    }

    /// Samples read from the connection at scrape time.
    pub fn metrics_extra(&self) -> Vec<ScrapeSample> {
        let connection = &self.inner.connection;
        vec![
            ScrapeSample {
                name: "amsig_daemon_connected",
                kind: MetricKind::Gauge,
                value: u64::from(connection.is_connected()),
            },
            ScrapeSample {
                name: "amsig_daemon_connect_attempts_total",
                kind: MetricKind::Counter,
                value: connection.connect_attempts(),
            },
        ]
    }

    /// Spawns the dispatch loop and, when configured, the keepalive loop.
    pub fn spawn_background(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);

        let dispatcher = OutputDispatcher::new(
            self.inner.connection.clone(),
            self.inner.commands.clone(),
            self.inner.status.clone(),
            self.inner.metrics.clone(),
        );
        tasks.push(tokio::spawn(dispatcher.run(cancel.clone())));

        match &self.inner.keepalive_sender {
            Some(username) => {
                let keepalive = Keepalive::new(
                    self.inner.connection.clone(),
                    self.inner.status.clone(),
                    self.inner.metrics.clone(),
                    username.clone(),
                );
                tasks.push(tokio::spawn(keepalive.run(cancel.clone())));
            }
            None => info!("Keepalive disabled"),
        }

        if !self.inner.commands.is_enabled() {
            info!("Inbound commands disabled");
        }
        tasks
    }

    /// Initial connect; failure is not fatal, the dispatch loop retries.
    pub async fn connect(&self) {
        if let Err(e) = self.inner.connection.connect().await {
            warn!(error = %e, "Daemon not reachable yet, will retry");
        }
    }
}
