//! Alert routing: one webhook message in, one `send` per destination out.

use std::sync::Arc;

use amsig_core::{AlertMessage, Destination, Receiver, ReceiverTable};
use amsig_protocol::SendMessage;
use tracing::{debug, info, warn};

use crate::connection::RequestSink;
use crate::error::{RouteError, TemplateError};
use crate::metrics::BridgeMetrics;
use crate::templates::TemplateEngine;

/// Per-message delivery summary.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub sent: usize,
    /// Destinations that failed to render or had no known prefix
    pub skipped: usize,
    /// Last failed send, if any
    pub last_error: Option<RouteError>,
}

/// Renders webhook groups and sends them to each receiver destination.
pub struct AlertRouter {
    sink: Arc<dyn RequestSink>,
    receivers: Arc<ReceiverTable>,
    templates: Arc<dyn TemplateEngine>,
    metrics: Arc<BridgeMetrics>,
}

impl AlertRouter {
    pub fn new(
        sink: Arc<dyn RequestSink>,
        receivers: Arc<ReceiverTable>,
        templates: Arc<dyn TemplateEngine>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            sink,
            receivers,
            templates,
            metrics,
        }
    }

    /// Delivers `message` and reports the last send failure, if any.
    pub async fn handle(&self, message: &AlertMessage) -> Result<(), RouteError> {
        let report = self.route(message).await?;
        match report.last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Delivers `message` to every destination of its receiver.
    ///
    /// Fails outright only when the receiver is unknown. Every destination
    /// is attempted even after a failed send.
    pub async fn route(&self, message: &AlertMessage) -> Result<DeliveryReport, RouteError> {
        let receiver = self
            .receivers
            .get(&message.receiver)
            .ok_or_else(|| RouteError::ReceiverNotConfigured(message.receiver.clone()))?;

        self.metrics
            .alerts_received
            .inc(&[("receiver", receiver.name.as_str())]);

        let body = self.render_body(receiver, message);
        let mut report = DeliveryReport::default();

        for to in &receiver.to {
            let Some(destination) = self.resolve_destination(receiver, to, message) else {
                report.skipped += 1;
                continue;
            };

            let request = match &destination {
                Destination::Number(n) => SendMessage::to_number(&receiver.sender, n, &body),
                Destination::Group(g) => SendMessage::to_group(&receiver.sender, g, &body),
            };

            match self.sink.send(request.into()).await {
                Ok(id) => {
                    self.metrics.messages_sent.inc(&[("kind", "alert")]);
                    debug!(receiver = %receiver.name, destination = %destination, id = %id, "Alert sent");
                    report.sent += 1;
                }
                Err(source) => {
                    self.metrics.send_errors.inc(&[("kind", "alert")]);
                    warn!(
                        receiver = %receiver.name,
                        destination = %destination,
                        error = %source,
                        "Failed to send alert"
                    );
                    report.last_error = Some(RouteError::Send {
                        destination: destination.to_string(),
                        source,
                    });
                }
            }
        }

        info!(
            receiver = %receiver.name,
            status = %message.status,
            alerts = message.alerts.len(),
            sent = report.sent,
            skipped = report.skipped,
            "Alert routed"
        );
        Ok(report)
    }

    fn render_body(&self, receiver: &Receiver, message: &AlertMessage) -> String {
        self.templates
            .render(&receiver.template, message)
            .unwrap_or_else(|e| {
                warn!(
                    receiver = %receiver.name,
                    template = %receiver.template,
                    error = %e,
                    "Template failed, sending fallback body"
                );
                fallback_body(message, &e)
            })
    }

    fn resolve_destination(
        &self,
        receiver: &Receiver,
        to: &str,
        message: &AlertMessage,
    ) -> Option<Destination> {
        let rendered = match self.templates.render_str(to, message) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(receiver = %receiver.name, destination = to, error = %e, "Skipping destination, template failed");
                return None;
            }
        };
        match Destination::parse(&rendered) {
            Ok(destination) => Some(destination),
            Err(e) => {
                warn!(receiver = %receiver.name, destination = %rendered, error = %e, "Skipping destination");
                None
            }
        }
    }
}

fn fallback_body(message: &AlertMessage, error: &TemplateError) -> String {
    let labels = message
        .group_labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[{}] {{{labels}}}\n(notification template failed: {error})",
        message.status
    )
}
