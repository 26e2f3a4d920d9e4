//! HTTP boundary.
//!
//! - `POST /alert` : Alertmanager webhook
//! - `GET /healthz` : liveness
//! - `GET /metrics` : Prometheus text format

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use amsig_core::AlertMessage;
use tracing::warn;

use crate::app::AppContext;

pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/alert", post(alert))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(ctx)
}

async fn alert(State(ctx): State<AppContext>, body: Bytes) -> Response {
    let message: AlertMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Failed to decode alert");
            ctx.metrics().alert_errors.inc(&[("reason", "decode")]);
            return (StatusCode::BAD_REQUEST, "Decode failed\n").into_response();
        }
    };

    match ctx.router().handle(&message).await {
        Ok(()) => (StatusCode::OK, "ok\n").into_response(),
        Err(e) => {
            warn!(receiver = %message.receiver, error = %e, "Handling alert failed");
            ctx.metrics().alert_errors.inc(&[("reason", e.reason())]);
            (StatusCode::INTERNAL_SERVER_ERROR, "Handling alert failed\n").into_response()
        }
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics(State(ctx): State<AppContext>) -> Response {
    let extra = ctx.metrics_extra();
    let body = ctx.metrics().render(&extra);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
