use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

use qbsync_core::{MonitorStatus, SanitizedConfig};

use crate::metrics::encode_metrics;
use crate::state::AppState;

/// Current monitor status. Answers 503 once the loop has stopped.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<MonitorStatus>) {
    let status = state.status();
    let code = if status.stopped {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config().clone())
}

pub async fn metrics() -> Response {
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
