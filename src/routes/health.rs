// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /health - Health check (database, Redis)
// - GET /metrics - Prometheus metrics
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use crate::context::AppContext;
use crate::metrics;

/// GET /health
pub async fn health_check(State(app_context): State<Arc<AppContext>>) -> impl IntoResponse {
    let Some(backends) = &app_context.backends else {
        return (StatusCode::OK, "OK");
    };

    match backends.health_check().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}

/// GET /metrics
/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics_data) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_data,
        ),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                "Internal Server Error".to_string(),
            )
        }
    }
}
