// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Health check and metrics endpoints
// - inbox.rs: Federation inboxes (HTTP signature protected)
// - extractors.rs: Custom Axum extractors (SignedPeer)
// - middleware.rs: Request logging, HTTP signature verification
//
// ============================================================================

mod extractors;
mod health;
mod inbox;
mod middleware;

pub use extractors::SignedPeer;
pub use middleware::MAX_INBOX_BODY_BYTES;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    // Every inbox delivery must carry a valid HTTP signature
    let inboxes = Router::new()
        .route("/inbox", post(inbox::shared_inbox))
        .route("/accounts/:name/inbox", post(inbox::account_inbox))
        .route_layer(axum::middleware::from_fn_with_state(
            app_context.clone(),
            middleware::verify_http_signature,
        ));

    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .merge(inboxes)
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .into_inner(),
        )
        .with_state(app_context)
}
