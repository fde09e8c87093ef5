// ============================================================================
// Axum Middleware
// ============================================================================
//
// - request_logging: Log all incoming requests
// - verify_http_signature: Authenticate federation deliveries before the
//   handler runs; the verified actor is stored as a request extension
//
// ============================================================================

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::context::AppContext;
use crate::federation::InboundRequest;
use crate::routes::extractors::SignedPeer;
use trellis_error::AppError;

/// Largest activity body accepted on an inbox
pub const MAX_INBOX_BODY_BYTES: usize = 512 * 1024;

/// Request logging middleware
pub async fn request_logging(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::debug!(
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// HTTP signature gate for inbox routes
///
/// Buffers the body (the digest covers it), runs the verifier and hands the
/// request on with the body restored. Signature failures become 401
/// responses, bodies over [`MAX_INBOX_BODY_BYTES`] a 413.
pub async fn verify_http_signature(
    State(ctx): State<Arc<AppContext>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let declared_len = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > MAX_INBOX_BODY_BYTES) {
        return Err(AppError::PayloadTooLarge(MAX_INBOX_BODY_BYTES));
    }

    // Without a length header the limit trips while streaming
    let body = to_bytes(body, MAX_INBOX_BODY_BYTES)
        .await
        .map_err(|_| AppError::PayloadTooLarge(MAX_INBOX_BODY_BYTES))?;

    let inbound = InboundRequest {
        method: parts.method.clone(),
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        headers: parts.headers.clone(),
        body,
    };

    let peer = ctx.verifier.authenticate(&inbound).await?;
    tracing::debug!(actor = %peer.url, "HTTP signature verified");

    parts.extensions.insert(SignedPeer(peer));
    let req = Request::from_parts(parts, Body::from(inbound.body));
    Ok(next.run(req).await)
}
