// ============================================================================
// Inbox Routes
// ============================================================================
//
// Endpoints (behind verify_http_signature):
// - POST /inbox - Shared inbox
// - POST /accounts/:name/inbox - Per-account inbox
//
// Activities are only checked for shape here; processing happens in the
// activitypub-inbox job.
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use std::sync::Arc;

use crate::context::AppContext;
use crate::jobs::{InboxJobPayload, Job};
use crate::routes::extractors::SignedPeer;
use trellis_error::AppError;

/// POST /inbox
pub async fn shared_inbox(
    State(ctx): State<Arc<AppContext>>,
    SignedPeer(peer): SignedPeer,
    Json(activity): Json<Value>,
) -> Result<StatusCode, AppError> {
    enqueue_activity(&ctx, peer.id, activity, None)
}

/// POST /accounts/:name/inbox
pub async fn account_inbox(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
    SignedPeer(peer): SignedPeer,
    Json(activity): Json<Value>,
) -> Result<StatusCode, AppError> {
    enqueue_activity(&ctx, peer.id, activity, Some(name))
}

fn enqueue_activity(
    ctx: &AppContext,
    signature_actor_id: i64,
    activity: Value,
    inbox_account: Option<String>,
) -> Result<StatusCode, AppError> {
    validate_activity(&activity)?;

    ctx.jobs.create_job_async(Job::ActivityPubInbox(InboxJobPayload {
        activity,
        signature_actor_id,
        inbox_account,
    }));

    Ok(StatusCode::NO_CONTENT)
}

/// An activity is an object with a string `type` and an `actor`, given as a
/// URL or as an object carrying an `id`
fn validate_activity(activity: &Value) -> Result<(), AppError> {
    let object = activity
        .as_object()
        .ok_or_else(|| AppError::validation("activity must be a JSON object"))?;

    if !object.get("type").is_some_and(Value::is_string) {
        return Err(AppError::validation("activity has no type"));
    }

    let actor_is_valid = match object.get("actor") {
        Some(Value::String(_)) => true,
        Some(Value::Object(actor)) => actor.get("id").is_some_and(Value::is_string),
        _ => false,
    };
    if !actor_is_valid {
        return Err(AppError::validation("activity has no actor"));
    }

    Ok(())
}
