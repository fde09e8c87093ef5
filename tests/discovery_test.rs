// ============================================================================
// Discovery Integration Tests
// ============================================================================
//
// Runs IndexClient and IndexDiscoveryScheduler against a local index server.
//
// ============================================================================

use axum::{Json, Router, extract::Query, routing::get};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use trellis_server::AppError;
use trellis_server::discovery::{DiscoveryIndex, IndexClient, IndexDiscoveryScheduler};
use trellis_server::jobs::{FollowJobPayload, Job, MemoryJobQueue};
use trellis_server::scheduler::{ScheduledTask, TaskScheduler, TickOutcome};
use trellis_server::store::{ActorStore, FollowState, FollowStore, MemoryStore, NewActor};

type SeenQueries = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// Serve `body` on /api/v1/instances/hosts and record query strings
async fn spawn_index(body: Value) -> (String, SeenQueries) {
    let seen: SeenQueries = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let app = Router::new().route(
        "/api/v1/instances/hosts",
        get(move |Query(query): Query<HashMap<String, String>>| {
            let recorder = recorder.clone();
            let body = body.clone();
            async move {
                recorder.lock().unwrap().push(query);
                Json(body)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (
        format!("http://{}/api/v1/instances/hosts", address),
        seen,
    )
}

fn actor(host: Option<&str>) -> NewActor {
    let domain = host.unwrap_or("local.example");
    let url = format!("https://{}/accounts/peertube", domain);
    NewActor {
        preferred_username: "peertube".to_string(),
        key_id: format!("{}#main-key", url),
        public_key_pem: String::new(),
        inbox_url: format!("{}/inbox", url),
        shared_inbox_url: None,
        url,
        host: host.map(str::to_string),
    }
}

#[tokio::test]
async fn test_client_sends_count_and_since() {
    let (url, seen) = spawn_index(json!({ "total": 1, "data": [{ "host": "a.example" }] })).await;
    let client = IndexClient::new(url).unwrap();

    let hosts = client.fetch_hosts(None).await.unwrap();
    assert_eq!(hosts, vec!["a.example".to_string()]);

    let since = chrono::DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    client.fetch_hosts(Some(since)).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0].get("count").map(String::as_str), Some("1000"));
    assert!(!seen[0].contains_key("since"));
    assert_eq!(
        seen[1].get("since").map(String::as_str),
        Some("2026-01-02T03:04:05.000Z")
    );
}

#[tokio::test]
async fn test_client_rejects_body_without_data_array() {
    let (url, _seen) = spawn_index(json!({ "error": "maintenance" })).await;
    let client = IndexClient::new(url).unwrap();

    let err = client.fetch_hosts(None).await.unwrap_err();
    assert!(matches!(err, AppError::UpstreamDiscovery(_)));
}

#[tokio::test]
async fn test_unreachable_index_is_upstream_error() {
    // Nothing listens on the discard port
    let client = IndexClient::new("http://127.0.0.1:9/api/v1/instances/hosts").unwrap();

    let err = client.fetch_hosts(None).await.unwrap_err();
    assert!(matches!(err, AppError::UpstreamDiscovery(_)));
}

#[tokio::test]
async fn test_scheduler_follows_only_new_instances() {
    let (url, _seen) = spawn_index(json!({
        "data": [{ "host": "a.example" }, { "host": "b.example" }]
    }))
    .await;

    let store = Arc::new(MemoryStore::new());
    let jobs = Arc::new(MemoryJobQueue::new());
    let server = store.insert_actor(actor(None)).await.unwrap();
    let a = store.insert_actor(actor(Some("a.example"))).await.unwrap();
    store
        .insert_follow(server.id, a.id, FollowState::Accepted, 1000)
        .await
        .unwrap();

    let task = Arc::new(IndexDiscoveryScheduler::new(
        Arc::new(IndexClient::new(url).unwrap()),
        store.clone(),
        store.clone(),
        jobs.clone(),
        "peertube",
        true,
    ));
    let scheduler = TaskScheduler::with_random_first_run(task.clone(), std::time::Duration::from_secs(3600));

    assert_eq!(scheduler.execute().await, TickOutcome::Completed);
    assert_eq!(
        jobs.take(),
        vec![Job::ActivityPubFollow(FollowJobPayload {
            host: "b.example".to_string(),
            name: "peertube".to_string(),
            follower_actor_id: server.id,
            is_auto_follow: true,
        })]
    );
    assert!(task.last_check().is_some());
}

#[tokio::test]
async fn test_scheduler_contains_malformed_index_failure() {
    let (url, _seen) = spawn_index(json!({ "data": { "host": "a.example" } })).await;

    let store = Arc::new(MemoryStore::new());
    let jobs = Arc::new(MemoryJobQueue::new());
    store.insert_actor(actor(None)).await.unwrap();

    let task = Arc::new(IndexDiscoveryScheduler::new(
        Arc::new(IndexClient::new(url).unwrap()),
        store.clone(),
        store.clone(),
        jobs.clone(),
        "peertube",
        true,
    ));
    assert_eq!(task.name(), "auto-follow-index-instances");

    let scheduler = TaskScheduler::new(task.clone(), std::time::Duration::from_secs(3600));
    assert_eq!(scheduler.execute().await, TickOutcome::Failed);
    assert!(jobs.jobs().is_empty());
    assert!(task.last_check().is_some());
}
