// ============================================================================
// Trellis Server - federation trust maintenance
// ============================================================================
//
// - scheduler: recurring tasks with jitter and single-flight execution
// - follow_health: delivery outcome cache and the score/prune scheduler
// - federation: HTTP signature authentication of inbound deliveries
// - discovery: auto-follow of instances listed by an index
// - store / jobs: PostgreSQL persistence and Redis stream jobs
//
// ============================================================================

pub mod context;
pub mod discovery;
pub mod federation;
pub mod follow_health;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod scheduler;
pub mod store;

pub use trellis_error::{AppError, AppResult};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use trellis_config::Config;

use context::AppContext;
use discovery::{DiscoveryIndex, IndexClient, IndexDiscoveryScheduler};
use federation::SignatureVerifier;
use follow_health::{FollowHealthCache, FollowHealthScheduler};
use health::Backends;
use jobs::{JobQueue, RedisJobQueue};
use scheduler::{SchedulerRegistry, TaskScheduler};
use store::{ActorStore, FollowStore, PostgresStore};

/// Build the process schedulers, not yet enabled
///
/// Follow scores run at a fixed interval; index discovery gets a random first
/// run so that instances restarted together do not query the index together.
pub fn build_schedulers(
    config: &Config,
    cache: Arc<FollowHealthCache>,
    actors: Arc<dyn ActorStore>,
    follows: Arc<dyn FollowStore>,
    jobs: Arc<dyn JobQueue>,
    index: Arc<dyn DiscoveryIndex>,
) -> SchedulerRegistry {
    let follow_health = Arc::new(FollowHealthScheduler::new(
        cache,
        follows.clone(),
        config.follow_health.scores,
    ));

    let discovery = Arc::new(IndexDiscoveryScheduler::new(
        index,
        actors,
        follows,
        jobs,
        config.federation.server_actor_name.clone(),
        config.auto_follow_index.enabled,
    ));

    let mut registry = SchedulerRegistry::new();
    registry
        .register(TaskScheduler::new(
            follow_health,
            config.follow_health.interval,
        ))
        .register(TaskScheduler::with_random_first_run(
            discovery,
            config.auto_follow_index.interval,
        ));
    registry
}

/// Composition root: connect backends, start schedulers, serve HTTP until
/// ctrl-c
pub async fn run(config: Config) -> Result<()> {
    tracing::info!("=== Trellis Server Starting ===");

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let redis_client =
        redis::Client::open(config.redis_url.as_str()).context("Invalid REDIS_URL")?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    tracing::info!("Connected to Redis");

    let store = Arc::new(PostgresStore::new(db_pool.clone()));
    let jobs: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(redis.clone(), config.jobs.clone()));
    let cache = Arc::new(FollowHealthCache::new(
        config.follow_health.scores.penalty,
        config.follow_health.scores.bonus,
    ));
    let index = Arc::new(IndexClient::new(config.auto_follow_index.index_url.clone())?);

    if store
        .find_local_actor(&config.federation.server_actor_name)
        .await?
        .is_none()
    {
        tracing::warn!(
            name = %config.federation.server_actor_name,
            "Server actor not found, auto follow will fail until it exists"
        );
    }

    let registry = build_schedulers(
        &config,
        cache,
        store.clone(),
        store.clone(),
        jobs.clone(),
        index,
    );
    registry.enable_all()?;

    let verifier = SignatureVerifier::new(store, config.federation.signature_clock_skew_secs);
    let app_context = Arc::new(AppContext::new(
        verifier,
        jobs,
        Some(Backends::new(db_pool, redis)),
    ));
    let app = routes::create_router(app_context);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!(
        address = %addr,
        instance = %config.federation.instance_domain,
        "Trellis server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    registry.disable_all();
    tracing::info!("Trellis server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
