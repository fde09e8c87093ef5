use super::{
    ActorStore, FollowEdge, FollowState, FollowStore, NewActor, PeerIdentity, ScoreBounds,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const ACTOR_COLUMNS: &str =
    "id, preferred_username, url, key_id, public_key_pem, inbox_url, shared_inbox_url, host";

/// PostgreSQL implementation of [`ActorStore`] and [`FollowStore`]
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type FollowRow = (i64, i64, i64, String, i64, DateTime<Utc>);

fn follow_from_row(row: FollowRow) -> Result<FollowEdge> {
    let (id, follower_id, following_id, state, score, created_at) = row;
    Ok(FollowEdge {
        id,
        follower_id,
        following_id,
        state: state.parse()?,
        score,
        created_at,
    })
}

#[async_trait::async_trait]
impl ActorStore for PostgresStore {
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<PeerIdentity>> {
        let actor_url = key_id.split('#').next().unwrap_or(key_id);
        let query = format!(
            "SELECT {} FROM actor WHERE key_id = $1 OR url = $2 ORDER BY (key_id = $1) DESC LIMIT 1",
            ACTOR_COLUMNS
        );

        let actor = sqlx::query_as::<_, PeerIdentity>(&query)
            .bind(key_id)
            .bind(actor_url)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to find actor by key id")?;

        Ok(actor)
    }

    async fn find_local_actor(&self, name: &str) -> Result<Option<PeerIdentity>> {
        let query = format!(
            "SELECT {} FROM actor WHERE preferred_username = $1 AND host IS NULL",
            ACTOR_COLUMNS
        );

        let actor = sqlx::query_as::<_, PeerIdentity>(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to find local actor")?;

        Ok(actor)
    }

    async fn insert_actor(&self, actor: NewActor) -> Result<PeerIdentity> {
        let query = format!(
            r#"
            INSERT INTO actor (preferred_username, url, key_id, public_key_pem, inbox_url, shared_inbox_url, host)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ACTOR_COLUMNS
        );

        let inserted = sqlx::query_as::<_, PeerIdentity>(&query)
            .bind(&actor.preferred_username)
            .bind(&actor.url)
            .bind(&actor.key_id)
            .bind(&actor.public_key_pem)
            .bind(&actor.inbox_url)
            .bind(&actor.shared_inbox_url)
            .bind(&actor.host)
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert actor")?;

        Ok(inserted)
    }
}

#[async_trait::async_trait]
impl FollowStore for PostgresStore {
    async fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
        state: FollowState,
        score: i64,
    ) -> Result<FollowEdge> {
        sqlx::query(
            r#"
            INSERT INTO actor_follow (follower_id, following_id, state, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(state.as_str())
        .bind(score)
        .execute(&self.pool)
        .await
        .context("Failed to insert follow")?;

        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            SELECT id, follower_id, following_id, state, score, created_at
            FROM actor_follow
            WHERE follower_id = $1 AND following_id = $2
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load inserted follow")?;

        follow_from_row(row)
    }

    async fn update_score_by_inbox(
        &self,
        inbox: &str,
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE actor_follow
            SET score = LEAST(GREATEST(score + $2, $3), $4), updated_at = NOW()
            WHERE follower_id IN (
                SELECT id FROM actor
                WHERE inbox_url = $1 OR shared_inbox_url = $1
            )
            "#,
        )
        .bind(inbox)
        .bind(bounds.clamp_delta(delta))
        .bind(bounds.min)
        .bind(bounds.max)
        .execute(&self.pool)
        .await
        .context("Failed to update follow scores by inbox")?;

        Ok(result.rows_affected())
    }

    async fn update_score_by_following_hosts(
        &self,
        hosts: &[String],
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64> {
        if hosts.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE actor_follow
            SET score = LEAST(GREATEST(score + $2, $3), $4), updated_at = NOW()
            WHERE following_id IN (
                SELECT id FROM actor WHERE host = ANY($1)
            )
            "#,
        )
        .bind(hosts)
        .bind(bounds.clamp_delta(delta))
        .bind(bounds.min)
        .bind(bounds.max)
        .execute(&self.pool)
        .await
        .context("Failed to update follow scores by host")?;

        Ok(result.rows_affected())
    }

    async fn remove_follows_at_or_below(&self, floor: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM actor_follow
            WHERE score <= $1
            "#,
        )
        .bind(floor)
        .execute(&self.pool)
        .await
        .context("Failed to remove bad follows")?;

        Ok(result.rows_affected())
    }

    async fn keep_unfollowed_hosts(
        &self,
        follower_id: i64,
        hosts: &[String],
    ) -> Result<Vec<String>> {
        if hosts.is_empty() {
            return Ok(Vec::new());
        }

        let followed = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT a.host
            FROM actor_follow f
            JOIN actor a ON a.id = f.following_id
            WHERE f.follower_id = $1 AND a.host = ANY($2)
            "#,
        )
        .bind(follower_id)
        .bind(hosts)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list followed hosts")?;

        Ok(hosts
            .iter()
            .filter(|host| !followed.contains(host))
            .cloned()
            .collect())
    }
}
