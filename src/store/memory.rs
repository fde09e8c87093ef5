use super::{
    ActorStore, FollowEdge, FollowState, FollowStore, NewActor, PeerIdentity, ScoreBounds,
};
use anyhow::Result;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    actors: Vec<PeerIdentity>,
    follows: Vec<FollowEdge>,
    next_actor_id: i64,
    next_follow_id: i64,
}

/// In-process store for tests and single-node development
///
/// Each trait call takes the lock once, so every call is atomic with
/// respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all follow relationships
    pub fn follows(&self) -> Vec<FollowEdge> {
        self.lock().follows.clone()
    }

    pub fn score_of(&self, follower_id: i64, following_id: i64) -> Option<i64> {
        self.lock()
            .follows
            .iter()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
            .map(|f| f.score)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl ActorStore for MemoryStore {
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<PeerIdentity>> {
        let state = self.lock();
        let exact = state.actors.iter().find(|a| a.key_id == key_id);
        Ok(exact
            .or_else(|| state.actors.iter().find(|a| a.matches_key_id(key_id)))
            .cloned())
    }

    async fn find_local_actor(&self, name: &str) -> Result<Option<PeerIdentity>> {
        Ok(self
            .lock()
            .actors
            .iter()
            .find(|a| a.is_local() && a.preferred_username == name)
            .cloned())
    }

    async fn insert_actor(&self, actor: NewActor) -> Result<PeerIdentity> {
        let mut state = self.lock();
        if state
            .actors
            .iter()
            .any(|a| a.url == actor.url || a.key_id == actor.key_id)
        {
            anyhow::bail!("Actor already exists: {}", actor.url);
        }

        state.next_actor_id += 1;
        let inserted = PeerIdentity {
            id: state.next_actor_id,
            preferred_username: actor.preferred_username,
            url: actor.url,
            key_id: actor.key_id,
            public_key_pem: actor.public_key_pem,
            inbox_url: actor.inbox_url,
            shared_inbox_url: actor.shared_inbox_url,
            host: actor.host,
        };
        state.actors.push(inserted.clone());
        Ok(inserted)
    }
}

#[async_trait::async_trait]
impl FollowStore for MemoryStore {
    async fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
        state: FollowState,
        score: i64,
    ) -> Result<FollowEdge> {
        let mut guard = self.lock();
        if let Some(existing) = guard
            .follows
            .iter()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
        {
            return Ok(existing.clone());
        }

        guard.next_follow_id += 1;
        let edge = FollowEdge {
            id: guard.next_follow_id,
            follower_id,
            following_id,
            state,
            score,
            created_at: Utc::now(),
        };
        guard.follows.push(edge.clone());
        Ok(edge)
    }

    async fn update_score_by_inbox(
        &self,
        inbox: &str,
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64> {
        let mut state = self.lock();
        let State {
            actors, follows, ..
        } = &mut *state;

        let followers: Vec<i64> = actors
            .iter()
            .filter(|a| a.receives_at(inbox))
            .map(|a| a.id)
            .collect();

        let mut updated = 0;
        for follow in follows
            .iter_mut()
            .filter(|f| followers.contains(&f.follower_id))
        {
            follow.score = bounds.apply(follow.score, delta);
            updated += 1;
        }
        Ok(updated)
    }

    async fn update_score_by_following_hosts(
        &self,
        hosts: &[String],
        delta: i64,
        bounds: ScoreBounds,
    ) -> Result<u64> {
        let mut state = self.lock();
        let State {
            actors, follows, ..
        } = &mut *state;

        let targets: Vec<i64> = actors
            .iter()
            .filter(|a| a.host.as_ref().is_some_and(|h| hosts.contains(h)))
            .map(|a| a.id)
            .collect();

        let mut updated = 0;
        for follow in follows
            .iter_mut()
            .filter(|f| targets.contains(&f.following_id))
        {
            follow.score = bounds.apply(follow.score, delta);
            updated += 1;
        }
        Ok(updated)
    }

    async fn remove_follows_at_or_below(&self, floor: i64) -> Result<u64> {
        let mut state = self.lock();
        let before = state.follows.len();
        state.follows.retain(|f| f.score > floor);
        Ok((before - state.follows.len()) as u64)
    }

    async fn keep_unfollowed_hosts(
        &self,
        follower_id: i64,
        hosts: &[String],
    ) -> Result<Vec<String>> {
        let state = self.lock();
        let followed: Vec<&str> = state
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .filter_map(|f| state.actors.iter().find(|a| a.id == f.following_id))
            .filter_map(|a| a.host.as_deref())
            .collect();

        Ok(hosts
            .iter()
            .filter(|host| !followed.contains(&host.as_str()))
            .cloned()
            .collect())
    }
}
