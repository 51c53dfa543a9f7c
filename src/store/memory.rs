//! In-memory persistence for local runs and tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::game::stats::StatLine;
use crate::ws::protocol::Role;

use super::{MatchRecord, Persistence, StoreError, UserStats};

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, UserStats>,
    matches: HashMap<Uuid, StoredMatch>,
    match_stats: HashMap<(Uuid, String), StatLine>,
    banned: HashSet<String>,
    muted: HashSet<String>,
}

struct StoredMatch {
    record: MatchRecord,
    ended: bool,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    fail_all: AtomicBool,
    /// Delay before ban and mute lookups resolve
    lookup_latency: Mutex<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail, to exercise degraded paths
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::Relaxed);
    }

    /// Make ban and mute lookups take `latency`, like a remote store would
    pub fn set_lookup_latency(&self, latency: Duration) {
        *self.lookup_latency.lock() = latency;
    }

    pub fn ban(&self, name: &str) {
        self.state.lock().banned.insert(name.to_string());
    }

    pub fn mute(&self, name: &str) {
        self.state.lock().muted.insert(name.to_string());
    }

    pub fn set_role(&self, name: &str, role: Role) {
        self.state
            .lock()
            .users
            .entry(name.to_string())
            .or_insert_with(|| UserStats::empty(name))
            .role = role;
    }

    /// Seed a match left open by a previous process
    pub fn insert_active_match(&self, record: MatchRecord) {
        self.state.lock().matches.insert(
            record.match_id,
            StoredMatch {
                record,
                ended: false,
            },
        );
    }

    pub fn user(&self, name: &str) -> Option<UserStats> {
        self.state.lock().users.get(name).cloned()
    }

    pub fn match_stats(&self, match_id: Uuid, name: &str) -> Option<StatLine> {
        self.state
            .lock()
            .match_stats
            .get(&(match_id, name.to_string()))
            .copied()
    }

    pub fn is_match_ended(&self, match_id: Uuid) -> Option<bool> {
        self.state.lock().matches.get(&match_id).map(|m| m.ended)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_all.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("in-memory store set to fail".to_string()))
        } else {
            Ok(())
        }
    }

    fn lookup<'a>(
        &'a self,
        list: fn(&MemoryState) -> &HashSet<String>,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        let latency = *self.lookup_latency.lock();
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.check()?;
            Ok(list(&self.state.lock()).contains(name))
        }
        .boxed()
    }
}

impl Persistence for InMemoryStore {
    fn get_user_stats<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserStats>, StoreError>> {
        let result = self.check().map(|_| self.user(name));
        future::ready(result).boxed()
    }

    fn update_user_stats<'a>(
        &'a self,
        name: &'a str,
        match_id: Uuid,
        line: StatLine,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        let result = self.check().map(|_| {
            let mut state = self.state.lock();
            state
                .users
                .entry(name.to_string())
                .or_insert_with(|| UserStats::empty(name))
                .add(&line);
            state
                .match_stats
                .entry((match_id, name.to_string()))
                .or_default()
                .merge(&line);
        });
        future::ready(result).boxed()
    }

    fn create_match(&self) -> BoxFuture<'_, Result<MatchRecord, StoreError>> {
        let result = self.check().map(|_| {
            let record = MatchRecord {
                match_id: Uuid::new_v4(),
                started_at: Utc::now(),
            };
            self.insert_active_match(record);
            record
        });
        future::ready(result).boxed()
    }

    fn end_match(&self, match_id: Uuid) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = self.check().map(|_| {
            if let Some(stored) = self.state.lock().matches.get_mut(&match_id) {
                stored.ended = true;
            }
        });
        future::ready(result).boxed()
    }

    fn get_active_match(&self) -> BoxFuture<'_, Result<Option<MatchRecord>, StoreError>> {
        let result = self.check().map(|_| {
            self.state
                .lock()
                .matches
                .values()
                .filter(|m| !m.ended)
                .map(|m| m.record)
                .max_by_key(|r| r.started_at)
        });
        future::ready(result).boxed()
    }

    fn is_banned<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        self.lookup(|s| &s.banned, name)
    }

    fn is_muted<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        self.lookup(|s| &s.muted, name)
    }
}
