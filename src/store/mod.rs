//! Persistence interface and its implementations
//!
//! The game core only talks to [`Persistence`]. Production uses the Supabase
//! REST backend; tests and local runs without credentials use the in-memory
//! store.

pub mod memory;
pub mod supabase;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::stats::StatLine;
use crate::ws::protocol::Role;

pub use memory::InMemoryStore;
pub use supabase::{SupabaseClient, SupabaseStore};

/// Historical totals for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub kills: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub missedshots: u32,
}

impl UserStats {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: Role::User,
            kills: 0,
            deaths: 0,
            headshots: 0,
            bodyshots: 0,
            missedshots: 0,
        }
    }

    pub fn add(&mut self, line: &StatLine) {
        self.kills += line.kills;
        self.deaths += line.deaths;
        self.headshots += line.headshots;
        self.bodyshots += line.bodyshots;
        self.missedshots += line.missedshots;
    }
}

/// A persisted match; `started_at` is when warmup began
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "id")]
    pub match_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Storage operations the game core depends on
pub trait Persistence: Send + Sync {
    fn get_user_stats<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserStats>, StoreError>>;

    /// Add `line` to the player's totals and to their record for `match_id`
    fn update_user_stats<'a>(
        &'a self,
        name: &'a str,
        match_id: Uuid,
        line: StatLine,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn create_match(&self) -> BoxFuture<'_, Result<MatchRecord, StoreError>>;

    fn end_match(&self, match_id: Uuid) -> BoxFuture<'_, Result<(), StoreError>>;

    /// The match that was never ended, if any
    fn get_active_match(&self) -> BoxFuture<'_, Result<Option<MatchRecord>, StoreError>>;

    fn is_banned<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>>;

    fn is_muted<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>>;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
