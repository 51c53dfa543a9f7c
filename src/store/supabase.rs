//! Supabase REST API client and the persistence backend built on it

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SupabaseConfig;
use crate::game::stats::StatLine;

use super::{MatchRecord, Persistence, StoreError, UserStats};

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(StoreError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(StoreError::Parse)
    }

    /// Make an authenticated GET request expecting a single row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(StoreError::Parse)
    }

    /// Make an authenticated POST request (insert)
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, StoreError> {
        let url = self.rest_url(table);

        let response = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        // PostgREST returns an array, get first element
        let results: Vec<R> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(StoreError::Parse)?;
        results.into_iter().next().ok_or(StoreError::NoRowReturned)
    }

    /// Make an authenticated PATCH request (update)
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<(), StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.patch(&url))
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        Self::check(response).await?;
        Ok(())
    }

    /// Call a Postgres function exposed through PostgREST
    pub async fn rpc<T: Serialize>(&self, function: &str, args: &T) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);

        let response = self
            .authed(self.client.post(&url))
            .json(args)
            .send()
            .await
            .map_err(StoreError::Request)?;

        Self::check(response).await?;
        Ok(())
    }
}

/// Row inserted when a match starts
#[derive(Debug, Serialize)]
struct NewMatch {
    id: Uuid,
    started_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct MatchEnded {
    ended_at: chrono::DateTime<Utc>,
}

/// Arguments of the `increment_user_stats` function, which adds to both
/// the lifetime totals and the per-match row in one transaction
#[derive(Debug, Serialize)]
struct IncrementStats<'a> {
    p_name: &'a str,
    p_match_id: Uuid,
    p_kills: u32,
    p_deaths: u32,
    p_headshots: u32,
    p_bodyshots: u32,
    p_missedshots: u32,
}

#[derive(Debug, Deserialize)]
struct NameRow {
    #[allow(dead_code)]
    name: String,
}

/// Persistence over the Supabase tables `user_stats`, `matches`, `bans` and
/// `mutes`
#[derive(Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn listed(&self, table: &str, name: &str) -> Result<bool, StoreError> {
        let query = format!("name=eq.{}&select=name&limit=1", name);
        let rows: Vec<NameRow> = self.client.get(table, &query).await?;
        Ok(!rows.is_empty())
    }
}

impl Persistence for SupabaseStore {
    fn get_user_stats<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserStats>, StoreError>> {
        async move {
            let query = format!("name=eq.{}", name);
            self.client.get_one("user_stats", &query).await
        }
        .boxed()
    }

    fn update_user_stats<'a>(
        &'a self,
        name: &'a str,
        match_id: Uuid,
        line: StatLine,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let args = IncrementStats {
                p_name: name,
                p_match_id: match_id,
                p_kills: line.kills,
                p_deaths: line.deaths,
                p_headshots: line.headshots,
                p_bodyshots: line.bodyshots,
                p_missedshots: line.missedshots,
            };
            self.client.rpc("increment_user_stats", &args).await
        }
        .boxed()
    }

    fn create_match(&self) -> BoxFuture<'_, Result<MatchRecord, StoreError>> {
        async move {
            let row = NewMatch {
                id: Uuid::new_v4(),
                started_at: Utc::now(),
            };
            self.client.insert("matches", &row).await
        }
        .boxed()
    }

    fn end_match(&self, match_id: Uuid) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            let query = format!("id=eq.{}", match_id);
            let update = MatchEnded {
                ended_at: Utc::now(),
            };
            self.client.update("matches", &query, &update).await
        }
        .boxed()
    }

    fn get_active_match(&self) -> BoxFuture<'_, Result<Option<MatchRecord>, StoreError>> {
        async move {
            let rows: Vec<MatchRecord> = self
                .client
                .get(
                    "matches",
                    "ended_at=is.null&select=id,started_at&order=started_at.desc&limit=1",
                )
                .await?;
            Ok(rows.into_iter().next())
        }
        .boxed()
    }

    fn is_banned<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        self.listed("bans", name).boxed()
    }

    fn is_muted<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        self.listed("mutes", name).boxed()
    }
}
