//! Application state shared across routes

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::game::GameServer;
use crate::store::{InMemoryStore, Persistence, SupabaseClient, SupabaseStore};
use crate::ws::hub::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<ConnectionHub>,
    pub game: Arc<GameServer>,
    /// Cancelled on shutdown; background loops watch it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Pick the persistence backend
        let store: Arc<dyn Persistence> = match &config.supabase {
            Some(supabase) => {
                info!(url = %supabase.url, "Using Supabase persistence");
                Arc::new(SupabaseStore::new(SupabaseClient::new(supabase)))
            }
            None => {
                warn!("Supabase not configured, stats will not survive a restart");
                Arc::new(InMemoryStore::new())
            }
        };

        // Outbound routing, then the game on top of it
        let hub = Arc::new(ConnectionHub::new());
        let game = Arc::new(GameServer::new(config.game.clone(), hub.clone(), store));

        Self {
            config,
            hub,
            game,
            shutdown: CancellationToken::new(),
        }
    }
}
