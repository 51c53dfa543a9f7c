//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated); `None` allows any
    pub client_origin: Option<String>,

    /// Supabase credentials; the in-memory store is used when absent
    pub supabase: Option<SupabaseConfig>,

    /// Simulation, anti-cheat and match tunables
    pub game: GameConfig,
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Everything the game core reads at runtime
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub movement: MovementConfig,
    pub validation: ValidationConfig,
    pub matches: MatchConfig,
    /// Physics ticks per second
    pub tick_rate: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            validation: ValidationConfig::default(),
            matches: MatchConfig::default(),
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

/// Movement physics constants, shared with client-side prediction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementConfig {
    /// Walking speed (units per second)
    pub walk_speed: f32,
    /// Sprinting speed (units per second)
    pub sprint_speed: f32,
    /// Initial vertical velocity of a jump
    pub jump_force: f32,
    /// Downward acceleration (units per second squared)
    pub gravity: f32,
    /// Height of the floor
    pub ground_level: f32,
    /// Fraction of the gap to target velocity closed every step
    pub movement_lerp: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            sprint_speed: 5.0,
            jump_force: 5.0,
            gravity: 9.8,
            ground_level: 0.0,
            movement_lerp: 0.2,
        }
    }
}

/// Position validation slack
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidationConfig {
    /// Multiplier on the max horizontal distance to absorb jitter
    pub horizontal_tolerance: f32,
    /// Multiplier on the max vertical rise while jumping
    pub jump_tolerance: f32,
    /// Allowed vertical drift per second while not jumping
    pub ground_tolerance: f32,
    /// Upper bound on the elapsed time granted to one update
    pub max_delta: Duration,
    /// Minimum gap between two corrections sent to one player
    pub correction_interval: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            horizontal_tolerance: 1.2,
            jump_tolerance: 1.5,
            ground_tolerance: 0.5,
            max_delta: Duration::from_millis(200),
            correction_interval: Duration::from_secs(1),
        }
    }
}

/// Match phase durations and gating
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchConfig {
    pub warmup: Duration,
    pub gameplay: Duration,
    pub results: Duration,
    /// Players required before warmup starts
    pub min_players: usize,
    /// How often the waiting phase re-checks the player count
    pub waiting_poll: Duration,
    /// Cooldown between the end of results and the next match
    pub next_match_delay: Duration,
    /// Players silent for longer than this are purged after results
    pub stale_player_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(15_000),
            gameplay: Duration::from_millis(360_000),
            results: Duration::from_millis(15_000),
            min_players: 2,
            waiting_poll: Duration::from_millis(5_000),
            next_match_delay: Duration::from_millis(3_000),
            stale_player_timeout: Duration::from_millis(60_000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok(),
            supabase,
            game: GameConfig::from_env()?,
        })
    }
}

impl GameConfig {
    /// Read every tunable, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let movement_defaults = MovementConfig::default();
        let movement = MovementConfig {
            walk_speed: env_or("WALK_SPEED", movement_defaults.walk_speed)?,
            sprint_speed: env_or("SPRINT_SPEED", movement_defaults.sprint_speed)?,
            jump_force: env_or("JUMP_FORCE", movement_defaults.jump_force)?,
            gravity: env_or("GRAVITY", movement_defaults.gravity)?,
            ground_level: env_or("GROUND_LEVEL", movement_defaults.ground_level)?,
            movement_lerp: env_or("MOVEMENT_LERP", movement_defaults.movement_lerp)?,
        };

        let validation_defaults = ValidationConfig::default();
        let validation = ValidationConfig {
            horizontal_tolerance: env_or(
                "HORIZONTAL_TOLERANCE",
                validation_defaults.horizontal_tolerance,
            )?,
            jump_tolerance: env_or("JUMP_TOLERANCE", validation_defaults.jump_tolerance)?,
            ground_tolerance: env_or("GROUND_TOLERANCE", validation_defaults.ground_tolerance)?,
            max_delta: env_millis("MAX_DELTA_MS", validation_defaults.max_delta)?,
            correction_interval: env_millis(
                "CORRECTION_INTERVAL_MS",
                validation_defaults.correction_interval,
            )?,
        };

        let match_defaults = MatchConfig::default();
        let matches = MatchConfig {
            warmup: env_millis("WARMUP_DURATION_MS", match_defaults.warmup)?,
            gameplay: env_millis("GAMEPLAY_DURATION_MS", match_defaults.gameplay)?,
            results: env_millis("RESULTS_DURATION_MS", match_defaults.results)?,
            min_players: env_or("MIN_PLAYERS", match_defaults.min_players)?,
            waiting_poll: env_millis("WAITING_POLL_MS", match_defaults.waiting_poll)?,
            next_match_delay: env_millis("NEXT_MATCH_DELAY_MS", match_defaults.next_match_delay)?,
            stale_player_timeout: env_millis(
                "STALE_PLAYER_TIMEOUT_MS",
                match_defaults.stale_player_timeout,
            )?,
        };

        let config = Self {
            movement,
            validation,
            matches,
            tick_rate: env_or("TICK_RATE", DEFAULT_TICK_RATE)?,
        };
        config.check()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::OutOfRange("TICK_RATE"));
        }
        if self.matches.min_players == 0 {
            return Err(ConfigError::OutOfRange("MIN_PLAYERS"));
        }
        if !(0.0..=1.0).contains(&self.movement.movement_lerp) {
            return Err(ConfigError::OutOfRange("MOVEMENT_LERP"));
        }
        if self.movement.gravity <= 0.0 {
            return Err(ConfigError::OutOfRange("GRAVITY"));
        }
        if self.matches.waiting_poll.is_zero() {
            return Err(ConfigError::OutOfRange("WAITING_POLL_MS"));
        }
        Ok(())
    }

    /// Fixed physics step in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

pub const DEFAULT_TICK_RATE: u32 = 60;

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Could not parse environment variable: {0}")]
    Invalid(&'static str),

    #[error("Environment variable out of range: {0}")]
    OutOfRange(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_range_check() {
        let config = GameConfig::default();
        assert!(config.check().is_ok());
        assert!((config.tick_delta() - 1.0 / 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_min_players_is_rejected() {
        let mut config = GameConfig::default();
        config.matches.min_players = 0;
        assert!(matches!(config.check(), Err(ConfigError::OutOfRange("MIN_PLAYERS"))));
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let config = GameConfig {
            tick_rate: 0,
            ..GameConfig::default()
        };
        assert!(matches!(config.check(), Err(ConfigError::OutOfRange("TICK_RATE"))));
    }
}
