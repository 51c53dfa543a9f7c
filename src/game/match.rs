//! Match lifecycle: phases, timers, stat snapshots and restart recovery

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::store::{MatchRecord, Persistence};
use crate::util::task::ScheduledTask;
use crate::util::time::millis_until;
use crate::ws::hub::Outbox;
use crate::ws::protocol::{ScoreboardEntry, ServerMsg};

use super::combat::{ShotReport, MAX_AMMO};
use super::player::PlayerRegistry;
use super::stats::MatchStats;

/// How often gameplay broadcasts the remaining time
pub const TIMER_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);
/// How often gameplay broadcasts the scoreboard
pub const STATS_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPhase {
    /// Not enough players yet
    WaitingForPlayers,
    /// Timed warmup, stats not counted
    Warmup,
    /// Match in progress
    Gameplay,
    /// Scoreboard shown before the next match
    Results,
}

impl MatchPhase {
    /// Phase that follows this one within a match
    pub fn next(self) -> Option<MatchPhase> {
        match self {
            MatchPhase::WaitingForPlayers => Some(MatchPhase::Warmup),
            MatchPhase::Warmup => Some(MatchPhase::Gameplay),
            MatchPhase::Gameplay => Some(MatchPhase::Results),
            MatchPhase::Results => None,
        }
    }
}

/// Timed phases laid end to end from the moment warmup starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchTimeline {
    pub warmup: Duration,
    pub gameplay: Duration,
    pub results: Duration,
}

/// Where a match stands some time after warmup began
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelinePosition {
    InPhase { phase: MatchPhase, remaining: Duration },
    Finished,
}

impl MatchTimeline {
    pub fn from_config(config: &MatchConfig) -> Self {
        Self {
            warmup: config.warmup,
            gameplay: config.gameplay,
            results: config.results,
        }
    }

    pub fn total(&self) -> Duration {
        self.warmup + self.gameplay + self.results
    }

    /// Phase active `elapsed` after warmup started, and how long it has left
    pub fn position(&self, elapsed: Duration) -> TimelinePosition {
        let warmup_end = self.warmup;
        let gameplay_end = warmup_end + self.gameplay;
        let results_end = gameplay_end + self.results;

        let (phase, end) = if elapsed < warmup_end {
            (MatchPhase::Warmup, warmup_end)
        } else if elapsed < gameplay_end {
            (MatchPhase::Gameplay, gameplay_end)
        } else if elapsed < results_end {
            (MatchPhase::Results, results_end)
        } else {
            return TimelinePosition::Finished;
        };

        TimelinePosition::InPhase {
            phase,
            remaining: end - elapsed,
        }
    }
}

/// Public view of the current match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchSnapshot {
    pub phase: MatchPhase,
    pub match_id: Option<Uuid>,
    pub time_remaining: u64,
}

impl MatchSnapshot {
    pub fn to_message(self) -> ServerMsg {
        ServerMsg::MatchPhaseChange {
            phase: self.phase,
            match_id: self.match_id,
            time_remaining: self.time_remaining,
        }
    }
}

/// Match state (owned by the manager)
struct MatchState {
    /// Distinguishes this match from earlier ones for callbacks that were
    /// scheduled before an await
    generation: u64,
    match_id: Option<Uuid>,
    phase: MatchPhase,
    phase_ends_at: Option<Instant>,
    /// Set while warmup is being opened so concurrent checks back off
    starting: bool,
    stats: MatchStats,

    /// Parent of every task tied to the current phase
    phase_token: CancellationToken,
    phase_timer: Option<ScheduledTask>,
    periodic: Vec<ScheduledTask>,
    waiting_poll: Option<ScheduledTask>,
}

impl MatchState {
    fn waiting(generation: u64) -> Self {
        Self {
            generation,
            match_id: None,
            phase: MatchPhase::WaitingForPlayers,
            phase_ends_at: None,
            starting: false,
            stats: MatchStats::new(),
            phase_token: CancellationToken::new(),
            phase_timer: None,
            periodic: Vec::new(),
            waiting_poll: None,
        }
    }

    fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            phase: self.phase,
            match_id: self.match_id,
            time_remaining: self.phase_ends_at.map(millis_until).unwrap_or(0),
        }
    }
}

/// Drives matches through their phases.
///
/// All state sits behind one mutex that is never held across an await.
/// Every continuation that resumes after storage I/O or a timer checks the
/// match generation and phase before touching anything.
pub struct MatchLifecycleManager {
    config: MatchConfig,
    timeline: MatchTimeline,
    registry: Arc<PlayerRegistry>,
    outbox: Arc<dyn Outbox>,
    store: Arc<dyn Persistence>,
    state: Mutex<Option<MatchState>>,
    /// Delay between one match closing and the next opening
    cooldown: Mutex<Option<ScheduledTask>>,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl MatchLifecycleManager {
    pub fn new(
        config: MatchConfig,
        registry: Arc<PlayerRegistry>,
        outbox: Arc<dyn Outbox>,
        store: Arc<dyn Persistence>,
    ) -> Arc<Self> {
        Arc::new(Self {
            timeline: MatchTimeline::from_config(&config),
            config,
            registry,
            outbox,
            store,
            state: Mutex::new(None),
            cooldown: Mutex::new(None),
            next_generation: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        })
    }

    /// Resume a persisted match if one is still running, otherwise open a
    /// fresh one
    pub async fn start(self: &Arc<Self>) {
        if !self.recover().await {
            self.open_match();
        }
    }

    /// Stop every timer and forget the current match
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.cooldown.lock().take();
        let state = self.state.lock().take();
        drop(state);
        info!("Match manager stopped");
    }

    pub fn snapshot(&self) -> Option<MatchSnapshot> {
        self.state.lock().as_ref().map(MatchState::snapshot)
    }

    pub fn phase(&self) -> Option<MatchPhase> {
        self.state.lock().as_ref().map(|s| s.phase)
    }

    /// Shots may be fired in warmup and gameplay
    pub fn allows_combat(&self) -> bool {
        matches!(self.phase(), Some(MatchPhase::Warmup | MatchPhase::Gameplay))
    }

    /// Only gameplay shots count towards stats
    pub fn counts_stats(&self) -> bool {
        self.phase() == Some(MatchPhase::Gameplay)
    }

    pub fn scoreboard(&self) -> Vec<ScoreboardEntry> {
        self.state
            .lock()
            .as_ref()
            .map(|s| s.stats.scoreboard())
            .unwrap_or_default()
    }

    /// A player finished joining: tell them where the match stands and see
    /// whether warmup can begin
    pub async fn on_player_joined(self: &Arc<Self>, name: &str) {
        let snapshot = {
            let mut guard = self.state.lock();
            guard.as_mut().map(|state| {
                if state.phase == MatchPhase::Gameplay {
                    state.stats.ensure_player(name);
                }
                state.snapshot()
            })
        };
        if let Some(snapshot) = snapshot {
            self.outbox.send_to(name, &snapshot.to_message());
        }
        self.check_player_count().await;
    }

    /// Keep a departing player's stats for the final scoreboard
    pub fn on_player_left(&self, name: &str) {
        if let Some(state) = self.state.lock().as_mut() {
            state.stats.player_left(name);
        }
    }

    /// Count a resolved shot. Returns false outside gameplay.
    pub fn record_shot(&self, report: &ShotReport) -> bool {
        match self.state.lock().as_mut() {
            Some(state) if state.phase == MatchPhase::Gameplay => {
                state.stats.record_shot(report);
                true
            }
            _ => false,
        }
    }

    /// Start warmup if enough players are connected
    pub async fn check_player_count(self: &Arc<Self>) {
        let generation = {
            let mut guard = self.state.lock();
            let Some(state) = guard.as_mut() else {
                return;
            };
            if state.phase != MatchPhase::WaitingForPlayers || state.starting {
                return;
            }
            let players = self.registry.len();
            if players < self.config.min_players {
                debug!(players, min = self.config.min_players, "Still waiting for players");
                return;
            }
            state.starting = true;
            state.waiting_poll = None;
            state.generation
        };

        let record = match self.store.create_match().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to persist new match, continuing unpersisted");
                MatchRecord {
                    match_id: Uuid::new_v4(),
                    started_at: Utc::now(),
                }
            }
        };

        {
            let mut guard = self.state.lock();
            match guard.as_mut() {
                Some(state)
                    if state.generation == generation
                        && state.phase == MatchPhase::WaitingForPlayers =>
                {
                    state.match_id = Some(record.match_id);
                    state.starting = false;
                }
                _ => {
                    debug!(match_id = %record.match_id, "Match changed while persisting, dropping warmup start");
                    return;
                }
            }
        }

        info!(match_id = %record.match_id, players = self.registry.len(), "Enough players, starting warmup");
        self.enter_phase(generation, MatchPhase::Warmup, self.config.warmup);
    }

    /// Returns true if a persisted match was resumed
    async fn recover(self: &Arc<Self>) -> bool {
        let record = match self.store.get_active_match().await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Could not look up active match, starting fresh");
                return false;
            }
        };

        let elapsed = (Utc::now() - record.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        match self.timeline.position(elapsed) {
            TimelinePosition::Finished => {
                info!(
                    match_id = %record.match_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    total_ms = self.timeline.total().as_millis() as u64,
                    "Persisted match already over, closing it"
                );
                if let Err(e) = self.store.end_match(record.match_id).await {
                    warn!(match_id = %record.match_id, error = %e, "Failed to close stale match");
                }
                false
            }
            TimelinePosition::InPhase { phase, remaining } => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let mut state = MatchState::waiting(generation);
                state.match_id = Some(record.match_id);
                *self.state.lock() = Some(state);

                info!(
                    match_id = %record.match_id,
                    phase = ?phase,
                    remaining_ms = remaining.as_millis() as u64,
                    "Recovered persisted match"
                );
                self.enter_phase(generation, phase, remaining);
                true
            }
        }
    }

    /// Begin a new match in the waiting phase
    fn open_match(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut state = MatchState::waiting(generation);

        let manager = Arc::clone(self);
        state.waiting_poll = Some(ScheduledTask::every(
            self.config.waiting_poll,
            state.phase_token.child_token(),
            move || {
                let manager = Arc::clone(&manager);
                async move { manager.check_player_count().await }
            },
        ));

        let msg = state.snapshot().to_message();
        *self.state.lock() = Some(state);

        info!(generation, "Waiting for players");
        self.outbox.broadcast(&msg, None);

        // Players left over from the previous match may already be enough
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.check_player_count().await });
    }

    /// Switch to `phase` for `remaining`, replacing every task of the
    /// previous phase
    fn enter_phase(self: &Arc<Self>, generation: u64, phase: MatchPhase, remaining: Duration) {
        let msg = {
            let mut guard = self.state.lock();
            let Some(state) = guard.as_mut().filter(|s| s.generation == generation) else {
                return;
            };

            state.phase_token.cancel();
            state.phase_token = CancellationToken::new();
            state.waiting_poll = None;
            state.periodic.clear();

            state.phase = phase;
            state.phase_ends_at = Some(Instant::now() + remaining);

            let manager = Arc::clone(self);
            state.phase_timer = Some(ScheduledTask::after(
                remaining,
                state.phase_token.child_token(),
                move || async move { manager.on_phase_elapsed(generation, phase).await },
            ));

            if phase == MatchPhase::Gameplay {
                for name in self.registry.names() {
                    state.stats.ensure_player(&name);
                }

                let manager = Arc::clone(self);
                state.periodic.push(ScheduledTask::every(
                    TIMER_BROADCAST_INTERVAL,
                    state.phase_token.child_token(),
                    move || {
                        manager.broadcast_timer(generation);
                        futures::future::ready(())
                    },
                ));

                let manager = Arc::clone(self);
                state.periodic.push(ScheduledTask::every(
                    STATS_BROADCAST_INTERVAL,
                    state.phase_token.child_token(),
                    move || {
                        manager.broadcast_stats(generation);
                        futures::future::ready(())
                    },
                ));
            }

            state.snapshot().to_message()
        };

        info!(phase = ?phase, remaining_ms = remaining.as_millis() as u64, "Match phase changed");
        self.outbox.broadcast(&msg, None);
    }

    async fn on_phase_elapsed(self: &Arc<Self>, generation: u64, phase: MatchPhase) {
        let current = self
            .state
            .lock()
            .as_ref()
            .filter(|s| s.generation == generation)
            .map(|s| s.phase);
        if current != Some(phase) {
            debug!(phase = ?phase, "Ignoring timer from a previous phase");
            return;
        }

        match phase.next() {
            Some(MatchPhase::Gameplay) => {
                self.enter_phase(generation, MatchPhase::Gameplay, self.config.gameplay)
            }
            Some(MatchPhase::Results) => self.finish_gameplay(generation).await,
            None => self.close_match(generation).await,
            // Waiting has no timer; the player count check ends it
            Some(MatchPhase::Warmup | MatchPhase::WaitingForPlayers) => {}
        }
    }

    /// Gameplay is over: refill ammo, publish and persist the scoreboard
    async fn finish_gameplay(self: &Arc<Self>, generation: u64) {
        let refilled = self.registry.refill_all();
        debug!(players = refilled.len(), "Refilled ammo for results");
        self.outbox.broadcast(
            &ServerMsg::AmmoUpdate {
                ammo: MAX_AMMO,
                max_ammo: MAX_AMMO,
            },
            None,
        );

        let Some((match_id, lines, scoreboard)) = ({
            let guard = self.state.lock();
            guard.as_ref().filter(|s| s.generation == generation).map(|s| {
                let lines: Vec<_> = s
                    .stats
                    .lines()
                    .filter(|(_, line)| !line.is_empty())
                    .map(|(name, line)| (name.clone(), *line))
                    .collect();
                (s.match_id, lines, s.stats.scoreboard())
            })
        }) else {
            return;
        };

        self.outbox
            .broadcast(&ServerMsg::MatchStatsUpdate { stats: scoreboard }, None);
        self.enter_phase(generation, MatchPhase::Results, self.config.results);

        let Some(match_id) = match_id else {
            return;
        };
        for (name, line) in lines {
            if let Err(e) = self.store.update_user_stats(&name, match_id, line).await {
                warn!(name = %name, match_id = %match_id, error = %e, "Failed to persist match stats");
            }
        }
    }

    /// Results are over: end the match and schedule the next one
    async fn close_match(self: &Arc<Self>, generation: u64) {
        let state = {
            let mut guard = self.state.lock();
            if guard.as_ref().map(|s| s.generation) != Some(generation) {
                return;
            }
            guard.take()
        };
        let Some(state) = state else {
            return;
        };
        let match_id = state.match_id;
        drop(state);

        self.outbox.broadcast(&ServerMsg::MatchEnd { match_id }, None);

        let purged = self
            .registry
            .purge_stale(Instant::now(), self.config.stale_player_timeout);
        for name in &purged {
            self.outbox.evict(name);
            self.outbox
                .broadcast(&ServerMsg::RemovePlayer { name: name.clone() }, None);
        }
        if !purged.is_empty() {
            info!(count = purged.len(), "Purged stale players");
        }

        if let Some(id) = match_id {
            if let Err(e) = self.store.end_match(id).await {
                warn!(match_id = %id, error = %e, "Failed to close match record");
            }
        }
        info!(match_id = ?match_id, "Match ended");

        let manager = Arc::clone(self);
        *self.cooldown.lock() = Some(ScheduledTask::after(
            self.config.next_match_delay,
            self.shutdown.child_token(),
            move || async move { manager.open_match() },
        ));
    }

    fn broadcast_timer(&self, generation: u64) {
        let remaining = {
            let guard = self.state.lock();
            match guard.as_ref() {
                Some(s) if s.generation == generation && s.phase == MatchPhase::Gameplay => {
                    s.phase_ends_at.map(millis_until).unwrap_or(0)
                }
                _ => return,
            }
        };
        self.outbox.broadcast(
            &ServerMsg::MatchTimerUpdate {
                time_remaining: remaining,
            },
            None,
        );
    }

    fn broadcast_stats(&self, generation: u64) {
        let stats = {
            let guard = self.state.lock();
            match guard.as_ref() {
                Some(s) if s.generation == generation && s.phase == MatchPhase::Gameplay => {
                    s.stats.scoreboard()
                }
                _ => return,
            }
        };
        self.outbox
            .broadcast(&ServerMsg::MatchStatsUpdate { stats }, None);
    }
}
