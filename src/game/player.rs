//! Authoritative player state and the registry that owns it

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::UserStats;
use crate::ws::protocol::{PlayerSnapshot, Role, TransformSnapshot};

use super::combat::{
    CombatSystem, HitZone, ShotReport, ShotResolution, WeaponStats, MAX_AMMO, MAX_HEALTH,
};
use super::physics::{Body, MovementIntent, MovementSimulator};
use super::vector::Vec3;

/// Lifetime combat counters, seeded from persisted stats on join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombatCounters {
    pub kills: u32,
    pub kill_streak: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub missedshots: u32,
}

impl From<&UserStats> for CombatCounters {
    fn from(stats: &UserStats) -> Self {
        Self {
            kills: stats.kills,
            kill_streak: 0,
            deaths: stats.deaths,
            headshots: stats.headshots,
            bodyshots: stats.bodyshots,
            missedshots: stats.missedshots,
        }
    }
}

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub name: String,
    pub role: Role,

    // Transform and movement
    pub body: Body,
    pub rotation: Vec3,
    pub pitch: f32,
    pub intent: MovementIntent,

    // Bookkeeping
    /// Last accepted position report; `None` until the first one
    pub last_update_time: Option<Instant>,
    /// Position at `last_update_time`, the baseline for the next report
    pub last_accepted_position: Vec3,
    pub last_correction_sent: Option<Instant>,
    /// Client clock skew estimate in milliseconds
    pub network_time_offset: f64,
    /// Last inbound message of any kind
    pub last_seen: Instant,

    // Combat
    pub health: f32,
    pub ammo: u32,
    pub counters: CombatCounters,
}

impl PlayerState {
    pub fn new(name: &str, transform: TransformSnapshot, seed: Option<&UserStats>) -> Self {
        Self {
            name: name.to_string(),
            role: seed.map(|s| s.role).unwrap_or_default(),
            body: Body::at_rest(transform.position),
            rotation: transform.rotation,
            pitch: clamp_pitch(transform.pitch),
            intent: MovementIntent::default(),
            last_update_time: None,
            last_accepted_position: transform.position,
            last_correction_sent: None,
            network_time_offset: 0.0,
            last_seen: Instant::now(),
            health: MAX_HEALTH,
            ammo: MAX_AMMO,
            counters: seed.map(CombatCounters::from).unwrap_or_default(),
        }
    }

    /// Yaw in radians
    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }

    pub fn transform(&self) -> TransformSnapshot {
        TransformSnapshot {
            position: self.body.position,
            rotation: self.rotation,
            pitch: self.pitch,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            role: self.role,
            position: self.body.position,
            rotation: self.rotation,
            pitch: self.pitch,
            velocity: self.body.velocity,
            is_jumping: self.body.is_jumping,
            health: self.health,
            kills: self.counters.kills,
            deaths: self.counters.deaths,
        }
    }

    pub fn set_look(&mut self, rotation: Vec3, pitch: f32) {
        if rotation.is_finite() {
            self.rotation = rotation;
        }
        if pitch.is_finite() {
            self.pitch = clamp_pitch(pitch);
        }
    }
}

/// Pitch limited to straight up / straight down
pub fn clamp_pitch(pitch: f32) -> f32 {
    use std::f32::consts::FRAC_PI_2;
    if pitch.is_finite() {
        pitch.clamp(-FRAC_PI_2, FRAC_PI_2)
    } else {
        0.0
    }
}

/// Registry of all connected players, keyed by name.
///
/// Every method is a plain map update; broadcasting the change is up to the
/// caller.
pub struct PlayerRegistry {
    players: DashMap<String, PlayerState>,
    weapon: WeaponStats,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: DashMap::new(),
            weapon: WeaponStats::default(),
        }
    }

    /// Insert a player. An existing entry with the same name is replaced,
    /// which is how reconnects are handled.
    pub fn add_player(&self, name: &str, transform: TransformSnapshot, seed: Option<&UserStats>) {
        let player = PlayerState::new(name, transform, seed);
        if self.players.insert(name.to_string(), player).is_some() {
            debug!(name = %name, "Replaced existing player entry");
        }
    }

    /// Remove a player; unknown names are ignored. Returns whether an entry
    /// was removed.
    pub fn remove_player(&self, name: &str) -> bool {
        self.players.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.key().clone()).collect()
    }

    /// Store new movement keys. Returns false for unknown players.
    pub fn update_movement_intent(&self, name: &str, intent: MovementIntent) -> bool {
        self.with_player_mut(name, |p| p.intent = intent.sanitized())
            .is_some()
    }

    /// Position, rotation and pitch of a player
    pub fn get_snapshot(&self, name: &str) -> Option<TransformSnapshot> {
        self.players.get(name).map(|p| p.transform())
    }

    /// Overwrite a player's transform from a snapshot
    #[cfg(test)]
    pub fn apply_snapshot(&self, name: &str, transform: &TransformSnapshot) -> bool {
        self.with_player_mut(name, |p| {
            p.body.position = transform.position;
            p.set_look(transform.rotation, transform.pitch);
        })
        .is_some()
    }

    pub fn player_snapshot(&self, name: &str) -> Option<PlayerSnapshot> {
        self.players.get(name).map(|p| p.snapshot())
    }

    pub fn all_snapshots(&self) -> Vec<PlayerSnapshot> {
        self.players.iter().map(|p| p.snapshot()).collect()
    }

    pub fn with_player<R>(&self, name: &str, f: impl FnOnce(&PlayerState) -> R) -> Option<R> {
        self.players.get(name).map(|p| f(p.value()))
    }

    pub fn with_player_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut PlayerState) -> R,
    ) -> Option<R> {
        self.players.get_mut(name).map(|mut p| f(p.value_mut()))
    }

    /// Mark a player as alive on the wire
    pub fn touch(&self, name: &str, now: Instant) {
        self.with_player_mut(name, |p| p.last_seen = now);
    }

    /// Run one physics step for every player.
    ///
    /// A step producing non-finite values is discarded and that player keeps
    /// their previous state. Returns the number of players skipped.
    pub fn step_all(&self, simulator: &MovementSimulator, dt: f32) -> usize {
        let mut skipped = 0;
        for mut entry in self.players.iter_mut() {
            let player = entry.value_mut();
            let next = simulator.simulate(&player.body, &player.intent, player.yaw(), dt);
            if next.is_finite() {
                player.body = next;
            } else {
                skipped += 1;
                warn!(name = %player.name, "Discarded non-finite physics step");
            }
        }
        skipped
    }

    /// Spend one round from `shooter` and apply the hit, if any.
    ///
    /// `count_stats` controls whether lifetime counters move; health and
    /// ammo are always applied.
    pub fn fire_shot(
        &self,
        shooter: &str,
        target: Option<&str>,
        zone: HitZone,
        count_stats: bool,
    ) -> ShotResolution {
        let ammo_left = match self.with_player_mut(shooter, |p| {
            if CombatSystem::can_fire(p.ammo) {
                p.ammo -= 1;
                Some(p.ammo)
            } else {
                None
            }
        }) {
            None => return ShotResolution::UnknownShooter,
            Some(None) => return ShotResolution::OutOfAmmo,
            Some(Some(ammo)) => ammo,
        };

        // Self-hits and hits on players who already left count as misses
        let target = target.filter(|t| *t != shooter && zone != HitZone::Miss);
        let damage = CombatSystem::damage_for(zone, &self.weapon);
        let hit = target.and_then(|t| {
            self.with_player_mut(t, |victim| {
                let (health, killed) = CombatSystem::apply_damage(victim.health, damage);
                victim.health = health;
                if killed {
                    victim.health = MAX_HEALTH;
                    victim.counters.kill_streak = 0;
                    if count_stats {
                        victim.counters.deaths += 1;
                    }
                }
                killed
            })
            .map(|killed| (t.to_string(), killed))
        });

        let (zone, target, killed) = match hit {
            Some((name, killed)) => (zone, Some(name), killed),
            None => (HitZone::Miss, None, false),
        };

        if count_stats {
            self.with_player_mut(shooter, |p| {
                match zone {
                    HitZone::Head => p.counters.headshots += 1,
                    HitZone::Body => p.counters.bodyshots += 1,
                    HitZone::Miss => p.counters.missedshots += 1,
                }
                if killed {
                    p.counters.kills += 1;
                    p.counters.kill_streak += 1;
                }
            });
        }

        ShotResolution::Fired(ShotReport {
            shooter: shooter.to_string(),
            zone,
            target,
            killed,
            ammo_left,
        })
    }

    /// Fill one player's magazine, returning the new ammo count
    pub fn refill_ammo(&self, name: &str) -> Option<u32> {
        self.with_player_mut(name, |p| {
            p.ammo = MAX_AMMO;
            p.ammo
        })
    }

    /// Fill every magazine, returning who was refilled
    pub fn refill_all(&self) -> Vec<String> {
        self.players
            .iter_mut()
            .map(|mut p| {
                p.ammo = MAX_AMMO;
                p.key().clone()
            })
            .collect()
    }

    /// Drop players not heard from within `timeout`, returning their names
    pub fn purge_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .players
            .iter()
            .filter(|p| now.saturating_duration_since(p.last_seen) > timeout)
            .map(|p| p.key().clone())
            .collect();
        for name in &stale {
            self.players.remove(name);
        }
        stale
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
