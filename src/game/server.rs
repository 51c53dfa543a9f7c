//! Inbound message dispatch over the registry, validator and match manager

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::store::Persistence;
use crate::util::time::unix_millis;
use crate::ws::hub::Outbox;
use crate::ws::protocol::{ClientMsg, MovementInput, ProtocolError, Role, ServerMsg, TransformSnapshot};

use super::combat::{HitZone, ShotResolution, MAX_AMMO};
use super::physics::{MovementIntent, MovementSimulator};
use super::player::PlayerRegistry;
use super::r#match::MatchLifecycleManager;
use super::validation::{PositionValidator, RejectReason, Verdict};
use super::vector::Vec3;

/// Errors reported back to the sending client
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Player {0} is banned")]
    Banned(String),

    #[error("{name} is not allowed to {action}")]
    Forbidden { name: String, action: &'static str },

    #[error("Connection is bound to {bound}, not {claimed}")]
    NameMismatch { bound: String, claimed: String },
}

impl GameError {
    /// Code sent in the ERROR message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Protocol(ProtocolError::Malformed(_)) => "MALFORMED",
            GameError::Protocol(ProtocolError::UnknownKind(_)) => "UNKNOWN_TYPE",
            GameError::UnknownPlayer(_) => "UNKNOWN_PLAYER",
            GameError::Banned(_) => "BANNED",
            GameError::Forbidden { .. } => "FORBIDDEN",
            GameError::NameMismatch { .. } => "NAME_MISMATCH",
        }
    }
}

/// Result of checking one VERIFY_POSITION against the authoritative state
enum PositionOutcome {
    Accepted,
    Corrected(TransformSnapshot, RejectReason),
    Suppressed(RejectReason),
}

/// The authoritative game: owns the registry and the match manager and
/// applies every client message to them
pub struct GameServer {
    config: GameConfig,
    registry: Arc<PlayerRegistry>,
    simulator: MovementSimulator,
    validator: PositionValidator,
    matches: Arc<MatchLifecycleManager>,
    outbox: Arc<dyn Outbox>,
    store: Arc<dyn Persistence>,
}

impl GameServer {
    pub fn new(config: GameConfig, outbox: Arc<dyn Outbox>, store: Arc<dyn Persistence>) -> Self {
        let registry = Arc::new(PlayerRegistry::new());
        let matches = MatchLifecycleManager::new(
            config.matches,
            registry.clone(),
            outbox.clone(),
            store.clone(),
        );

        Self {
            simulator: MovementSimulator::new(config.movement),
            validator: PositionValidator::new(config.movement, config.validation),
            config,
            registry,
            matches,
            outbox,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn matches(&self) -> &Arc<MatchLifecycleManager> {
        &self.matches
    }

    /// Advance every player by one physics step
    pub fn step(&self, dt: f32) {
        let skipped = self.registry.step_all(&self.simulator, dt);
        if skipped > 0 {
            debug!(skipped, "Physics step skipped players");
        }
    }

    /// Apply one client message
    pub async fn handle(&self, msg: ClientMsg) -> Result<(), GameError> {
        match msg {
            ClientMsg::AddNewPlayer {
                name,
                position,
                rotation,
                pitch,
            } => {
                let transform = TransformSnapshot {
                    position,
                    rotation,
                    pitch,
                };
                self.join(&name, transform).await
            }
            ClientMsg::UpdatePlayerKeybinds {
                name,
                movement,
                network_time_offset,
                ..
            } => self.update_keybinds(&name, &movement, network_time_offset),
            ClientMsg::VerifyPosition { name, position } => self.verify_position(&name, position),
            ClientMsg::Disconnect { name } => {
                self.leave(&name);
                Ok(())
            }
            ClientMsg::ShotFired {
                name,
                target,
                hit_zone,
            } => self.fire(&name, target.as_deref(), hit_zone),
            ClientMsg::Reload { name } => self.reload(&name),
            ClientMsg::Chat { name, text } => self.chat(&name, text).await,
            ClientMsg::KickPlayer { name, target } => self.kick(&name, &target),
        }
    }

    /// Spawn a player and bring them up to date
    async fn join(&self, name: &str, transform: TransformSnapshot) -> Result<(), GameError> {
        match self.store.is_banned(name).await {
            Ok(true) => {
                info!(name = %name, "Refused banned player");
                return Err(GameError::Banned(name.to_string()));
            }
            Ok(false) => {}
            Err(e) => warn!(name = %name, error = %e, "Ban lookup failed, admitting player"),
        }

        let seed = match self.store.get_user_stats(name).await {
            Ok(seed) => seed,
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to load persisted stats");
                None
            }
        };

        let transform = TransformSnapshot {
            position: if transform.position.is_finite() {
                transform.position
            } else {
                Vec3::ZERO
            },
            ..transform
        };
        self.registry.add_player(name, transform, seed.as_ref());
        let player = self
            .registry
            .player_snapshot(name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

        self.outbox.send_to(
            name,
            &ServerMsg::Welcome {
                name: name.to_string(),
                server_time: unix_millis(),
                tick_rate: self.config.tick_rate,
            },
        );
        for other in self.registry.all_snapshots() {
            if other.name != name {
                self.outbox
                    .send_to(name, &ServerMsg::NewPlayer { player: other });
            }
        }
        self.outbox.send_to(
            name,
            &ServerMsg::AmmoUpdate {
                ammo: MAX_AMMO,
                max_ammo: MAX_AMMO,
            },
        );
        self.outbox
            .broadcast(&ServerMsg::NewPlayer { player }, Some(name));

        info!(name = %name, players = self.registry.len(), "Player joined");
        self.matches.on_player_joined(name).await;
        Ok(())
    }

    fn update_keybinds(
        &self,
        name: &str,
        movement: &MovementInput,
        network_time_offset: f64,
    ) -> Result<(), GameError> {
        let intent = MovementIntent {
            forward: movement.forward,
            side: movement.side,
            is_sprinting: movement.is_sprinting,
            is_jumping: movement.is_jumping,
        };
        if !self.registry.update_movement_intent(name, intent) {
            return Err(GameError::UnknownPlayer(name.to_string()));
        }

        let now = Instant::now();
        let player = self
            .registry
            .with_player_mut(name, |p| {
                p.set_look(movement.rotation, movement.pitch);
                if network_time_offset.is_finite() {
                    p.network_time_offset = network_time_offset;
                }
                p.last_seen = now;
                p.snapshot()
            })
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

        self.outbox
            .broadcast(&ServerMsg::UpdatePlayer { player }, Some(name));
        Ok(())
    }

    /// Accept a client-predicted position or send back the authoritative one
    fn verify_position(&self, name: &str, claimed: Vec3) -> Result<(), GameError> {
        let now = Instant::now();
        let validator = &self.validator;

        let outcome = self
            .registry
            .with_player_mut(name, |p| {
                p.last_seen = now;
                let verdict =
                    match validator.effective_delta(p.last_update_time, now, p.network_time_offset) {
                        None if claimed.is_finite() => Verdict::Accept,
                        None => Verdict::Reject(RejectReason::TooFast {
                            distance: f32::INFINITY,
                            allowed: 0.0,
                        }),
                        // Horizontal travel counts from the last accepted report;
                        // height follows the simulated body through jumps and landings
                        Some(dt) => validator.validate(
                            Vec3 {
                                y: p.body.position.y,
                                ..p.last_accepted_position
                            },
                            claimed,
                            dt,
                            p.intent.is_sprinting,
                            p.body.is_jumping,
                            p.body.vertical_velocity,
                        ),
                    };

                match verdict {
                    Verdict::Accept => {
                        p.body.position = claimed;
                        p.last_accepted_position = claimed;
                        p.last_update_time = Some(now);
                        PositionOutcome::Accepted
                    }
                    Verdict::Reject(reason) => {
                        if validator.correction_due(p.last_correction_sent, now) {
                            p.last_correction_sent = Some(now);
                            PositionOutcome::Corrected(p.transform(), reason)
                        } else {
                            PositionOutcome::Suppressed(reason)
                        }
                    }
                }
            })
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

        match outcome {
            PositionOutcome::Accepted => {
                if let Some(player) = self.registry.player_snapshot(name) {
                    self.outbox
                        .broadcast(&ServerMsg::UpdatePlayer { player }, Some(name));
                }
            }
            PositionOutcome::Corrected(transform, reason) => {
                debug!(name = %name, reason = %reason, "Position rejected, sending correction");
                self.outbox.send_to(
                    name,
                    &ServerMsg::PositionCorrection {
                        position: transform.position,
                        rotation: transform.rotation,
                        pitch: transform.pitch,
                    },
                );
            }
            PositionOutcome::Suppressed(reason) => {
                debug!(name = %name, reason = %reason, "Position rejected, correction rate limited");
            }
        }
        Ok(())
    }

    /// Remove a player. Safe to call more than once.
    pub fn leave(&self, name: &str) {
        if !self.registry.remove_player(name) {
            return;
        }
        self.matches.on_player_left(name);
        self.outbox.broadcast(
            &ServerMsg::RemovePlayer {
                name: name.to_string(),
            },
            None,
        );
        info!(name = %name, players = self.registry.len(), "Player left");
    }

    fn fire(&self, name: &str, target: Option<&str>, zone: HitZone) -> Result<(), GameError> {
        if !self.matches.allows_combat() {
            debug!(name = %name, "Shot outside combat phases ignored");
            return Ok(());
        }
        let counts = self.matches.counts_stats();

        let report = match self.registry.fire_shot(name, target, zone, counts) {
            ShotResolution::UnknownShooter => {
                return Err(GameError::UnknownPlayer(name.to_string()))
            }
            ShotResolution::OutOfAmmo => {
                self.outbox.send_to(
                    name,
                    &ServerMsg::AmmoUpdate {
                        ammo: 0,
                        max_ammo: MAX_AMMO,
                    },
                );
                return Ok(());
            }
            ShotResolution::Fired(report) => report,
        };

        if counts {
            self.matches.record_shot(&report);
        }
        self.outbox.send_to(
            name,
            &ServerMsg::AmmoUpdate {
                ammo: report.ammo_left,
                max_ammo: MAX_AMMO,
            },
        );

        if let Some(victim) = &report.target {
            if let Some(player) = self.registry.player_snapshot(victim) {
                self.outbox
                    .broadcast(&ServerMsg::UpdatePlayer { player }, None);
            }
            if report.killed {
                info!(killer = %name, victim = %victim, zone = ?report.zone, "Player killed");
                if let Some(player) = self.registry.player_snapshot(name) {
                    self.outbox
                        .broadcast(&ServerMsg::UpdatePlayer { player }, None);
                }
            }
        }
        Ok(())
    }

    fn reload(&self, name: &str) -> Result<(), GameError> {
        let ammo = self
            .registry
            .refill_ammo(name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
        self.outbox.send_to(
            name,
            &ServerMsg::AmmoUpdate {
                ammo,
                max_ammo: MAX_AMMO,
            },
        );
        Ok(())
    }

    async fn chat(&self, name: &str, text: String) -> Result<(), GameError> {
        if !self.registry.contains(name) {
            return Err(GameError::UnknownPlayer(name.to_string()));
        }

        match self.store.is_muted(name).await {
            Ok(true) => {
                debug!(name = %name, "Dropped chat from muted player");
                self.outbox
                    .send_to(name, &ServerMsg::error("MUTED", "You are muted"));
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!(name = %name, error = %e, "Mute lookup failed, relaying chat"),
        }
        if !self.registry.contains(name) {
            debug!(name = %name, "Sender left during mute lookup, chat dropped");
            return Ok(());
        }

        self.outbox.broadcast(
            &ServerMsg::Chat {
                name: name.to_string(),
                text,
            },
            None,
        );
        Ok(())
    }

    fn kick(&self, name: &str, target: &str) -> Result<(), GameError> {
        let role = self
            .registry
            .with_player(name, |p| p.role)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
        if role < Role::Moderator {
            return Err(GameError::Forbidden {
                name: name.to_string(),
                action: "kick players",
            });
        }
        if !self.registry.contains(target) {
            return Err(GameError::UnknownPlayer(target.to_string()));
        }

        self.outbox.send_to(
            target,
            &ServerMsg::error("KICKED", format!("Kicked by {name}")),
        );
        self.outbox.evict(target);
        self.leave(target);
        info!(moderator = %name, target = %target, "Player kicked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::r#match::MatchPhase;
    use crate::store::InMemoryStore;
    use crate::ws::hub::{Delivery, RecordingOutbox};
    use std::time::Duration;
    use tokio_test::assert_ok;

    struct Harness {
        server: GameServer,
        outbox: Arc<RecordingOutbox>,
        store: Arc<InMemoryStore>,
    }

    fn harness() -> Harness {
        let outbox = Arc::new(RecordingOutbox::new());
        let store = Arc::new(InMemoryStore::new());
        let server = GameServer::new(GameConfig::default(), outbox.clone(), store.clone());
        Harness {
            server,
            outbox,
            store,
        }
    }

    fn add(name: &str, x: f32) -> ClientMsg {
        ClientMsg::AddNewPlayer {
            name: name.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Vec3::ZERO,
            pitch: 0.0,
        }
    }

    fn verify(name: &str, x: f32) -> ClientMsg {
        ClientMsg::VerifyPosition {
            name: name.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
        }
    }

    fn corrections(outbox: &RecordingOutbox, name: &str) -> usize {
        outbox
            .sent_to(name)
            .iter()
            .filter(|m| matches!(m, ServerMsg::PositionCorrection { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn join_welcomes_and_announces() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();
        h.outbox.clear();
        h.server.handle(add("ben", 1.0)).await.unwrap();

        let direct = h.outbox.sent_to("ben");
        assert!(matches!(&direct[0], ServerMsg::Welcome { name, .. } if name == "ben"));
        assert!(direct
            .iter()
            .any(|m| matches!(m, ServerMsg::NewPlayer { player } if player.name == "ann")));

        assert!(h.outbox.deliveries().iter().any(|d| matches!(
            d,
            Delivery::Broadcast { msg: ServerMsg::NewPlayer { player }, exclude: Some(ex) }
                if player.name == "ben" && ex == "ben"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn banned_player_is_refused() {
        let h = harness();
        h.store.ban("troll");
        let err = h.server.handle(add("troll", 0.0)).await.unwrap_err();
        assert_eq!(err.code(), "BANNED");
        assert!(!h.server.registry().contains("troll"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_update_accepted_then_corrections_rate_limited() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();

        // First report is taken as-is
        h.server.handle(verify("ann", 0.1)).await.unwrap();
        assert_eq!(h.server.registry().get_snapshot("ann").unwrap().position.x, 0.1);

        tokio::time::advance(Duration::from_millis(100)).await;
        h.server.handle(verify("ann", 0.4)).await.unwrap();
        assert!((h.server.registry().get_snapshot("ann").unwrap().position.x - 0.4).abs() < 1e-6);
        assert_eq!(corrections(&h.outbox, "ann"), 0);

        tokio::time::advance(Duration::from_millis(100)).await;
        h.server.handle(verify("ann", 10.0)).await.unwrap();
        assert_eq!(corrections(&h.outbox, "ann"), 1);
        assert!((h.server.registry().get_snapshot("ann").unwrap().position.x - 0.4).abs() < 1e-6);

        tokio::time::advance(Duration::from_millis(100)).await;
        h.server.handle(verify("ann", 10.0)).await.unwrap();
        assert_eq!(corrections(&h.outbox, "ann"), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        h.server.handle(verify("ann", 10.0)).await.unwrap();
        assert_eq!(corrections(&h.outbox, "ann"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn walking_player_cannot_claim_double_speed() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();
        h.server
            .handle(ClientMsg::UpdatePlayerKeybinds {
                name: "ann".to_string(),
                movement: MovementInput {
                    forward: 1.0,
                    ..MovementInput::default()
                },
                timestamp: 0,
                network_time_offset: 0.0,
            })
            .await
            .unwrap();
        h.server.handle(verify("ann", 0.0)).await.unwrap();

        // The server has already walked the body forward for this interval
        tokio::time::advance(Duration::from_millis(200)).await;
        for _ in 0..12 {
            h.server.step(1.0 / 60.0);
        }

        // 2.1x walk speed over 200 ms, measured from the last accepted report
        let claim = |z: f32| ClientMsg::VerifyPosition {
            name: "ann".to_string(),
            position: Vec3::new(0.0, 0.0, z),
        };
        h.server.handle(claim(-3.0 * 0.2 * 2.1)).await.unwrap();
        assert_eq!(corrections(&h.outbox, "ann"), 1);
        h.server
            .registry()
            .with_player("ann", |p| assert_eq!(p.last_accepted_position, Vec3::ZERO))
            .unwrap();

        // Plain walking pace is still fine
        h.server.handle(claim(-0.6)).await.unwrap();
        let position = h.server.registry().get_snapshot("ann").unwrap().position;
        assert!((position.z + 0.6).abs() < 1e-6);
        assert_eq!(corrections(&h.outbox, "ann"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keybinds_for_unknown_player_are_rejected() {
        let h = harness();
        let msg = ClientMsg::UpdatePlayerKeybinds {
            name: "ghost".to_string(),
            movement: MovementInput::default(),
            timestamp: 0,
            network_time_offset: 0.0,
        };
        let err = h.server.handle(msg).await.unwrap_err();
        assert!(matches!(err, GameError::UnknownPlayer(_)));
        assert!(h.server.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keybinds_drive_physics() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();
        let msg = ClientMsg::UpdatePlayerKeybinds {
            name: "ann".to_string(),
            movement: MovementInput {
                forward: 1.0,
                ..MovementInput::default()
            },
            timestamp: 0,
            network_time_offset: 15.0,
        };
        h.server.handle(msg).await.unwrap();

        for _ in 0..60 {
            h.server.step(1.0 / 60.0);
        }
        let position = h.server.registry().get_snapshot("ann").unwrap().position;
        assert!(position.z < -0.5, "moved to {position:?}");
        h.server
            .registry()
            .with_player("ann", |p| assert_eq!(p.network_time_offset, 15.0))
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shots_need_an_active_match_and_ammo() {
        let h = harness();
        h.server.matches().start().await;
        h.server.handle(add("ann", 0.0)).await.unwrap();

        let shot = || ClientMsg::ShotFired {
            name: "ann".to_string(),
            target: None,
            hit_zone: HitZone::Miss,
        };

        // Still waiting for a second player
        h.server.handle(shot()).await.unwrap();
        h.server
            .registry()
            .with_player("ann", |p| assert_eq!(p.ammo, MAX_AMMO))
            .unwrap();

        h.server.handle(add("ben", 5.0)).await.unwrap();
        assert_eq!(h.server.matches().phase(), Some(MatchPhase::Warmup));

        for _ in 0..MAX_AMMO {
            h.server.handle(shot()).await.unwrap();
        }
        h.outbox.clear();
        h.server.handle(shot()).await.unwrap();
        assert_eq!(
            h.outbox.sent_to("ann"),
            vec![ServerMsg::AmmoUpdate { ammo: 0, max_ammo: MAX_AMMO }]
        );

        // Warmup shots do not count
        h.server
            .registry()
            .with_player("ann", |p| assert_eq!(p.counters.missedshots, 0))
            .unwrap();

        h.server
            .handle(ClientMsg::Reload { name: "ann".to_string() })
            .await
            .unwrap();
        assert_eq!(
            h.outbox.sent_to("ann").last(),
            Some(&ServerMsg::AmmoUpdate { ammo: MAX_AMMO, max_ammo: MAX_AMMO })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn only_moderators_can_kick() {
        let h = harness();
        h.store.set_role("boss", Role::Moderator);
        h.server.handle(add("boss", 0.0)).await.unwrap();
        h.server.handle(add("ann", 1.0)).await.unwrap();
        h.server.handle(add("ben", 2.0)).await.unwrap();

        let err = h
            .server
            .handle(ClientMsg::KickPlayer {
                name: "ann".to_string(),
                target: "ben".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert!(h.server.registry().contains("ben"));

        h.server
            .handle(ClientMsg::KickPlayer {
                name: "boss".to_string(),
                target: "ben".to_string(),
            })
            .await
            .unwrap();
        assert!(!h.server.registry().contains("ben"));
        assert!(h
            .outbox
            .messages()
            .contains(&ServerMsg::RemovePlayer { name: "ben".to_string() }));
        assert_eq!(h.outbox.evicted(), vec!["ben".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn muted_chat_is_not_relayed() {
        let h = harness();
        h.store.mute("loud");
        h.server.handle(add("loud", 0.0)).await.unwrap();
        h.server.handle(add("ann", 1.0)).await.unwrap();
        h.outbox.clear();

        let chat = |name: &str| ClientMsg::Chat {
            name: name.to_string(),
            text: "hello".to_string(),
        };
        h.server.handle(chat("loud")).await.unwrap();
        h.server.handle(chat("ann")).await.unwrap();

        let relayed: Vec<_> = h
            .outbox
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::Chat { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(relayed, vec!["ann".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_from_player_who_left_during_mute_lookup_is_dropped() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();
        h.server.handle(add("ben", 1.0)).await.unwrap();
        h.store.set_lookup_latency(Duration::from_millis(50));
        h.outbox.clear();

        let chat = ClientMsg::Chat {
            name: "ann".to_string(),
            text: "bye all".to_string(),
        };
        // The lookup parks the chat; ann leaves before it resumes
        let (chatted, ()) = tokio::join!(h.server.handle(chat), async {
            h.server.leave("ann");
        });
        assert_ok!(chatted);

        assert!(!h
            .outbox
            .messages()
            .iter()
            .any(|m| matches!(m, ServerMsg::Chat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_is_idempotent() {
        let h = harness();
        h.server.handle(add("ann", 0.0)).await.unwrap();
        h.outbox.clear();

        let bye = || ClientMsg::Disconnect { name: "ann".to_string() };
        h.server.handle(bye()).await.unwrap();
        h.server.handle(bye()).await.unwrap();

        let removals = h
            .outbox
            .messages()
            .iter()
            .filter(|m| matches!(m, ServerMsg::RemovePlayer { .. }))
            .count();
        assert_eq!(removals, 1);
        assert!(h.server.registry().is_empty());
    }
}
