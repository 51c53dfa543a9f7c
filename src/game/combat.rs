//! Combat rules - ammo, damage, hit zones

use serde::{Deserialize, Serialize};

/// Health a player spawns with
pub const MAX_HEALTH: f32 = 100.0;
/// Magazine size
pub const MAX_AMMO: u32 = 30;

/// Where a reported shot landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HitZone {
    Head,
    Body,
    Miss,
}

/// Weapon damage table
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub body_damage: f32,
    pub head_damage: f32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            body_damage: 25.0,
            head_damage: 100.0,
        }
    }
}

/// What one resolved shot did
#[derive(Debug, Clone, PartialEq)]
pub struct ShotReport {
    pub shooter: String,
    /// Zone after resolution; a shot at a missing target counts as a miss
    pub zone: HitZone,
    pub target: Option<String>,
    pub killed: bool,
    pub ammo_left: u32,
}

/// Result of asking the registry to fire
#[derive(Debug, Clone, PartialEq)]
pub enum ShotResolution {
    UnknownShooter,
    OutOfAmmo,
    Fired(ShotReport),
}

/// Combat system for ammo and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a player can fire
    pub fn can_fire(ammo: u32) -> bool {
        ammo > 0
    }

    /// Damage dealt by a hit in `zone`
    pub fn damage_for(zone: HitZone, stats: &WeaponStats) -> f32 {
        match zone {
            HitZone::Head => stats.head_damage,
            HitZone::Body => stats.body_damage,
            HitZone::Miss => 0.0,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}
