//! Per-match stat tracking and scoreboard assembly

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ws::protocol::ScoreboardEntry;

use super::combat::{HitZone, ShotReport};

/// Counters for one player in one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatLine {
    pub kills: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub missedshots: u32,
}

impl StatLine {
    pub fn merge(&mut self, other: &StatLine) {
        self.kills += other.kills;
        self.deaths += other.deaths;
        self.headshots += other.headshots;
        self.bodyshots += other.bodyshots;
        self.missedshots += other.missedshots;
    }

    pub fn is_empty(&self) -> bool {
        *self == StatLine::default()
    }

    fn entry(&self, name: &str, active: bool) -> ScoreboardEntry {
        ScoreboardEntry {
            name: name.to_string(),
            kills: self.kills,
            deaths: self.deaths,
            headshots: self.headshots,
            bodyshots: self.bodyshots,
            missedshots: self.missedshots,
            active,
        }
    }
}

/// Stats of connected players plus those who left before the match ended
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
    live: HashMap<String, StatLine>,
    departed: HashMap<String, StatLine>,
}

impl MatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connected player. A player returning to the same
    /// match gets their earlier line back.
    pub fn ensure_player(&mut self, name: &str) {
        if self.live.contains_key(name) {
            return;
        }
        let line = self.departed.remove(name).unwrap_or_default();
        self.live.insert(name.to_string(), line);
    }

    /// Move a player's line to the departed set
    pub fn player_left(&mut self, name: &str) {
        if let Some(line) = self.live.remove(name) {
            self.departed.insert(name.to_string(), line);
        }
    }

    pub fn record_shot(&mut self, report: &ShotReport) {
        let shooter = self.live.entry(report.shooter.clone()).or_default();
        match report.zone {
            HitZone::Head => shooter.headshots += 1,
            HitZone::Body => shooter.bodyshots += 1,
            HitZone::Miss => shooter.missedshots += 1,
        }
        if report.killed {
            shooter.kills += 1;
            if let Some(victim) = &report.target {
                self.live.entry(victim.clone()).or_default().deaths += 1;
            }
        }
    }

    #[cfg(test)]
    pub fn line(&self, name: &str) -> Option<&StatLine> {
        self.live.get(name).or_else(|| self.departed.get(name))
    }

    /// Every tracked line, live and departed
    pub fn lines(&self) -> impl Iterator<Item = (&String, &StatLine)> {
        self.live.iter().chain(self.departed.iter())
    }

    /// Live and departed players, most kills first. Ties go to fewer deaths,
    /// then name, so the order is stable between broadcasts.
    pub fn scoreboard(&self) -> Vec<ScoreboardEntry> {
        let mut rows: Vec<ScoreboardEntry> = self
            .live
            .iter()
            .map(|(name, line)| line.entry(name, true))
            .chain(self.departed.iter().map(|(name, line)| line.entry(name, false)))
            .collect();

        rows.sort_by(|a, b| {
            b.kills
                .cmp(&a.kills)
                .then(a.deaths.cmp(&b.deaths))
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }
}
