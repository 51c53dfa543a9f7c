//! Anti-cheat checks on client-reported positions

use std::fmt;

use tokio::time::Instant;

use crate::config::{MovementConfig, ValidationConfig};

use super::vector::Vec3;

/// Slack for float rounding at the exact tolerance boundary
const DISTANCE_EPSILON: f32 = 1e-4;

/// Outcome of checking one reported position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    #[cfg(test)]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Moved further horizontally than the speed allows
    TooFast { distance: f32, allowed: f32 },
    /// Changed height without jumping
    GroundDrift { delta: f32, allowed: f32 },
    /// Rose faster than a jump allows
    TooHigh { delta: f32, allowed: f32 },
    /// Moved down, or claims to be rising without upward velocity, mid-jump
    NotRising { delta: f32, vertical_velocity: f32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooFast { distance, allowed } => {
                write!(f, "horizontal move {distance:.3} exceeds {allowed:.3}")
            }
            RejectReason::GroundDrift { delta, allowed } => {
                write!(f, "vertical drift {delta:.3} exceeds {allowed:.3} while grounded")
            }
            RejectReason::TooHigh { delta, allowed } => {
                write!(f, "vertical rise {delta:.3} exceeds {allowed:.3}")
            }
            RejectReason::NotRising {
                delta,
                vertical_velocity,
            } => write!(
                f,
                "jump not rising (delta {delta:.3}, vertical velocity {vertical_velocity:.3})"
            ),
        }
    }
}

/// Checks claimed positions against what the movement model permits
#[derive(Debug, Clone, Copy)]
pub struct PositionValidator {
    movement: MovementConfig,
    config: ValidationConfig,
}

impl PositionValidator {
    pub fn new(movement: MovementConfig, config: ValidationConfig) -> Self {
        Self { movement, config }
    }

    /// Decide whether moving from `previous` to `claimed` within `dt`
    /// seconds is plausible. Never mutates anything.
    pub fn validate(
        &self,
        previous: Vec3,
        claimed: Vec3,
        dt: f32,
        is_sprinting: bool,
        is_jumping: bool,
        vertical_velocity: f32,
    ) -> Verdict {
        let max_speed = if is_sprinting {
            self.movement.sprint_speed
        } else {
            self.movement.walk_speed
        };

        let distance = previous.horizontal_distance(&claimed);
        let allowed = max_speed * dt * self.config.horizontal_tolerance;
        if !distance.is_finite() || distance > allowed + DISTANCE_EPSILON {
            return Verdict::Reject(RejectReason::TooFast { distance, allowed });
        }

        let delta = claimed.y - previous.y;

        if !is_jumping {
            let allowed = self.config.ground_tolerance * dt;
            if !delta.is_finite() || delta.abs() > allowed + DISTANCE_EPSILON {
                return Verdict::Reject(RejectReason::GroundDrift { delta, allowed });
            }
            return Verdict::Accept;
        }

        if delta < 0.0 || vertical_velocity <= 0.0 {
            return Verdict::Reject(RejectReason::NotRising {
                delta,
                vertical_velocity,
            });
        }

        let allowed = self.movement.jump_force * dt * self.config.jump_tolerance;
        if !delta.is_finite() || delta > allowed + DISTANCE_EPSILON {
            return Verdict::Reject(RejectReason::TooHigh { delta, allowed });
        }

        Verdict::Accept
    }

    /// Seconds of movement to allow since the last accepted update.
    ///
    /// Returns `None` for a player with no accepted update yet; their first
    /// report is always accepted. The result is clamped to
    /// `[0, max_delta]` so one delayed packet cannot buy a long move.
    pub fn effective_delta(
        &self,
        last_update: Option<Instant>,
        now: Instant,
        network_time_offset_ms: f64,
    ) -> Option<f32> {
        let last = last_update?;
        let elapsed_ms =
            now.saturating_duration_since(last).as_secs_f64() * 1000.0 + network_time_offset_ms;
        let max_ms = self.config.max_delta.as_secs_f64() * 1000.0;
        let clamped = if elapsed_ms.is_finite() {
            elapsed_ms.clamp(0.0, max_ms)
        } else {
            max_ms
        };
        Some((clamped / 1000.0) as f32)
    }

    /// Whether enough time has passed since the last correction
    pub fn correction_due(&self, last_sent: Option<Instant>, now: Instant) -> bool {
        match last_sent {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) >= self.config.correction_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn validator() -> PositionValidator {
        let movement = MovementConfig {
            walk_speed: 3.0,
            ..MovementConfig::default()
        };
        let config = ValidationConfig {
            horizontal_tolerance: 1.2,
            ..ValidationConfig::default()
        };
        PositionValidator::new(movement, config)
    }

    #[test]
    fn horizontal_tolerance_boundary() {
        let v = validator();
        let origin = Vec3::ZERO;

        let at_limit = v.validate(origin, Vec3::new(0.36, 0.0, 0.0), 0.1, false, false, 0.0);
        assert_eq!(at_limit, Verdict::Accept);

        let beyond = v.validate(origin, Vec3::new(0.37, 0.0, 0.0), 0.1, false, false, 0.0);
        assert!(matches!(beyond, Verdict::Reject(RejectReason::TooFast { .. })));
    }

    #[test]
    fn sprinting_raises_the_limit() {
        let v = validator();
        let claimed = Vec3::new(0.0, 0.0, -0.5);
        assert!(!v.validate(Vec3::ZERO, claimed, 0.1, false, false, 0.0).is_accepted());
        assert!(v.validate(Vec3::ZERO, claimed, 0.1, true, false, 0.0).is_accepted());
    }

    #[test]
    fn grounded_vertical_drift_is_rejected() {
        let v = validator();
        let tiny = v.validate(Vec3::ZERO, Vec3::new(0.0, 0.01, 0.0), 0.1, false, false, 0.0);
        assert_eq!(tiny, Verdict::Accept);

        let climb = v.validate(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 0.1, false, false, 0.0);
        assert!(matches!(climb, Verdict::Reject(RejectReason::GroundDrift { .. })));
    }

    #[test]
    fn jumping_must_rise_within_bound() {
        let v = validator();
        let rising = v.validate(Vec3::ZERO, Vec3::new(0.0, 0.4, 0.0), 0.1, false, true, 4.0);
        assert_eq!(rising, Verdict::Accept);

        let falling = v.validate(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.9, 0.0),
            0.1,
            false,
            true,
            -1.0,
        );
        assert!(matches!(falling, Verdict::Reject(RejectReason::NotRising { .. })));

        let no_velocity = v.validate(Vec3::ZERO, Vec3::new(0.0, 0.1, 0.0), 0.1, false, true, 0.0);
        assert!(matches!(no_velocity, Verdict::Reject(RejectReason::NotRising { .. })));

        let rocket = v.validate(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 0.1, false, true, 4.0);
        assert!(matches!(rocket, Verdict::Reject(RejectReason::TooHigh { .. })));
    }

    #[test]
    fn non_finite_claim_is_rejected() {
        let v = validator();
        let nan = v.validate(Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0), 0.1, false, false, 0.0);
        assert!(!nan.is_accepted());
    }

    #[test]
    fn first_update_has_no_delta() {
        let v = validator();
        assert_eq!(v.effective_delta(None, Instant::now(), 0.0), None);
    }

    #[test]
    fn delta_is_clamped_to_max() {
        let v = validator();
        let now = Instant::now();
        let last = now - Duration::from_secs(5);
        assert_eq!(v.effective_delta(Some(last), now, 0.0), Some(0.2));

        let recent = now - Duration::from_millis(100);
        let dt = v.effective_delta(Some(recent), now, 0.0).unwrap();
        assert!((dt - 0.1).abs() < 1e-4);

        let skewed = v.effective_delta(Some(recent), now, -500.0).unwrap();
        assert_eq!(skewed, 0.0);
    }

    #[test]
    fn corrections_are_rate_limited() {
        let v = validator();
        let now = Instant::now();
        assert!(v.correction_due(None, now));
        assert!(!v.correction_due(Some(now - Duration::from_millis(400)), now));
        assert!(v.correction_due(Some(now - Duration::from_millis(1000)), now));
    }
}
