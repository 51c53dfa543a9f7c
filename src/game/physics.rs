//! Player movement physics
//!
//! The same step runs on the client for prediction and here for authority,
//! so every constant comes from [`MovementConfig`] and the step is a pure
//! function of its inputs.

use serde::{Deserialize, Serialize};

use crate::config::MovementConfig;

use super::vector::Vec3;

/// Movement keys as reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementIntent {
    /// Forward axis (-1.0 = backwards, 1.0 = forwards)
    pub forward: f32,
    /// Strafe axis (-1.0 = left, 1.0 = right)
    pub side: f32,
    pub is_sprinting: bool,
    pub is_jumping: bool,
}

impl MovementIntent {
    /// Clamp both axes to [-1, 1] and normalize them jointly when both are
    /// pressed, so diagonal movement is no faster than straight movement.
    /// Non-finite axes are treated as released.
    pub fn sanitized(self) -> Self {
        let clean = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        let mut forward = clean(self.forward);
        let mut side = clean(self.side);

        if forward != 0.0 && side != 0.0 {
            let len = (forward * forward + side * side).sqrt();
            forward /= len;
            side /= len;
        }

        Self {
            forward,
            side,
            ..self
        }
    }
}

/// Kinematic state advanced by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub position: Vec3,
    /// Horizontal velocity (y is always zero)
    pub velocity: Vec3,
    pub vertical_velocity: f32,
    pub is_jumping: bool,
}

impl Body {
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.vertical_velocity.is_finite()
    }
}

/// Unit vector the player faces for a given yaw
pub fn forward_direction(yaw: f32) -> Vec3 {
    Vec3::new(-yaw.sin(), 0.0, -yaw.cos()).normalize()
}

/// Unit strafe-right vector, `forward × up`.
/// Clients must use the same convention or predictions drift sideways.
pub fn side_direction(yaw: f32) -> Vec3 {
    forward_direction(yaw).cross(&Vec3::UP)
}

/// Movement step over a [`MovementConfig`]
#[derive(Debug, Clone, Copy)]
pub struct MovementSimulator {
    config: MovementConfig,
}

impl MovementSimulator {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Speed for the given sprint state
    pub fn speed(&self, is_sprinting: bool) -> f32 {
        if is_sprinting {
            self.config.sprint_speed
        } else {
            self.config.walk_speed
        }
    }

    /// Advance `body` by `dt` seconds. Returns a new body; the input is
    /// left untouched.
    pub fn simulate(&self, body: &Body, intent: &MovementIntent, yaw: f32, dt: f32) -> Body {
        let cfg = &self.config;
        let ground = cfg.ground_level;

        // Horizontal target from facing and intent
        let target = (forward_direction(yaw) * intent.forward + side_direction(yaw) * intent.side)
            * self.speed(intent.is_sprinting);

        // Fixed-factor smoothing, not frame-rate independent
        let velocity = body.velocity.lerp(&target, cfg.movement_lerp).horizontal();

        let mut position = Vec3::new(
            body.position.x + velocity.x * dt,
            body.position.y,
            body.position.z + velocity.z * dt,
        );

        let mut vertical_velocity = body.vertical_velocity;
        let mut is_jumping = body.is_jumping;

        if intent.is_jumping && !is_jumping && position.y <= ground {
            vertical_velocity = cfg.jump_force;
            is_jumping = true;
        }

        vertical_velocity -= cfg.gravity * dt;
        position.y += vertical_velocity * dt;

        if position.y <= ground {
            position.y = ground;
            vertical_velocity = 0.0;
            is_jumping = false;
        }

        Body {
            position,
            velocity,
            vertical_velocity,
            is_jumping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn simulator() -> MovementSimulator {
        MovementSimulator::new(MovementConfig::default())
    }

    fn run(sim: &MovementSimulator, mut body: Body, intent: MovementIntent, yaw: f32, steps: usize) -> Body {
        for _ in 0..steps {
            body = sim.simulate(&body, &intent, yaw, DT);
        }
        body
    }

    #[test]
    fn ground_clamp_is_idempotent() {
        let sim = simulator();
        let intent = MovementIntent::default();
        let starts = [
            Body::at_rest(Vec3::ZERO),
            Body {
                position: Vec3::new(1.0, -3.0, 2.0),
                vertical_velocity: -12.0,
                is_jumping: true,
                ..Body::default()
            },
            Body {
                position: Vec3::new(0.0, -0.01, 0.0),
                vertical_velocity: 0.0,
                ..Body::default()
            },
        ];

        for start in starts {
            let mut body = start;
            for _ in 0..120 {
                body = sim.simulate(&body, &intent, 0.0, DT);
                assert_eq!(body.position.y, 0.0);
                assert!(!body.is_jumping);
                assert_eq!(body.vertical_velocity, 0.0);
            }
        }
    }

    #[test]
    fn jump_lands_in_time_and_stays_under_apex() {
        let sim = simulator();
        let cfg = *sim.config();
        let jump = MovementIntent {
            is_jumping: true,
            ..MovementIntent::default()
        };
        let idle = MovementIntent::default();

        let apex = cfg.jump_force * cfg.jump_force / (2.0 * cfg.gravity);
        let flight = 2.0 * cfg.jump_force / cfg.gravity;

        let mut body = sim.simulate(&Body::at_rest(Vec3::ZERO), &jump, 0.0, DT);
        assert!(body.is_jumping);
        assert!(body.position.y > 0.0);

        let mut elapsed = DT;
        let mut peak = body.position.y;
        while body.is_jumping {
            body = sim.simulate(&body, &idle, 0.0, DT);
            elapsed += DT;
            peak = peak.max(body.position.y);
            assert!(elapsed <= flight + DT, "still airborne after {elapsed}s");
        }

        assert_eq!(body.position.y, 0.0);
        assert!(peak <= apex + 1e-4, "peak {peak} above apex {apex}");
    }

    #[test]
    fn cannot_jump_again_while_airborne() {
        let sim = simulator();
        let jump = MovementIntent {
            is_jumping: true,
            ..MovementIntent::default()
        };
        let first = sim.simulate(&Body::at_rest(Vec3::ZERO), &jump, 0.0, DT);
        let second = sim.simulate(&first, &jump, 0.0, DT);
        assert!(second.vertical_velocity < first.vertical_velocity);
    }

    #[test]
    fn forward_at_zero_yaw_moves_negative_z() {
        let sim = simulator();
        let intent = MovementIntent {
            forward: 1.0,
            ..MovementIntent::default()
        };
        let body = run(&sim, Body::at_rest(Vec3::ZERO), intent, 0.0, 30);
        assert!(body.position.z < 0.0);
        assert!(body.position.x.abs() < 1e-5);
        assert_eq!(body.position.y, 0.0);
    }

    #[test]
    fn positive_side_strafes_right() {
        let sim = simulator();
        let intent = MovementIntent {
            side: 1.0,
            ..MovementIntent::default()
        };
        let body = run(&sim, Body::at_rest(Vec3::ZERO), intent, 0.0, 30);
        assert!(body.position.x > 0.0);
        assert!(body.position.z.abs() < 1e-5);

        let right = side_direction(std::f32::consts::FRAC_PI_2);
        assert!((right.x - 0.0).abs() < 1e-5);
        assert!((right.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn velocity_converges_to_sprint_speed() {
        let sim = simulator();
        let intent = MovementIntent {
            forward: 1.0,
            is_sprinting: true,
            ..MovementIntent::default()
        };
        let body = run(&sim, Body::at_rest(Vec3::ZERO), intent, 0.7, 200);
        let speed = body.velocity.length();
        assert!((speed - sim.config().sprint_speed).abs() < 1e-3);
        assert!(speed <= sim.config().sprint_speed + 1e-4);
    }

    #[test]
    fn diagonal_intent_is_not_faster() {
        let intent = MovementIntent {
            forward: 1.0,
            side: -1.0,
            ..MovementIntent::default()
        }
        .sanitized();
        let len = (intent.forward * intent.forward + intent.side * intent.side).sqrt();
        assert!((len - 1.0).abs() < 1e-6);

        let sim = simulator();
        let body = run(&sim, Body::at_rest(Vec3::ZERO), intent, 0.0, 200);
        assert!(body.velocity.length() <= sim.config().walk_speed + 1e-4);
    }

    #[test]
    fn sanitize_clamps_and_drops_nan() {
        let intent = MovementIntent {
            forward: 7.0,
            side: f32::NAN,
            ..MovementIntent::default()
        }
        .sanitized();
        assert_eq!(intent.forward, 1.0);
        assert_eq!(intent.side, 0.0);
    }

    #[test]
    fn simulate_is_deterministic() {
        let sim = simulator();
        let intent = MovementIntent {
            forward: 0.5,
            side: 0.25,
            is_sprinting: true,
            is_jumping: true,
        }
        .sanitized();
        let a = run(&sim, Body::at_rest(Vec3::new(4.0, 0.0, -2.0)), intent, 1.3, 90);
        let b = run(&sim, Body::at_rest(Vec3::new(4.0, 0.0, -2.0)), intent, 1.3, 90);
        assert_eq!(a, b);
    }
}
