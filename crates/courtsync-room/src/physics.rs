//! Shared ball and world geometry.
//!
//! The server is not a physics engine. Clients simulate the ball and
//! report samples; the room keeps the latest one, decaying its velocity
//! by the time elapsed since the previous sample:
//!
//! ```text
//! dt     = max(0, now - previous.ts)
//! factor = exp(-k * dt)        (1 when dt == 0)
//! v'     = v * factor
//! ```
//!
//! Positions are relayed as sent.

use courtsync_protocol::{Role, ServerFrame};

/// Default decay constant `k`, per second.
pub const DEFAULT_DAMPING: f64 = 0.03;

/// Velocity multiplier after `dt` seconds under damping `k`.
///
/// Returns exactly `1.0` when `dt` is zero, negative or not a number.
pub fn decay_factor(damping: f64, dt: f64) -> f64 {
    if dt > 0.0 { (-damping * dt).exp() } else { 1.0 }
}

/// The latest ball sample of a room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Epoch seconds at which the sample was recorded.
    pub ts: f64,
}

impl Ball {
    /// Builds the stored sample for a report received at `now`.
    pub fn sample(
        previous: Option<&Ball>,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        now: f64,
        damping: f64,
    ) -> Self {
        let dt = previous.map_or(0.0, |prev| now - prev.ts);
        let factor = decay_factor(damping, dt);
        Self {
            x,
            y,
            vx: vx * factor,
            vy: vy * factor,
            ts: now,
        }
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub fn to_frame(&self) -> ServerFrame {
        ServerFrame::Ball {
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            ts: self.ts,
        }
    }
}

/// World bounds reported by the first client that knows them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct World {
    pub width: f64,
    pub height: f64,
}

impl World {
    /// Where a player of `role` enters the court.
    ///
    /// Centered horizontally; A near the bottom edge, B near the top, each
    /// `margin` of the height away from its edge.
    pub fn spawn_point(&self, role: Role, margin: f64) -> (f64, f64) {
        let x = self.width / 2.0;
        let y = match role {
            Role::A => self.height * (1.0 - margin),
            Role::B => self.height * margin,
        };
        (x, y)
    }
}

/// Spawn point with optional bounds. Without bounds everyone starts at
/// the origin.
pub fn spawn_point(world: Option<World>, role: Role, margin: f64) -> (f64, f64) {
    world.map_or((0.0, 0.0), |w| w.spawn_point(role, margin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_factor_is_one_without_elapsed_time() {
        assert_eq!(decay_factor(0.03, 0.0), 1.0);
        assert_eq!(decay_factor(0.03, -5.0), 1.0);
        assert_eq!(decay_factor(0.03, f64::NAN), 1.0);
    }

    #[test]
    fn test_decay_factor_matches_exponential() {
        let f = decay_factor(0.03, 10.0);
        assert!((f - (-0.3f64).exp()).abs() < 1e-12);
        assert!(f < 1.0);
    }

    #[test]
    fn test_first_sample_keeps_velocity() {
        let ball = Ball::sample(None, 1.0, 2.0, 3.0, 4.0, 100.0, DEFAULT_DAMPING);
        assert_eq!(ball.vx, 3.0);
        assert_eq!(ball.vy, 4.0);
        assert_eq!(ball.ts, 100.0);
    }

    #[test]
    fn test_speed_strictly_decreases_with_elapsed_time() {
        let mut prev = Ball::sample(None, 0.0, 0.0, 3.0, 4.0, 100.0, DEFAULT_DAMPING);
        for step in 1..=5 {
            let next = Ball::sample(
                Some(&prev),
                0.0,
                0.0,
                3.0,
                4.0,
                100.0 + step as f64,
                DEFAULT_DAMPING,
            );
            assert!(next.speed() < 5.0, "sample {step} did not decay");
            prev = next;
        }
    }

    #[test]
    fn test_same_timestamp_does_not_decay() {
        let prev = Ball::sample(None, 0.0, 0.0, 3.0, 4.0, 100.0, DEFAULT_DAMPING);
        let next = Ball::sample(Some(&prev), 5.0, 5.0, 3.0, 4.0, 100.0, DEFAULT_DAMPING);
        assert_eq!(next.speed(), 5.0);
        assert_eq!((next.x, next.y), (5.0, 5.0));
    }

    #[test]
    fn test_clock_going_backwards_does_not_decay() {
        let prev = Ball::sample(None, 0.0, 0.0, 1.0, 0.0, 100.0, DEFAULT_DAMPING);
        let next = Ball::sample(Some(&prev), 0.0, 0.0, 1.0, 0.0, 90.0, DEFAULT_DAMPING);
        assert_eq!(next.vx, 1.0);
    }

    #[test]
    fn test_spawn_points_on_opposite_edges() {
        let world = World {
            width: 400.0,
            height: 800.0,
        };
        let (ax, ay) = spawn_point(Some(world), Role::A, 0.2);
        let (bx, by) = spawn_point(Some(world), Role::B, 0.2);
        assert_eq!((ax, bx), (200.0, 200.0));
        assert!((ay - 640.0).abs() < 1e-9);
        assert!((by - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_spawn_without_world_is_origin() {
        assert_eq!(spawn_point(None, Role::A, 0.2), (0.0, 0.0));
        assert_eq!(spawn_point(None, Role::B, 0.2), (0.0, 0.0));
    }
}
