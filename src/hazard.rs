//! Gravity well: drifts down the field and drags on the ship when it gets close.

use crate::rng::Rng;

/// Seconds between spawns (only when no well is on the field).
pub const SPAWN_INTERVAL_SECS: f32 = 40.0;
/// Pull radius in field pixels.
pub const INFLUENCE_RADIUS: f32 = 150.0;
/// Drawn diameter in field pixels.
pub const DIAMETER: f32 = 150.0;

const SPAWN_Y: f32 = -200.0;
const FALL_PX_PER_SEC: f32 = 18.0;
const SPIN_RAD_PER_SEC: f32 = 0.06;
/// Movement factor right at the centre.
const MIN_SLOW_FACTOR: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl Hazard {
    /// New well above the field at a random x, kept half a diameter away from both walls.
    pub fn spawn(field_width: f32, rng: &mut Rng) -> Self {
        let span = (field_width - DIAMETER).max(0.0);
        Self {
            x: rng.next_f32() * span + DIAMETER / 2.0,
            y: SPAWN_Y,
            rotation: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.y += FALL_PX_PER_SEC * dt;
        self.rotation += SPIN_RAD_PER_SEC * dt;
    }

    pub fn is_off_screen(&self, field_height: f32) -> bool {
        self.y > field_height + 200.0
    }

    /// Multiplier for movement at `(x, y)`: 0.2 at the centre rising linearly to 1.0 at the edge
    /// of the influence radius, 1.0 beyond it.
    pub fn slow_factor(&self, x: f32, y: f32) -> f32 {
        let distance = (self.x - x).hypot(self.y - y);
        if distance < INFLUENCE_RADIUS {
            MIN_SLOW_FACTOR + (1.0 - MIN_SLOW_FACTOR) * (distance / INFLUENCE_RADIUS)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_factor_interpolates_inside_radius() {
        let h = Hazard { x: 0.0, y: 0.0, rotation: 0.0 };
        assert!((h.slow_factor(0.0, 0.0) - 0.2).abs() < 1e-6);
        assert!((h.slow_factor(75.0, 0.0) - 0.6).abs() < 1e-6);
        assert_eq!(h.slow_factor(150.0, 0.0), 1.0);
        assert_eq!(h.slow_factor(0.0, 400.0), 1.0);
    }

    #[test]
    fn spawns_inside_padded_span() {
        let mut rng = Rng::new(3);
        for _ in 0..200 {
            let h = Hazard::spawn(480.0, &mut rng);
            assert!(h.x >= 75.0 && h.x < 405.0);
            assert_eq!(h.y, SPAWN_Y);
        }
    }

    #[test]
    fn drifts_down_and_leaves() {
        let mut h = Hazard { x: 100.0, y: 0.0, rotation: 0.0 };
        h.update(10.0);
        assert_eq!(h.y, 180.0);
        assert!(h.rotation > 0.0);
        assert!(!h.is_off_screen(720.0));
        h.y = 921.0;
        assert!(h.is_off_screen(720.0));
    }
}
