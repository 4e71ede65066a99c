//! The ship at the bottom of the field and the projectiles it fires.

use crate::hazard::Hazard;

pub const PLAYER_WIDTH: f32 = 60.0;
pub const PLAYER_HEIGHT: f32 = 60.0;
/// Gap between the ship and the bottom wall.
const BOTTOM_MARGIN: f32 = 10.0;
/// Pixels per frame at 60 fps.
const SPEED_PER_FRAME: f32 = 2.0;

pub const PROJECTILE_WIDTH: f32 = 4.0;
pub const PROJECTILE_HEIGHT: f32 = 10.0;
const PROJECTILE_PX_PER_SEC: f32 = 600.0;

#[derive(Debug, Clone)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub moving_left: bool,
    pub moving_right: bool,
    field_width: f32,
}

impl Player {
    pub fn new(field_width: f32, field_height: f32) -> Self {
        Self {
            x: field_width / 2.0 - PLAYER_WIDTH / 2.0,
            y: field_height - PLAYER_HEIGHT - BOTTOM_MARGIN,
            moving_left: false,
            moving_right: false,
            field_width,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + PLAYER_WIDTH / 2.0, self.y + PLAYER_HEIGHT / 2.0)
    }

    pub fn recenter(&mut self) {
        self.x = self.field_width / 2.0 - PLAYER_WIDTH / 2.0;
        self.moving_left = false;
        self.moving_right = false;
    }

    /// Move by the held intents, slowed near `hazard`, clamped to the field.
    pub fn update(&mut self, dt: f32, hazard: Option<&Hazard>) {
        let mut distance = SPEED_PER_FRAME * 60.0 * dt;
        if let Some(h) = hazard {
            let (cx, cy) = self.center();
            distance *= h.slow_factor(cx, cy);
        }
        let max_x = self.field_width - PLAYER_WIDTH;
        if self.moving_left && self.x > 0.0 {
            self.x = (self.x - distance).max(0.0);
        }
        if self.moving_right && self.x < max_x {
            self.x = (self.x + distance).min(max_x);
        }
    }

    /// Projectile leaving the nose of the ship.
    pub fn fire(&self) -> Projectile {
        Projectile::new(self.x + PLAYER_WIDTH / 2.0 - PROJECTILE_WIDTH / 2.0, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    /// `y` before the last move; collision covers the whole span in between.
    pub prev_y: f32,
    pub alive: bool,
}

impl Projectile {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            prev_y: y,
            alive: true,
        }
    }

    /// Vertical span `(top, bottom)` covered since the previous collision pass.
    pub fn swept(&self) -> (f32, f32) {
        (self.y.min(self.prev_y), self.y.max(self.prev_y))
    }

    pub fn update(&mut self, dt: f32) {
        self.prev_y = self.y;
        self.y -= PROJECTILE_PX_PER_SEC * dt;
        if self.y + PROJECTILE_HEIGHT < 0.0 {
            self.alive = false;
        }
    }
}
