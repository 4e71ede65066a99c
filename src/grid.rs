//! Grid engine: spawns clusters, lets them fall, resolves projectile hits and detects loss.

use crate::game::Mode;
use crate::player::Projectile;
use crate::rng::Rng;
use crate::shape::{BLOCK_SIZE, SHAPE_COLORS, Shape, ShapeTemplate};
use tracing::{debug, info};

/// Seconds between spawns while playing.
const SPAWN_INTERVAL_SECS: f32 = 2.0;
/// Placement tries before a spawn is skipped for this interval.
pub const SPAWN_ATTEMPTS: usize = 10;
/// Narrowest field where the widest template still fits one cell away from both walls.
pub const MIN_COLUMNS: u16 = 7;
/// Pixel y of a freshly spawned cluster's top edge.
const SPAWN_Y: f32 = -100.0;
/// Points per cell of a completed rectangle.
pub const POINTS_PER_CELL: u32 = 100;

/// Fall speed in pixels per second before the speed multiplier.
pub fn base_speed(level: u32) -> f32 {
    20.0 + level.saturating_sub(1) as f32 * 5.0
}

/// What the grid needs from the session each tick.
#[derive(Debug, Clone, Copy)]
pub struct GridContext {
    pub dt: f32,
    pub mode: Mode,
    pub level: u32,
    pub speed_multiplier: f32,
    pub player_y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClearReport {
    pub column: i32,
    pub y: f32,
    pub rows: usize,
    pub cols: usize,
    pub color: u8,
    pub points: u32,
}

/// Outcome of one grid tick, consumed by the state machine.
#[derive(Debug, Clone, Default)]
pub struct GridReport {
    /// A cluster reached the ship's line.
    pub lost: bool,
    pub hits: usize,
    pub clears: Vec<ClearReport>,
    /// Cells that entered their shrink phase.
    pub cells_shrinking: usize,
}

impl GridReport {
    pub fn points(&self) -> u32 {
        self.clears.iter().map(|c| c.points).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Placed { attempts: usize },
    Skipped { attempts: usize },
}

#[derive(Debug, Clone)]
pub struct Grid {
    shapes: Vec<Shape>,
    spawn_timer: f32,
    field_columns: i32,
    field_height: f32,
}

impl Grid {
    pub fn new(field_columns: u16, field_height: f32) -> Self {
        Self {
            shapes: Vec::new(),
            spawn_timer: 0.0,
            field_columns: i32::from(field_columns),
            field_height,
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// True while any cluster runs its clear animation; global fall is suspended meanwhile.
    pub fn is_clearing(&self) -> bool {
        self.shapes.iter().any(Shape::is_clearing)
    }

    /// Pick a random template and colour and place it one cell away from both walls, without
    /// overlapping any cluster close to the spawn line. Gives up after `SPAWN_ATTEMPTS`.
    pub fn spawn_shape(&mut self, rng: &mut Rng) -> SpawnOutcome {
        let color = rng.below(usize::from(SHAPE_COLORS)) as u8;
        let mut attempts = 0;
        while attempts < SPAWN_ATTEMPTS {
            attempts += 1;
            let template = ShapeTemplate::ALL[rng.below(ShapeTemplate::ALL.len())];
            let cols = template.cols() as i32;
            let rows = template.rows();
            let max_col = self.field_columns - cols;
            if max_col < 2 {
                continue;
            }
            let column = rng.range(1, max_col);
            if self.overlaps_existing(column, cols, rows) {
                continue;
            }
            self.shapes
                .push(Shape::from_template(template, column, SPAWN_Y, color));
            return SpawnOutcome::Placed { attempts };
        }
        SpawnOutcome::Skipped { attempts }
    }

    fn overlaps_existing(&self, column: i32, cols: i32, rows: usize) -> bool {
        self.shapes.iter().any(|s| {
            let near = (s.y - SPAWN_Y).abs() < (s.rows() + rows) as f32 * BLOCK_SIZE;
            let left = s.column;
            let right = s.column + s.cols() as i32;
            near && column < right && column + cols > left
        })
    }

    pub fn update(
        &mut self,
        ctx: &GridContext,
        projectiles: &mut [Projectile],
        rng: &mut Rng,
    ) -> GridReport {
        let mut report = GridReport::default();

        if self.is_clearing() {
            for shape in self.shapes.iter_mut().filter(|s| s.is_clearing()) {
                report.cells_shrinking += shape.update(0.0, ctx.dt);
            }
        } else {
            self.spawn_timer += ctx.dt;
            if ctx.mode == Mode::Playing && self.spawn_timer > SPAWN_INTERVAL_SECS {
                self.spawn_timer = 0.0;
                if let SpawnOutcome::Skipped { attempts } = self.spawn_shape(rng) {
                    debug!(attempts, "no free spawn slot, skipping");
                }
            }
            let distance = base_speed(ctx.level) * ctx.speed_multiplier * ctx.dt;
            for shape in &mut self.shapes {
                shape.update(distance, ctx.dt);
            }
        }

        self.resolve_collisions(projectiles, &mut report);

        if self
            .shapes
            .iter()
            .any(|s| s.is_alive() && s.bottom_y() >= ctx.player_y)
        {
            report.lost = true;
            return report;
        }

        let height = self.field_height;
        self.shapes.retain(|s| s.y < height && s.is_alive());
        report
    }

    /// Each live projectile attaches a cell under the lowest filled cell of the column it is in,
    /// provided the path it flew since the last check reaches within one cell height below that
    /// cell. First matching cluster wins.
    fn resolve_collisions(&mut self, projectiles: &mut [Projectile], report: &mut GridReport) {
        for projectile in projectiles.iter_mut().rev().filter(|p| p.alive) {
            for shape in self
                .shapes
                .iter_mut()
                .filter(|s| s.is_alive() && !s.is_clearing())
            {
                if projectile.x < shape.left_px() || projectile.x >= shape.right_px() {
                    continue;
                }
                let col = ((projectile.x - shape.left_px()) / BLOCK_SIZE) as usize;
                let Some(row) = shape.lowest_filled_row(col) else {
                    continue;
                };
                let cell_bottom = shape.y + (row + 1) as f32 * BLOCK_SIZE;
                let (top, bottom) = projectile.swept();
                if top > cell_bottom || bottom <= cell_bottom - BLOCK_SIZE {
                    continue;
                }

                projectile.alive = false;
                report.hits += 1;
                shape.add_cell(row + 1, col);
                if shape.is_rectangle_complete() {
                    let points = (shape.rows() * shape.cols()) as u32 * POINTS_PER_CELL;
                    info!(rows = shape.rows(), cols = shape.cols(), points, "rectangle complete");
                    report.clears.push(ClearReport {
                        column: shape.column,
                        y: shape.y,
                        rows: shape.rows(),
                        cols: shape.cols(),
                        color: shape.color,
                        points,
                    });
                    shape.start_clear_animation();
                }
                break;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}
