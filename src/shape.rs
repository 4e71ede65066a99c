//! Falling clusters: occupancy layout, growth from below, rectangle detection and spiral clear.

use std::collections::VecDeque;

/// Edge length of one cell in field pixels.
pub const BLOCK_SIZE: f32 = 40.0;

/// Seconds between two queued cells starting to shrink (10 frames at 60 fps).
const CLEAR_STEP_SECS: f32 = 10.0 / 60.0;

/// Scale lost per second by a shrinking cell (0.05 per frame at 60 fps).
const SHRINK_PER_SEC: f32 = 3.0;

/// Number of colour slots a cluster may use (see `Theme::shape_color`).
pub const SHAPE_COLORS: u8 = 6;

/// Spawnable templates. None is a complete rectangle and every hole is reachable from below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTemplate {
    LargeLRight,
    LargeLLeft,
    Podium,
    StepsRight,
    StepsLeft,
    UShape,
    Comb,
    BigT,
}

impl ShapeTemplate {
    pub const ALL: [Self; 8] = [
        Self::LargeLRight,
        Self::LargeLLeft,
        Self::Podium,
        Self::StepsRight,
        Self::StepsLeft,
        Self::UShape,
        Self::Comb,
        Self::BigT,
    ];

    /// Rows of the layout, top first; 1 = filled.
    pub fn layout(&self) -> &'static [&'static [u8]] {
        match self {
            Self::LargeLRight => &[&[1, 1, 1], &[1, 0, 0], &[1, 0, 0]],
            Self::LargeLLeft => &[&[1, 1, 1], &[0, 0, 1], &[0, 0, 1]],
            Self::Podium => &[&[1, 1, 1], &[0, 1, 0], &[0, 1, 0]],
            Self::StepsRight => &[&[1, 1, 1, 1], &[1, 1, 1, 0], &[1, 1, 0, 0], &[1, 0, 0, 0]],
            Self::StepsLeft => &[&[1, 1, 1, 1], &[0, 1, 1, 1], &[0, 0, 1, 1], &[0, 0, 0, 1]],
            Self::UShape => &[&[1, 1, 1, 1], &[1, 0, 0, 1], &[1, 0, 0, 1]],
            Self::Comb => &[&[1, 1, 1, 1, 1], &[1, 0, 1, 0, 1], &[1, 0, 1, 0, 1]],
            Self::BigT => &[
                &[1, 1, 1, 1, 1],
                &[0, 0, 1, 0, 0],
                &[0, 0, 1, 0, 0],
                &[0, 0, 1, 0, 0],
            ],
        }
    }

    pub fn cols(&self) -> usize {
        self.layout()[0].len()
    }

    pub fn rows(&self) -> usize {
        self.layout().len()
    }

    pub fn to_layout(&self) -> Vec<Vec<bool>> {
        self.layout()
            .iter()
            .map(|row| row.iter().map(|&c| c == 1).collect())
            .collect()
    }
}

/// A falling cluster. `column` is a grid column, `y` the pixel y of the top edge.
#[derive(Debug, Clone)]
pub struct Shape {
    pub column: i32,
    pub y: f32,
    pub color: u8,
    layout: Vec<Vec<bool>>,
    /// Per-cell draw scale, 1.0 = full size.
    scales: Vec<Vec<f32>>,
    shrinking: Vec<Vec<bool>>,
    clearing: bool,
    clear_queue: VecDeque<(usize, usize)>,
    clear_timer: f32,
    alive: bool,
}

impl Shape {
    /// `layout` must be non-empty and rectangular.
    pub fn new(column: i32, y: f32, layout: Vec<Vec<bool>>, color: u8) -> Self {
        debug_assert!(!layout.is_empty() && !layout[0].is_empty());
        debug_assert!(layout.iter().all(|r| r.len() == layout[0].len()));
        let (rows, cols) = (layout.len(), layout[0].len());
        Self {
            column,
            y,
            color,
            layout,
            scales: vec![vec![1.0; cols]; rows],
            shrinking: vec![vec![false; cols]; rows],
            clearing: false,
            clear_queue: VecDeque::new(),
            clear_timer: 0.0,
            alive: true,
        }
    }

    pub fn from_template(template: ShapeTemplate, column: i32, y: f32, color: u8) -> Self {
        Self::new(column, y, template.to_layout(), color)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.layout[0].len()
    }

    #[inline]
    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.layout
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    #[inline]
    pub fn scale(&self, row: usize, col: usize) -> f32 {
        self.scales[row][col]
    }

    pub fn is_clearing(&self) -> bool {
        self.clearing
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn left_px(&self) -> f32 {
        self.column as f32 * BLOCK_SIZE
    }

    pub fn right_px(&self) -> f32 {
        (self.column + self.cols() as i32) as f32 * BLOCK_SIZE
    }

    pub fn bottom_y(&self) -> f32 {
        self.y + self.rows() as f32 * BLOCK_SIZE
    }

    /// Lowest filled row of `col`, scanning from the bottom.
    pub fn lowest_filled_row(&self, col: usize) -> Option<usize> {
        (0..self.rows()).rev().find(|&r| self.is_filled(r, col))
    }

    /// Fill a cell, appending empty rows first when `row` lies below the current bottom.
    pub fn add_cell(&mut self, row: usize, col: usize) {
        if col >= self.cols() {
            return;
        }
        let cols = self.cols();
        while row >= self.rows() {
            self.layout.push(vec![false; cols]);
            self.scales.push(vec![1.0; cols]);
            self.shrinking.push(vec![false; cols]);
        }
        self.layout[row][col] = true;
    }

    /// Every cell of the bounding layout is filled.
    pub fn is_rectangle_complete(&self) -> bool {
        self.layout.iter().all(|row| row.iter().all(|&c| c))
    }

    pub fn start_clear_animation(&mut self) {
        self.clearing = true;
        self.clear_timer = 0.0;
        self.clear_queue = self.spiral_order().into();
    }

    /// Filled cells peeled ring by ring: top row, right column, bottom row, left column.
    pub fn spiral_order(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let (mut top, mut bottom) = (0i32, self.rows() as i32 - 1);
        let (mut left, mut right) = (0i32, self.cols() as i32 - 1);
        let mut side = 0u8;
        let visit = |r: i32, c: i32, out: &mut Vec<(usize, usize)>| {
            if self.is_filled(r as usize, c as usize) {
                out.push((r as usize, c as usize));
            }
        };
        while top <= bottom && left <= right {
            match side {
                0 => {
                    for c in left..=right {
                        visit(top, c, &mut out);
                    }
                    top += 1;
                }
                1 => {
                    for r in top..=bottom {
                        visit(r, right, &mut out);
                    }
                    right -= 1;
                }
                2 => {
                    for c in (left..=right).rev() {
                        visit(bottom, c, &mut out);
                    }
                    bottom -= 1;
                }
                _ => {
                    for r in (top..=bottom).rev() {
                        visit(r, left, &mut out);
                    }
                    left += 1;
                }
            }
            side = (side + 1) % 4;
        }
        out
    }

    /// Falls by `fall_distance` while intact; while clearing, advances the shrink animation by `dt`
    /// seconds instead. Returns how many cells started shrinking this step.
    pub fn update(&mut self, fall_distance: f32, dt: f32) -> usize {
        if !self.clearing {
            self.y += fall_distance;
            return 0;
        }

        let mut started = 0;
        self.clear_timer += dt;
        while self.clear_timer >= CLEAR_STEP_SECS {
            self.clear_timer -= CLEAR_STEP_SECS;
            if let Some((r, c)) = self.clear_queue.pop_front() {
                self.shrinking[r][c] = true;
                started += 1;
            }
        }

        let mut all_gone = true;
        for r in 0..self.rows() {
            for c in 0..self.cols() {
                if !self.layout[r][c] {
                    continue;
                }
                if self.shrinking[r][c] {
                    self.scales[r][c] = (self.scales[r][c] - SHRINK_PER_SEC * dt).max(0.0);
                }
                if self.scales[r][c] > 0.0 {
                    all_gone = false;
                }
            }
        }

        if all_gone && self.clear_queue.is_empty() {
            self.alive = false;
            self.clearing = false;
        }
        started
    }
}
