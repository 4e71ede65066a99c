//! Layout and drawing for every mode. The field is painted on a grid of 20 px sub-cells and
//! blitted with half-blocks (▀), so one 40 px block is two columns by one row.

use crate::game::{Game, Mode, RankChange, Speed, TransitionPhase};
use crate::highscores::ScoreEntry;
use crate::music::MusicDeck;
use crate::player::{PLAYER_HEIGHT, PLAYER_WIDTH, PROJECTILE_HEIGHT, PROJECTILE_WIDTH};
use crate::shape::BLOCK_SIZE;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Field pixels per sub-cell, both axes.
const SUB_PX: f32 = BLOCK_SIZE / 2.0;
const SIDEBAR_WIDTH: u16 = 26;
/// How long the field takes to fade out after a loss.
const LOSS_FADE_MS: u32 = 900;
const POPUP_SECS: f32 = 1.2;
const POPUP_RISE_PX_PER_SEC: f32 = 40.0;
const CONFETTI: usize = 48;
/// Leaderboard rows on the start screen.
const BOARD_ROWS: usize = 10;

/// Floating "+points" label where a cluster cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePopup {
    pub x: f32,
    pub y: f32,
    pub points: u32,
    pub age: f32,
}

impl ScorePopup {
    pub fn new(x: f32, y: f32, points: u32) -> Self {
        Self {
            x,
            y,
            points,
            age: 0.0,
        }
    }
}

pub fn tick_popups(popups: &mut Vec<ScorePopup>, dt: f32) {
    popups.retain_mut(|p| {
        p.age += dt;
        p.y -= POPUP_RISE_PX_PER_SEC * dt;
        p.age < POPUP_SECS
    });
}

/// Everything the renderer reads for one frame.
pub struct View<'a> {
    pub game: &'a Game,
    pub theme: &'a Theme,
    pub music: &'a MusicDeck,
    pub name: &'a str,
    pub popups: &'a [ScorePopup],
    /// Seconds since the app started; drives idle animation.
    pub clock: f32,
    pub animate: bool,
}

/// tachyonfx state carried between frames.
#[derive(Default)]
pub struct Effects {
    loss_fade: Option<Effect>,
    last_frame: Option<Instant>,
}

/// Terminal size (columns, rows) the field plus sidebar needs.
pub fn required_size(game: &Game) -> (u16, u16) {
    let (w, h) = board_size(game);
    (w + 2 + SIDEBAR_WIDTH, h + 2)
}

fn board_size(game: &Game) -> (u16, u16) {
    let (w, h) = game.field_size();
    ((w / SUB_PX) as u16, (h / BLOCK_SIZE) as u16)
}

pub fn draw(frame: &mut Frame, view: &View, effects: &mut Effects, now: Instant) {
    let area = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(view.theme.bg)),
        area,
    );
    let (need_w, need_h) = required_size(view.game);
    if area.width < need_w || area.height < need_h {
        draw_too_small(frame, view.theme, area, need_w, need_h);
        return;
    }

    let delta = effects
        .last_frame
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or_default();
    effects.last_frame = Some(now);

    match view.game.mode() {
        Mode::Start => draw_start(frame, view, area),
        Mode::Instructions => draw_instructions(frame, view.theme, area),
        Mode::Playing | Mode::LevelTransition(_) | Mode::EnterName => {
            let board = draw_game(frame, view, area);
            if view.game.is_lost() && view.animate {
                apply_loss_fade(frame, view, board, effects, delta);
            } else {
                effects.loss_fade = None;
            }
            if view.game.mode() == Mode::EnterName {
                draw_name_entry(frame, view, area);
            }
        }
        Mode::Celebration => draw_celebration(frame, view, area),
        Mode::GameOver => {
            effects.loss_fade = None;
            draw_game(frame, view, area);
            draw_game_over(frame, view, area);
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn popup_block<'a>(theme: &Theme, title: &'a str) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border).bg(theme.bg))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(
            title,
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        ))
}

fn render_popup(frame: &mut Frame, theme: &Theme, rect: Rect, title: &str, lines: Vec<Line>) {
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(popup_block(theme, title)),
        rect,
    );
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect, w: u16, h: u16) {
    let lines = vec![
        Line::from(Span::styled("Terminal too small", Style::default().fg(theme.title))),
        Line::from(Span::styled(
            format!("need {w}x{h}, have {}x{}", area.width, area.height),
            Style::default().fg(theme.text),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        centered(area, area.width, 2),
    );
}

fn title_line(theme: &Theme) -> Line<'static> {
    let colors = theme.shapes;
    Line::from(
        "QUARTH"
            .chars()
            .enumerate()
            .map(|(i, c)| {
                Span::styled(
                    format!("{c} "),
                    Style::default()
                        .fg(colors[i % colors.len()])
                        .add_modifier(Modifier::BOLD),
                )
            })
            .collect::<Vec<_>>(),
    )
}

fn leaderboard_lines<'a>(theme: &Theme, entries: &'a [ScoreEntry]) -> Vec<Line<'a>> {
    (0..BOARD_ROWS)
        .map(|i| {
            let (name, score) = entries
                .get(i)
                .map_or(("---", 0), |e| (e.name.as_str(), e.score));
            let style = if i == 0 && !entries.is_empty() {
                Style::default().fg(theme.title)
            } else {
                Style::default().fg(theme.text)
            };
            Line::from(Span::styled(
                format!("{:02} {name:<6} {score:>8}", i + 1),
                style,
            ))
        })
        .collect()
}

fn draw_start(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    // Blink the prompt at 1 Hz.
    let prompt = if !view.animate || view.clock.fract() < 0.6 {
        Style::default().fg(theme.text)
    } else {
        Style::default().fg(theme.bg)
    };
    let mut lines = vec![
        Line::from(""),
        title_line(theme),
        Line::from(""),
        Line::from(Span::styled("Press any key to start", prompt)),
        Line::from(Span::styled(
            "I  instructions    Q  quit",
            Style::default().fg(theme.dim),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "HIGH SCORES",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(leaderboard_lines(theme, view.game.leaderboard()));
    let rect = centered(area, 40, lines.len() as u16 + 3);
    render_popup(frame, theme, rect, " quarthtui ", lines);
}

fn draw_instructions(frame: &mut Frame, theme: &Theme, area: Rect) {
    let head = Style::default().fg(theme.title).add_modifier(Modifier::BOLD);
    let text = Style::default().fg(theme.text);
    let row = |k: &'static str, v: &'static str| {
        Line::from(vec![
            Span::styled(format!("{k:>12}  "), Style::default().fg(theme.accent)),
            Span::styled(v, text),
        ])
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("HOW TO PLAY", head)),
        Line::from(""),
        Line::from(Span::styled("Blocks fall toward your ship.", text)),
        Line::from(Span::styled("Shots stick under the column they hit.", text)),
        Line::from(Span::styled("Fill a block into a solid rectangle", text)),
        Line::from(Span::styled("to clear it: rows x cols x 100 points.", text)),
        Line::from(Span::styled("Gravity wells slow your ship down.", text)),
        Line::from(""),
        Line::from(Span::styled("CONTROLS", head)),
        Line::from(""),
        row("Left/Right", "move (h/l, a/d)"),
        row("Space", "fire"),
        row("Up (hold)", "fast forward, bonus points"),
        row("Down (hold)", "slow motion, costs points"),
        row("Q / Esc", "quit"),
        Line::from(""),
        Line::from(Span::styled("Press any key", Style::default().fg(theme.dim))),
    ];
    let rect = centered(area, 46, lines.len() as u16 + 2);
    render_popup(frame, theme, rect, " Instructions ", lines);
}

/// Draws field and sidebar; returns the board rect (inside the border).
fn draw_game(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let (bw, bh) = board_size(view.game);
    let (total_w, total_h) = required_size(view.game);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw + 2), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(view.theme.border).bg(view.theme.bg))
        .title(Span::styled(
            format!(" Level {} ", view.game.session().level()),
            Style::default().fg(view.theme.title),
        ));
    let board = block.inner(inner[0]);
    frame.render_widget(block, inner[0]);
    let board = Rect {
        width: bw.min(board.width),
        height: bh.min(board.height),
        ..board
    };

    draw_field(frame, view, board);
    draw_sidebar(frame, view, inner[1]);
    board
}

/// Colours painted on 20 px sub-cells before they are folded into half-block glyphs.
struct Canvas {
    cols: usize,
    rows: usize,
    cells: Vec<Option<Color>>,
}

impl Canvas {
    fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![None; cols * rows],
        }
    }

    fn paint(&mut self, col: i32, row: i32, color: Color) {
        if col >= 0 && row >= 0 && (col as usize) < self.cols && (row as usize) < self.rows {
            self.cells[row as usize * self.cols + col as usize] = Some(color);
        }
    }

    /// Paint every sub-cell whose centre lies inside the pixel rect.
    fn fill_px(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Color) {
        let first_col = ((x0 / SUB_PX) - 0.5).ceil() as i32;
        let first_row = ((y0 / SUB_PX) - 0.5).ceil() as i32;
        let mut row = first_row;
        while (row as f32 + 0.5) * SUB_PX < y1 {
            let mut col = first_col;
            while (col as f32 + 0.5) * SUB_PX < x1 {
                self.paint(col, row, color);
                col += 1;
            }
            row += 1;
        }
    }

    fn point(&mut self, x: f32, y: f32, color: Color) {
        self.paint((x / SUB_PX).floor() as i32, (y / SUB_PX).floor() as i32, color);
    }

    fn blit(&self, frame: &mut Frame, board: Rect, bg: Color) {
        let buf = frame.buffer_mut();
        for ty in 0..board.height {
            for tx in 0..board.width {
                let (col, row) = (tx as usize, ty as usize * 2);
                if col >= self.cols || row >= self.rows {
                    continue;
                }
                let at = |r: usize| {
                    if r < self.rows {
                        self.cells[r * self.cols + col].unwrap_or(bg)
                    } else {
                        bg
                    }
                };
                buf[(board.x + tx, board.y + ty)]
                    .set_symbol("▀")
                    .set_style(Style::default().fg(at(row)).bg(at(row + 1)));
            }
        }
    }
}

/// Linear blend from `a` to `b`; non-RGB colours snap at the midpoint.
fn blend(a: Color, b: Color, t: f32) -> Color {
    match (a, b) {
        (Color::Rgb(ar, ag, ab), Color::Rgb(br, bg, bb)) => {
            let mix = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * t).round() as u8;
            Color::Rgb(mix(ar, br), mix(ag, bg), mix(ab, bb))
        }
        _ if t < 0.5 => a,
        _ => b,
    }
}

fn draw_field(frame: &mut Frame, view: &View, board: Rect) {
    let game = view.game;
    let theme = view.theme;
    let mut canvas = Canvas::new(board.width as usize, board.height as usize * 2);

    if let Some(h) = game.hazard() {
        paint_hazard(&mut canvas, theme, h.x, h.y, h.rotation);
    }

    for shape in game.grid().shapes() {
        let base = theme.shape_color(shape.color);
        for r in 0..shape.rows() {
            for c in 0..shape.cols() {
                if !shape.is_filled(r, c) {
                    continue;
                }
                let scale = shape.scale(r, c);
                if scale <= 0.0 {
                    continue;
                }
                let color = if shape.is_clearing() {
                    blend(theme.bg, blend(base, Color::Rgb(0xFF, 0xFF, 0xFF), 1.0 - scale), scale)
                } else {
                    base
                };
                let half = BLOCK_SIZE * scale / 2.0;
                let cx = shape.left_px() + (c as f32 + 0.5) * BLOCK_SIZE;
                let cy = shape.y + (r as f32 + 0.5) * BLOCK_SIZE;
                canvas.fill_px(cx - half, cy - half, cx + half, cy + half, color);
            }
        }
    }

    for p in game.projectiles() {
        canvas.point(p.x + PROJECTILE_WIDTH / 2.0, p.y + PROJECTILE_HEIGHT / 2.0, theme.projectile);
    }

    let ship = game.player();
    let (x, y) = (ship.x, ship.y);
    let third = PLAYER_WIDTH / 3.0;
    let ship_color = if game.is_lost() { theme.dim } else { theme.ship };
    canvas.fill_px(x + third, y, x + 2.0 * third, y + third, ship_color);
    canvas.fill_px(x, y + third, x + PLAYER_WIDTH, y + 2.0 * third, ship_color);
    canvas.fill_px(x, y + 2.0 * third, x + third, y + PLAYER_HEIGHT, ship_color);
    canvas.fill_px(x + 2.0 * third, y + 2.0 * third, x + PLAYER_WIDTH, y + PLAYER_HEIGHT, ship_color);

    canvas.blit(frame, board, theme.bg);

    let buf = frame.buffer_mut();
    for popup in view.popups {
        let label = format!("+{}", popup.points);
        let col = (popup.x / SUB_PX) as i32 - label.len() as i32 / 2;
        let row = (popup.y / BLOCK_SIZE) as i32;
        if row >= 0 && (row as u16) < board.height && col >= 0 {
            let col = (col as u16).min(board.width.saturating_sub(label.len() as u16));
            buf.set_string(
                board.x + col,
                board.y + row as u16,
                label,
                Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
            );
        }
    }

    if game.mode() == Mode::LevelTransition(TransitionPhase::TextDrop) {
        let text = format!("LEVEL {}", game.session().level() + 1);
        let row = (game.session().text_y() / BLOCK_SIZE).floor() as i32;
        if row >= 0 && (row as u16) < board.height {
            let col = board.width.saturating_sub(text.len() as u16) / 2;
            buf.set_string(
                board.x + col,
                board.y + row as u16,
                text,
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            );
        }
    }
}

fn paint_hazard(canvas: &mut Canvas, theme: &Theme, hx: f32, hy: f32, rotation: f32) {
    let radius = crate::hazard::DIAMETER / 2.0;
    let (c0, c1) = (((hx - radius) / SUB_PX) as i32 - 1, ((hx + radius) / SUB_PX) as i32 + 1);
    let (r0, r1) = (((hy - radius) / SUB_PX) as i32 - 1, ((hy + radius) / SUB_PX) as i32 + 1);
    for row in r0..=r1 {
        for col in c0..=c1 {
            let dx = (col as f32 + 0.5) * SUB_PX - hx;
            let dy = (row as f32 + 0.5) * SUB_PX - hy;
            let d = dx.hypot(dy);
            if d > radius {
                continue;
            }
            // Two spiral arms turning with the well.
            let arm = (2.0 * (dy.atan2(dx) - rotation * 20.0) + d / 20.0).sin();
            let color = if d < SUB_PX {
                Color::Rgb(0, 0, 0)
            } else if arm > 0.3 {
                blend(theme.bg, theme.hazard, 1.0 - d / radius * 0.5)
            } else {
                blend(theme.bg, theme.hazard, 0.3)
            };
            canvas.paint(col, row, color);
        }
    }
}

fn apply_loss_fade(
    frame: &mut Frame,
    view: &View,
    board: Rect,
    effects: &mut Effects,
    delta: std::time::Duration,
) {
    if effects.loss_fade.is_none() {
        let ship = view.game.player();
        let ship_cols = (ship.x / SUB_PX) as u16..((ship.x + PLAYER_WIDTH) / SUB_PX) as u16 + 1;
        let ship_rows = (ship.y / BLOCK_SIZE) as u16..((ship.y + PLAYER_HEIGHT) / BLOCK_SIZE) as u16 + 1;
        let ship_cells: HashSet<(u16, u16)> = ship_rows
            .flat_map(|r| ship_cols.clone().map(move |c| (board.x + c, board.y + r)))
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            !ship_cells.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_to(
            view.theme.dim,
            view.theme.bg,
            (LOSS_FADE_MS, Interpolation::Linear),
        )
        .with_filter(filter)
        .with_area(board);
        effects.loss_fade = Some(effect);
    }
    if let Some(effect) = &mut effects.loss_fade {
        let ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
        frame.render_effect(effect, board, TfxDuration::from_millis(ms));
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let game = view.game;
    let theme = view.theme;
    let label = Style::default().fg(theme.title);
    let value = Style::default().fg(theme.text);
    let border = Style::default().fg(theme.border).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Fill(1),
        ])
        .split(area);

    let session = game.session();
    let secs = game.level_time_left().ceil() as u32;
    let stats = vec![
        Line::from(vec![
            Span::styled("Score  ", label),
            Span::styled(session.score().to_string(), value),
        ]),
        Line::from(vec![
            Span::styled("Level  ", label),
            Span::styled(session.level().to_string(), value),
        ]),
        Line::from(vec![
            Span::styled("Next   ", label),
            Span::styled(format!("{:02}:{:02}", secs / 60, secs % 60), value),
        ]),
        Line::from(vec![
            Span::styled("Best   ", label),
            Span::styled(
                game.leaderboard()
                    .first()
                    .map_or_else(|| "-".to_string(), |e| format!("{} {}", e.name, e.score)),
                value,
            ),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(stats)).block(Block::default().borders(Borders::ALL).border_style(border)),
        chunks[0],
    );

    let clearing = game.grid().is_clearing();
    let (speed_text, speed_color) = match session.speed() {
        Speed::Normal => ("■ normal", theme.text),
        Speed::Fast => ("▲ fast  +pts", theme.shapes[3]),
        Speed::Slow => ("▼ slow  -pts", theme.shapes[4]),
    };
    let speed_style = if clearing && session.speed() != Speed::Normal {
        Style::default().fg(theme.dim)
    } else {
        Style::default().fg(speed_color)
    };
    let mut status = vec![Line::from(Span::styled(speed_text, speed_style))];
    if game.hazard().is_some() {
        status.push(Line::from(Span::styled(
            "◉ gravity well",
            Style::default().fg(theme.hazard),
        )));
    }
    frame.render_widget(
        Paragraph::new(status).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(" Speed ", label)),
        ),
        chunks[1],
    );

    let music_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(" Music ", label));
    let music_inner = music_block.inner(chunks[2]);
    frame.render_widget(music_block, chunks[2]);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(music_inner);
    let track = view.music.now_playing().map_or_else(
        || "—".to_string(),
        |t| format!("♪ {:02}{}", t.level, t.variation),
    );
    frame.render_widget(Paragraph::new(Span::styled(track, value)), rows[0]);
    let ratio = f64::from(view.music.volume() / crate::music::VOLUME).clamp(0.0, 1.0);
    let gauge_color = if view.music.is_fading() { theme.title } else { theme.accent };
    frame.render_widget(
        Gauge::default()
            .ratio(if view.music.now_playing().is_some() { ratio } else { 0.0 })
            .label("")
            .gauge_style(Style::default().fg(gauge_color).bg(theme.bg)),
        rows[1],
    );

    let help = vec![
        Line::from(Span::styled("←/→  move", Style::default().fg(theme.dim))),
        Line::from(Span::styled("Spc  fire", Style::default().fg(theme.dim))),
        Line::from(Span::styled("↑/↓  speed", Style::default().fg(theme.dim))),
        Line::from(Span::styled("Q    quit", Style::default().fg(theme.dim))),
    ];
    frame.render_widget(
        Paragraph::new(help).block(Block::default().borders(Borders::ALL).border_style(border)),
        chunks[3],
    );
}

fn draw_name_entry(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let max = crate::highscores::MAX_NAME_LEN;
    let typed = format!("{:_<max$}", view.name);
    let status = if view.game.is_submitting() {
        Span::styled("saving...", Style::default().fg(theme.dim))
    } else {
        Span::styled("Enter to save", Style::default().fg(theme.dim))
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "GAME OVER",
            Style::default().fg(theme.shapes[4]).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Score: {}", view.game.session().score()),
            Style::default().fg(theme.text),
        )),
        Line::from(""),
        Line::from(Span::styled("Your name", Style::default().fg(theme.title))),
        Line::from(Span::styled(
            typed,
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(status),
    ];
    let rect = centered(area, 30, lines.len() as u16 + 2);
    render_popup(frame, theme, rect, " Game Over ", lines);
}

fn draw_celebration(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    if view.animate {
        draw_confetti(frame, theme, area, view.clock);
    }
    let Some(celebration) = view.game.celebration() else {
        return;
    };
    let subtitle = match celebration.rank {
        RankChange::Climbed { rank } => format!("You climbed to #{rank}!"),
        RankChange::PersonalBest => "You beat your personal best!".to_string(),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "NEW RECORD!",
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("{}  {}", celebration.name, view.game.session().score()),
            Style::default().fg(theme.text),
        )),
        Line::from(Span::styled(subtitle, Style::default().fg(theme.accent))),
        Line::from(""),
    ];
    let rect = centered(area, 34, lines.len() as u16 + 2);
    render_popup(frame, theme, rect, " Congratulations ", lines);
}

/// Falling specks, positions derived from the clock so no state is needed.
fn draw_confetti(frame: &mut Frame, theme: &Theme, area: Rect, clock: f32) {
    const GLYPHS: [&str; 4] = ["*", "+", "•", "·"];
    let buf = frame.buffer_mut();
    for i in 0..CONFETTI {
        let h = (i as u32).wrapping_mul(2_654_435_761);
        let x = area.x + (h % u32::from(area.width.max(1))) as u16;
        let speed = 3.0 + (h >> 8) as f32 % 6.0;
        let phase = (h >> 16) as f32 % f32::from(area.height.max(1));
        let y = area.y + ((phase + clock * speed) % f32::from(area.height.max(1))) as u16;
        buf.set_string(
            x,
            y,
            GLYPHS[i % GLYPHS.len()],
            Style::default().fg(theme.shape_color(i as u8)).bg(theme.bg),
        );
    }
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "GAME OVER",
            Style::default().fg(theme.shapes[4]).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Score: {}", view.game.session().score()),
            Style::default().fg(theme.text),
        )),
        Line::from(Span::styled(
            format!("Level: {}", view.game.session().level()),
            Style::default().fg(theme.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Any key  restart    Q  quit",
            Style::default().fg(theme.dim),
        )),
        Line::from(""),
    ];
    let rect = centered(area, 34, lines.len() as u16 + 2);
    render_popup(frame, theme, rect, " quarthtui ", lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_covers_whole_block() {
        let mut c = Canvas::new(24, 36);
        c.fill_px(40.0, 40.0, 80.0, 80.0, Color::Red);
        let painted: Vec<_> = (0..c.cells.len())
            .filter(|&i| c.cells[i].is_some())
            .map(|i| (i % c.cols, i / c.cols))
            .collect();
        assert_eq!(painted, vec![(2, 2), (3, 2), (2, 3), (3, 3)]);
    }

    #[test]
    fn shrunk_cells_vanish_below_half_scale() {
        let mut c = Canvas::new(4, 4);
        c.fill_px(32.0, 32.0, 48.0, 48.0, Color::Red);
        assert!(c.cells.iter().all(Option::is_none));
    }

    #[test]
    fn blend_interpolates_rgb() {
        assert_eq!(
            blend(Color::Rgb(0, 0, 0), Color::Rgb(200, 100, 50), 0.5),
            Color::Rgb(100, 50, 25)
        );
        assert_eq!(blend(Color::Red, Color::Blue, 0.2), Color::Red);
    }

    #[test]
    fn popups_rise_and_expire() {
        let mut popups = vec![ScorePopup::new(100.0, 300.0, 900)];
        tick_popups(&mut popups, 0.5);
        assert_eq!(popups[0].y, 280.0);
        tick_popups(&mut popups, 1.0);
        assert!(popups.is_empty());
    }
}
