//! App: terminal init, main loop, tick and key handling.

use crate::game::{Game, GameEvent, Mode};
use crate::highscores::{MAX_NAME_LEN, ScoreBoard, ScoreClient, ScoreReply};
use crate::input::{Action, Hold, key_to_action};
use crate::music::{MusicDeck, MusicLibrary};
use crate::rng::Rng;
use crate::shape::BLOCK_SIZE;
use crate::theme::Theme;
use crate::ui::{self, Effects, ScorePopup, View};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Without release events a held key counts as released once the OS stops repeating it:
/// first repeat arrives within this window...
const HOLD_FIRST_MS: u64 = 500;
/// ...and later repeats within this one.
const HOLD_REPEAT_MS: u64 = 100;
/// Longest simulated step; a stalled terminal must not teleport the field.
const MAX_DT_SECS: f32 = 0.25;

#[derive(Debug, Clone, Copy)]
struct HeldKey {
    hold: Hold,
    last_seen: Instant,
    repeated: bool,
}

pub struct App {
    args: Args,
    theme: Theme,
    game: Game,
    music: MusicDeck,
    scores: ScoreClient,
    name: String,
    popups: Vec<ScorePopup>,
    effects: Effects,
    held: Vec<HeldKey>,
    /// Set once the terminal is known to report key releases.
    release_events: bool,
    started: Instant,
    last_tick: Instant,
    quit: bool,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let path = args
            .scores_file
            .clone()
            .unwrap_or_else(crate::highscores::default_path);
        let board = ScoreBoard::open(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "score file unusable, scores kept in memory: {e}");
            ScoreBoard::detached()
        });
        let scores = ScoreClient::spawn(board)?;
        scores.request_top();

        let library = MusicLibrary::scan(args.music_dir.as_deref());
        let music_rng = config.seed.map_or_else(Rng::from_time, |s| Rng::new(s ^ 0x9E37_79B9));
        let now = Instant::now();
        Ok(Self {
            game: Game::new(&config),
            music: MusicDeck::new(library, music_rng),
            scores,
            args,
            theme,
            name: String::new(),
            popups: Vec::new(),
            effects: Effects::default(),
            held: Vec::new(),
            release_events: false,
            started: now,
            last_tick: now,
            quit: false,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held keys stop exactly; otherwise fall back to repeat timing.
        self.release_events = supports_keyboard_enhancement().unwrap_or(false);
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );
        info!(release_events = self.release_events, "terminal ready");

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.clamp(1.0, 240.0));
        while !self.quit {
            let now = Instant::now();
            let dt = now
                .saturating_duration_since(self.last_tick)
                .as_secs_f32()
                .min(MAX_DT_SECS);
            self.last_tick = now;

            self.release_stale_holds(now);
            self.game.tick(dt);
            self.music.update(dt);
            ui::tick_popups(&mut self.popups, dt);
            self.poll_scores();
            self.dispatch_events();

            let view = View {
                game: &self.game,
                theme: &self.theme,
                music: &self.music,
                name: &self.name,
                popups: &self.popups,
                clock: self.started.elapsed().as_secs_f32(),
                animate: !self.args.no_animation,
            };
            let effects = &mut self.effects;
            terminal.draw(|f| ui::draw(f, &view, effects, now))?;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        self.on_key(key);
                    }
                }
            }
        }
        info!(score = self.game.session().score(), "quit");
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release && !self.release_events {
            debug!("key release reported; hold timeout disabled");
            self.release_events = true;
        }
        let mode = self.game.mode();
        if matches!(mode, Mode::Playing | Mode::LevelTransition(_)) {
            self.track_hold(key);
        }
        match key_to_action(key, mode) {
            Action::Game(intent) => self.game.handle(intent),
            Action::Type(c) => {
                if self.name.chars().count() < MAX_NAME_LEN {
                    self.name.push(c);
                }
            }
            Action::Erase => {
                self.name.pop();
            }
            Action::Confirm => self
                .game
                .handle(crate::game::Intent::SubmitName(self.name.clone())),
            Action::Quit => self.quit = true,
            Action::None => {}
        }
    }

    fn track_hold(&mut self, key: KeyEvent) {
        let Some(hold) = Hold::of(key.code) else {
            return;
        };
        let now = Instant::now();
        match key.kind {
            KeyEventKind::Release => self.held.retain(|h| h.hold != hold),
            kind => match self.held.iter_mut().find(|h| h.hold == hold) {
                Some(h) => {
                    h.last_seen = now;
                    h.repeated |= kind == KeyEventKind::Repeat || !self.release_events;
                }
                None => self.held.push(HeldKey {
                    hold,
                    last_seen: now,
                    repeated: false,
                }),
            },
        }
    }

    /// Synthesizes releases for keys the OS stopped repeating.
    fn release_stale_holds(&mut self, now: Instant) {
        if self.release_events {
            return;
        }
        let mut released = Vec::new();
        self.held.retain(|h| {
            let window = if h.repeated { HOLD_REPEAT_MS } else { HOLD_FIRST_MS };
            let alive = now.saturating_duration_since(h.last_seen) < Duration::from_millis(window);
            if !alive {
                released.push(h.hold);
            }
            alive
        });
        for hold in released {
            self.game.handle(hold.intent(false));
        }
    }

    fn poll_scores(&mut self) {
        for reply in self.scores.poll() {
            match reply {
                ScoreReply::Top(Ok(top)) => self.game.on_scores_loaded(top),
                ScoreReply::Top(Err(e)) => warn!("loading scores failed: {e}"),
                ScoreReply::Saved(result) => self.game.on_submission(result),
            }
        }
    }

    fn dispatch_events(&mut self) {
        for event in self.game.drain_events() {
            match event {
                GameEvent::Music(cue) => self.music.apply(cue),
                GameEvent::SubmitScore { name, score } => {
                    info!(%name, score, "submitting score");
                    self.scores.submit(&name, i64::from(score));
                }
                GameEvent::ClearTriggered(clear) => {
                    let x = (clear.column as f32 + clear.cols as f32 / 2.0) * BLOCK_SIZE;
                    let y = clear.y + clear.rows as f32 * BLOCK_SIZE / 2.0;
                    self.popups.push(ScorePopup::new(x, y, clear.points));
                }
                GameEvent::ModeChanged(mode) => {
                    match mode {
                        Mode::EnterName => self.name.clear(),
                        Mode::Start => {
                            self.popups.clear();
                            self.scores.request_top();
                        }
                        _ => {}
                    }
                    if !matches!(mode, Mode::Playing | Mode::LevelTransition(_)) {
                        self.held.clear();
                    }
                }
                GameEvent::Sound(sound) => debug!(?sound, "sound"),
                GameEvent::Lost { score } => info!(score, "game lost"),
                other => debug!(event = ?other, "game event"),
            }
        }
    }
}
