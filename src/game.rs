//! Session state machine: modes, score accrual, level progression, hazard timing, and the event
//! queue presentation drains after every tick.

use crate::GameConfig;
use crate::grid::{ClearReport, Grid, GridContext};
use crate::hazard::{self, Hazard};
use crate::highscores::{ScoreEntry, SubmitOutcome, sanitize_name};
use crate::player::{Player, Projectile};
use crate::rng::Rng;
use crate::shape::BLOCK_SIZE;
use tracing::{debug, info, warn};

const TEXT_START_Y: f32 = -100.0;
const TEXT_DROP_PX_PER_SEC: f32 = 200.0;
/// The level text has to clear the bottom edge by this much before play resumes.
const TEXT_EXIT_MARGIN: f32 = 50.0;
pub const GAME_OVER_DELAY_SECS: f32 = 1.0;
pub const CELEBRATION_SECS: f32 = 4.0;
/// A submission with no reply by then is treated as failed.
pub const SUBMIT_TIMEOUT_SECS: f32 = 8.0;
const BONUS_PER_SEC: f64 = 5.0;
const PENALTY_PER_SEC: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    /// Spawning stopped; waiting for the field to empty.
    AwaitingClear,
    TextDrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Start,
    Instructions,
    Playing,
    LevelTransition(TransitionPhase),
    EnterName,
    Celebration,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    #[default]
    Normal,
    Fast,
    Slow,
}

impl Speed {
    pub fn multiplier(self) -> f32 {
        match self {
            Self::Normal => 1.0,
            Self::Fast => 5.0,
            Self::Slow => 0.5,
        }
    }
}

/// Player intents, already decoupled from whichever device produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    MoveLeft(bool),
    MoveRight(bool),
    Fire,
    Start,
    Restart,
    ToggleInstructions,
    SubmitName(String),
    ChangeSpeed(Speed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sound {
    Shoot,
    Hit,
    Clear,
    /// A cell of a clearing cluster starts to shrink.
    Metallic,
    GameOver,
    Applause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCue {
    IntroStart,
    IntroStop,
    Play,
    Pause,
    ChangeLevel(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankChange {
    /// 1-based leaderboard position after the save.
    Climbed { rank: usize },
    PersonalBest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ModeChanged(Mode),
    ScoreChanged(u32),
    LevelChanged(u32),
    ClearTriggered(ClearReport),
    Lost { score: u32 },
    HazardSpawned { x: f32 },
    HazardDespawned,
    CelebrationEntered { name: String, rank: RankChange },
    SubmitScore { name: String, score: u32 },
    SpeedChanged(Speed),
    Sound(Sound),
    Music(MusicCue),
}

/// Per-game counters, reset together on restart.
#[derive(Debug, Clone)]
pub struct Session {
    score: u32,
    accumulator: f64,
    level: u32,
    elapsed: f32,
    speed: Speed,
    text_y: f32,
}

impl Session {
    fn new(level: u32, level_duration: f32) -> Self {
        Self {
            score: 0,
            accumulator: 0.0,
            level,
            elapsed: (level - 1) as f32 * level_duration,
            speed: Speed::Normal,
            text_y: TEXT_START_Y,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Height of the "level N" text while it drops.
    pub fn text_y(&self) -> f32 {
        self.text_y
    }

    /// Fractional bonus or penalty for playing off normal speed; whole points move into the score
    /// and the remainder carries over. Returns true when the score changed.
    fn accrue(&mut self, dt: f32, clearing: bool) -> bool {
        if clearing {
            return false;
        }
        let m = f64::from(self.speed.multiplier());
        let dt = f64::from(dt);
        if m > 1.0 {
            self.accumulator += (m - 1.0) * BONUS_PER_SEC * dt;
        } else if m < 1.0 {
            self.accumulator -= (1.0 - m) * PENALTY_PER_SEC * dt;
        }
        if self.accumulator.abs() < 1.0 {
            return false;
        }
        let change = self.accumulator.trunc();
        self.accumulator -= change;
        let before = self.score;
        self.score = (i64::from(self.score) + change as i64).max(0) as u32;
        self.score != before
    }

    fn add_points(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }
}

#[derive(Debug, Clone)]
struct PendingSubmission {
    name: String,
    waited: f32,
    old_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Celebration {
    pub name: String,
    pub rank: RankChange,
}

#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    field_width: f32,
    field_height: f32,
    mode: Mode,
    session: Session,
    grid: Grid,
    player: Player,
    projectiles: Vec<Projectile>,
    hazard: Option<Hazard>,
    hazard_timer: f32,
    rng: Rng,
    events: Vec<GameEvent>,
    leaderboard: Vec<ScoreEntry>,
    /// Counts down after a loss; the field is frozen meanwhile.
    loss_delay: Option<f32>,
    pending: Option<PendingSubmission>,
    celebration: Option<(Celebration, f32)>,
}

impl Game {
    pub fn new(config: &GameConfig) -> Self {
        let field_width = f32::from(config.columns) * BLOCK_SIZE;
        let field_height = f32::from(config.rows) * BLOCK_SIZE;
        let rng = config.seed.map_or_else(Rng::from_time, Rng::new);
        let initial_level = config.initial_level.max(1);
        Self {
            config: config.clone(),
            field_width,
            field_height,
            mode: Mode::Start,
            session: Session::new(initial_level, config.level_duration),
            grid: Grid::new(config.columns, field_height),
            player: Player::new(field_width, field_height),
            projectiles: Vec::new(),
            hazard: None,
            hazard_timer: 0.0,
            rng,
            events: vec![GameEvent::Music(MusicCue::IntroStart)],
            leaderboard: Vec::new(),
            loss_delay: None,
            pending: None,
            celebration: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn hazard(&self) -> Option<&Hazard> {
        self.hazard.as_ref()
    }

    pub fn leaderboard(&self) -> &[ScoreEntry] {
        &self.leaderboard
    }

    pub fn celebration(&self) -> Option<&Celebration> {
        self.celebration.as_ref().map(|(c, _)| c)
    }

    pub fn field_size(&self) -> (f32, f32) {
        (self.field_width, self.field_height)
    }

    /// True from a loss until the next restart.
    pub fn is_lost(&self) -> bool {
        self.loss_delay.is_some()
    }

    /// Play time left before the current level ends.
    pub fn level_time_left(&self) -> f32 {
        (self.session.level as f32 * self.config.level_duration - self.session.elapsed).max(0.0)
    }

    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            info!(from = ?self.mode, to = ?mode, "mode change");
            self.mode = mode;
            self.events.push(GameEvent::ModeChanged(mode));
        }
    }

    pub fn handle(&mut self, intent: Intent) {
        match (self.mode, intent) {
            (Mode::Start, Intent::Start) => self.start_game(),
            (Mode::Start, Intent::ToggleInstructions) => self.set_mode(Mode::Instructions),
            (Mode::Instructions, Intent::ToggleInstructions) => self.set_mode(Mode::Start),
            (Mode::Playing | Mode::LevelTransition(_), intent) if !self.is_lost() => {
                self.handle_play(intent)
            }
            (Mode::EnterName, Intent::SubmitName(raw)) if self.pending.is_none() => {
                self.submit(&raw)
            }
            (Mode::GameOver, Intent::Restart) => self.reset(),
            (mode, intent) => debug!(?mode, ?intent, "intent ignored"),
        }
    }

    fn handle_play(&mut self, intent: Intent) {
        match intent {
            Intent::MoveLeft(held) => self.player.moving_left = held,
            Intent::MoveRight(held) => self.player.moving_right = held,
            Intent::Fire => {
                self.projectiles.push(self.player.fire());
                self.events.push(GameEvent::Sound(Sound::Shoot));
            }
            Intent::ChangeSpeed(speed) if speed != self.session.speed => {
                self.session.speed = speed;
                self.events.push(GameEvent::SpeedChanged(speed));
            }
            _ => {}
        }
    }

    fn start_game(&mut self) {
        self.set_mode(Mode::Playing);
        self.events.push(GameEvent::Music(MusicCue::IntroStop));
        self.events.push(GameEvent::Music(MusicCue::Play));
    }

    /// Back to the start screen with a fresh session.
    fn reset(&mut self) {
        let level = self.config.initial_level.max(1);
        self.session = Session::new(level, self.config.level_duration);
        self.grid = Grid::new(self.config.columns, self.field_height);
        self.player.recenter();
        self.projectiles.clear();
        if self.hazard.take().is_some() {
            self.events.push(GameEvent::HazardDespawned);
        }
        self.hazard_timer = 0.0;
        self.loss_delay = None;
        self.pending = None;
        self.celebration = None;
        self.set_mode(Mode::Start);
        self.events.extend([
            GameEvent::ScoreChanged(0),
            GameEvent::LevelChanged(level),
            GameEvent::SpeedChanged(Speed::Normal),
            GameEvent::Music(MusicCue::Pause),
            GameEvent::Music(MusicCue::IntroStart),
            GameEvent::Music(MusicCue::ChangeLevel(level)),
        ]);
    }

    pub fn tick(&mut self, dt: f32) {
        match self.mode {
            Mode::Start | Mode::Instructions | Mode::GameOver => {}
            Mode::EnterName => self.tick_submission(dt),
            Mode::Celebration => {
                self.update_hazard(dt);
                if let Some((_, timer)) = &mut self.celebration {
                    *timer -= dt;
                    if *timer <= 0.0 {
                        self.set_mode(Mode::GameOver);
                    }
                }
            }
            Mode::Playing | Mode::LevelTransition(_) => match &mut self.loss_delay {
                Some(delay) => {
                    *delay -= dt;
                    if *delay <= 0.0 {
                        self.set_mode(Mode::EnterName);
                    }
                }
                None => self.tick_play(dt),
            },
        }
    }

    fn tick_play(&mut self, dt: f32) {
        let accruing = matches!(
            self.mode,
            Mode::Playing | Mode::LevelTransition(TransitionPhase::AwaitingClear)
        );
        if accruing && self.session.accrue(dt, self.grid.is_clearing()) {
            self.events.push(GameEvent::ScoreChanged(self.session.score));
        }

        match self.mode {
            Mode::Playing => {
                self.session.elapsed += dt;
                if self.session.elapsed > self.session.level as f32 * self.config.level_duration {
                    self.session.text_y = TEXT_START_Y;
                    self.set_mode(Mode::LevelTransition(TransitionPhase::AwaitingClear));
                }
            }
            Mode::LevelTransition(TransitionPhase::AwaitingClear) => {
                if self.grid.is_empty() {
                    self.set_mode(Mode::LevelTransition(TransitionPhase::TextDrop));
                    self.events.push(GameEvent::Sound(Sound::Clear));
                }
            }
            Mode::LevelTransition(TransitionPhase::TextDrop) => {
                self.session.text_y += TEXT_DROP_PX_PER_SEC * dt;
                if self.session.text_y > self.field_height + TEXT_EXIT_MARGIN {
                    self.session.level += 1;
                    self.session.text_y = TEXT_START_Y;
                    self.set_mode(Mode::Playing);
                    self.events.extend([
                        GameEvent::LevelChanged(self.session.level),
                        GameEvent::Music(MusicCue::ChangeLevel(self.session.level)),
                    ]);
                }
            }
            _ => {}
        }

        self.player.update(dt, self.hazard.as_ref());
        self.update_hazard(dt);

        let ctx = GridContext {
            dt,
            mode: self.mode,
            level: self.session.level,
            speed_multiplier: self.session.speed.multiplier(),
            player_y: self.player.y,
        };
        let report = self
            .grid
            .update(&ctx, &mut self.projectiles, &mut self.rng);

        for _ in 0..report.hits {
            self.events.push(GameEvent::Sound(Sound::Hit));
        }
        for _ in 0..report.cells_shrinking {
            self.events.push(GameEvent::Sound(Sound::Metallic));
        }
        if !report.clears.is_empty() {
            self.session.add_points(report.points());
            for clear in report.clears {
                self.events.push(GameEvent::ClearTriggered(clear));
                self.events.push(GameEvent::Sound(Sound::Clear));
            }
            self.events.push(GameEvent::ScoreChanged(self.session.score));
        }
        if report.lost {
            self.lose();
            return;
        }

        for projectile in &mut self.projectiles {
            projectile.update(dt);
        }
        self.projectiles.retain(|p| p.alive);
    }

    fn lose(&mut self) {
        info!(score = self.session.score, level = self.session.level, "game lost");
        self.loss_delay = Some(GAME_OVER_DELAY_SECS);
        self.player.moving_left = false;
        self.player.moving_right = false;
        self.events.extend([
            GameEvent::Lost {
                score: self.session.score,
            },
            GameEvent::Sound(Sound::GameOver),
            GameEvent::Music(MusicCue::Pause),
        ]);
    }

    /// Runs on its own clock; level and clearing state have no say.
    fn update_hazard(&mut self, dt: f32) {
        self.hazard_timer += dt;
        if self.hazard.is_none() && self.hazard_timer > hazard::SPAWN_INTERVAL_SECS {
            let h = Hazard::spawn(self.field_width, &mut self.rng);
            debug!(x = h.x, "hazard spawned");
            self.events.push(GameEvent::HazardSpawned { x: h.x });
            self.hazard = Some(h);
            self.hazard_timer = 0.0;
        }
        if let Some(h) = &mut self.hazard {
            h.update(dt);
            if h.is_off_screen(self.field_height) {
                self.hazard = None;
                self.events.push(GameEvent::HazardDespawned);
            }
        }
    }

    fn submit(&mut self, raw: &str) {
        let name = sanitize_name(raw);
        let old_rank = self.leaderboard.iter().position(|e| e.name == name);
        info!(%name, score = self.session.score, "submitting score");
        self.events.push(GameEvent::SubmitScore {
            name: name.clone(),
            score: self.session.score,
        });
        self.pending = Some(PendingSubmission {
            name,
            waited: 0.0,
            old_rank,
        });
    }

    fn tick_submission(&mut self, dt: f32) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        pending.waited += dt;
        if pending.waited > SUBMIT_TIMEOUT_SECS {
            warn!("score submission timed out");
            self.pending = None;
            self.set_mode(Mode::GameOver);
        }
    }

    /// Fresh leaderboard from the score service.
    pub fn on_scores_loaded(&mut self, top: Vec<ScoreEntry>) {
        self.leaderboard = top;
    }

    /// Reply to the submission sent with `SubmitScore`. Celebrates only a beaten personal best;
    /// anything else, failures included, goes to the game-over screen.
    pub fn on_submission(&mut self, result: Result<SubmitOutcome, String>) {
        let pending = self.pending.take();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("score submission failed: {e}");
                if pending.is_some() && self.mode == Mode::EnterName {
                    self.set_mode(Mode::GameOver);
                }
                return;
            }
        };
        self.leaderboard = outcome.top;
        let Some(pending) = pending.filter(|_| self.mode == Mode::EnterName) else {
            debug!("late submission reply");
            return;
        };
        if !outcome.updated {
            self.set_mode(Mode::GameOver);
            return;
        }

        let new_rank = self.leaderboard.iter().position(|e| e.name == pending.name);
        let rank = match (new_rank, pending.old_rank) {
            (Some(new), None) => RankChange::Climbed { rank: new + 1 },
            (Some(new), Some(old)) if new < old => RankChange::Climbed { rank: new + 1 },
            _ => RankChange::PersonalBest,
        };
        let celebration = Celebration {
            name: pending.name,
            rank,
        };
        self.events.extend([
            GameEvent::CelebrationEntered {
                name: celebration.name.clone(),
                rank: celebration.rank.clone(),
            },
            GameEvent::Sound(Sound::Applause),
        ]);
        self.celebration = Some((celebration, CELEBRATION_SECS));
        self.set_mode(Mode::Celebration);
    }

    #[cfg(test)]
    fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use proptest::prelude::*;

    fn config() -> GameConfig {
        GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        }
    }

    fn playing(config: &GameConfig) -> Game {
        let mut g = Game::new(config);
        g.handle(Intent::Start);
        g.drain_events();
        g
    }

    fn entry(name: &str, score: i64) -> ScoreEntry {
        ScoreEntry {
            name: name.into(),
            score,
            timestamp: 0,
        }
    }

    fn lose(g: &mut Game) {
        let layout = vec![vec![true, false]; 2];
        g.grid_mut().push(Shape::new(4, 600.0, layout, 0));
        g.tick(0.01);
        assert!(g.is_lost());
        g.tick(GAME_OVER_DELAY_SECS + 0.01);
        assert_eq!(g.mode(), Mode::EnterName);
        g.drain_events();
    }

    #[test]
    fn start_and_instructions() {
        let mut g = Game::new(&config());
        assert_eq!(g.drain_events(), vec![GameEvent::Music(MusicCue::IntroStart)]);
        g.handle(Intent::ToggleInstructions);
        assert_eq!(g.mode(), Mode::Instructions);
        g.handle(Intent::Start);
        assert_eq!(g.mode(), Mode::Instructions);
        g.handle(Intent::ToggleInstructions);
        g.handle(Intent::Start);
        assert_eq!(g.mode(), Mode::Playing);
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::Music(MusicCue::IntroStop)));
    }

    #[test]
    fn fast_speed_earns_bonus() {
        let mut g = playing(&config());
        g.handle(Intent::ChangeSpeed(Speed::Fast));
        for _ in 0..10 {
            g.tick(0.1);
        }
        assert_eq!(g.session().score(), 20);
        assert!(g.drain_events().contains(&GameEvent::SpeedChanged(Speed::Fast)));
    }

    #[test]
    fn slow_speed_never_goes_negative() {
        let mut g = playing(&config());
        g.handle(Intent::ChangeSpeed(Speed::Slow));
        for _ in 0..20 {
            g.tick(0.1);
        }
        assert_eq!(g.session().score(), 0);
    }

    #[test]
    fn accrual_pauses_while_clearing() {
        let mut g = playing(&config());
        let mut s = Shape::new(3, 100.0, vec![vec![true; 2]; 2], 1);
        s.start_clear_animation();
        g.grid_mut().push(s);
        g.handle(Intent::ChangeSpeed(Speed::Fast));
        g.tick(0.1);
        assert_eq!(g.session().score(), 0);
        assert!(g.grid().is_clearing());
    }

    #[test]
    fn firing_spawns_projectile() {
        let mut g = playing(&config());
        g.handle(Intent::Fire);
        assert_eq!(g.projectiles().len(), 1);
        assert_eq!(g.drain_events(), vec![GameEvent::Sound(Sound::Shoot)]);
        g.tick(0.5);
        assert!(g.projectiles()[0].y < g.player().y);
    }

    #[test]
    fn level_transition_waits_for_empty_field() {
        let cfg = GameConfig {
            level_duration: 1.0,
            ..config()
        };
        let mut g = playing(&cfg);
        for _ in 0..4 {
            g.tick(0.25);
        }
        assert_eq!(g.mode(), Mode::Playing);
        g.tick(0.25);
        assert_eq!(
            g.mode(),
            Mode::LevelTransition(TransitionPhase::AwaitingClear)
        );
        g.tick(0.1);
        assert_eq!(g.mode(), Mode::LevelTransition(TransitionPhase::TextDrop));
        assert!(g.drain_events().contains(&GameEvent::Sound(Sound::Clear)));

        let mut ticks = 0;
        while g.mode() != Mode::Playing {
            g.tick(0.1);
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(g.session().level(), 2);
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::LevelChanged(2)));
        assert!(events.contains(&GameEvent::Music(MusicCue::ChangeLevel(2))));
    }

    #[test]
    fn transition_blocks_on_remaining_clusters() {
        let cfg = GameConfig {
            level_duration: 0.5,
            ..config()
        };
        let mut g = playing(&cfg);
        g.grid_mut()
            .push(Shape::new(2, 0.0, vec![vec![true, false]], 0));
        for _ in 0..10 {
            g.tick(0.1);
        }
        assert_eq!(
            g.mode(),
            Mode::LevelTransition(TransitionPhase::AwaitingClear)
        );
        assert!(!g.grid().is_empty());
    }

    #[test]
    fn initial_level_starts_its_own_clock() {
        let cfg = GameConfig {
            initial_level: 3,
            ..config()
        };
        let g = Game::new(&cfg);
        assert_eq!(g.session().level(), 3);
        assert_eq!(g.session().elapsed(), 200.0);
    }

    #[test]
    fn loss_waits_before_name_entry() {
        let mut g = playing(&config());
        let layout = vec![vec![true, false]; 2];
        g.grid_mut().push(Shape::new(4, 600.0, layout, 0));
        g.tick(0.01);
        assert!(g.is_lost());
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::Lost { score: 0 }));
        assert!(events.contains(&GameEvent::Music(MusicCue::Pause)));

        g.handle(Intent::Fire);
        assert!(g.projectiles().is_empty());
        g.tick(0.5);
        assert_eq!(g.mode(), Mode::Playing);
        g.tick(0.6);
        assert_eq!(g.mode(), Mode::EnterName);
    }

    #[test]
    fn beating_best_celebrates_with_rank_climb() {
        let mut g = playing(&config());
        g.on_scores_loaded(vec![entry("ZED", 900), entry("AB", 100)]);
        lose(&mut g);
        g.handle(Intent::SubmitName("ab".into()));
        assert!(g.is_submitting());
        assert_eq!(
            g.drain_events(),
            vec![GameEvent::SubmitScore {
                name: "AB".into(),
                score: 0
            }]
        );
        g.on_submission(Ok(SubmitOutcome {
            updated: true,
            top: vec![entry("AB", 1000), entry("ZED", 900)],
        }));
        assert_eq!(g.mode(), Mode::Celebration);
        assert_eq!(
            g.celebration().map(|c| c.rank.clone()),
            Some(RankChange::Climbed { rank: 1 })
        );
        g.tick(CELEBRATION_SECS + 0.1);
        assert_eq!(g.mode(), Mode::GameOver);
    }

    #[test]
    fn same_rank_is_personal_best() {
        let mut g = playing(&config());
        g.on_scores_loaded(vec![entry("AB", 100)]);
        lose(&mut g);
        g.handle(Intent::SubmitName("AB".into()));
        g.on_submission(Ok(SubmitOutcome {
            updated: true,
            top: vec![entry("AB", 200)],
        }));
        assert_eq!(
            g.celebration().map(|c| c.rank.clone()),
            Some(RankChange::PersonalBest)
        );
    }

    #[test]
    fn no_update_or_failure_goes_to_game_over() {
        let mut g = playing(&config());
        lose(&mut g);
        g.handle(Intent::SubmitName("".into()));
        assert!(matches!(
            g.drain_events().as_slice(),
            [GameEvent::SubmitScore { name, .. }] if name == "PLAYER"
        ));
        g.on_submission(Ok(SubmitOutcome {
            updated: false,
            top: vec![entry("PLAYER", 0)],
        }));
        assert_eq!(g.mode(), Mode::GameOver);
        assert_eq!(g.leaderboard().len(), 1);

        let mut g = playing(&config());
        lose(&mut g);
        g.handle(Intent::SubmitName("X".into()));
        g.on_submission(Err("offline".into()));
        assert_eq!(g.mode(), Mode::GameOver);
    }

    #[test]
    fn submission_times_out() {
        let mut g = playing(&config());
        lose(&mut g);
        g.handle(Intent::SubmitName("X".into()));
        g.tick(SUBMIT_TIMEOUT_SECS / 2.0);
        assert_eq!(g.mode(), Mode::EnterName);
        g.tick(SUBMIT_TIMEOUT_SECS);
        assert_eq!(g.mode(), Mode::GameOver);
        g.on_submission(Ok(SubmitOutcome {
            updated: true,
            top: vec![entry("X", 5)],
        }));
        assert_eq!(g.mode(), Mode::GameOver);
        assert_eq!(g.leaderboard().len(), 1);
    }

    #[test]
    fn restart_resets_session() {
        let mut g = playing(&config());
        g.handle(Intent::ChangeSpeed(Speed::Fast));
        for _ in 0..10 {
            g.tick(0.1);
        }
        lose(&mut g);
        g.handle(Intent::SubmitName("X".into()));
        g.on_submission(Err("offline".into()));
        g.drain_events();
        g.handle(Intent::Restart);
        assert_eq!(g.mode(), Mode::Start);
        assert_eq!(g.session().score(), 0);
        assert_eq!(g.session().speed(), Speed::Normal);
        assert!(g.grid().is_empty());
        assert!(!g.is_lost());
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::Music(MusicCue::IntroStart)));
        assert!(events.contains(&GameEvent::Music(MusicCue::ChangeLevel(1))));
    }

    #[test]
    fn hazard_spawns_on_its_own_timer() {
        let mut g = playing(&config());
        g.update_hazard(hazard::SPAWN_INTERVAL_SECS);
        assert!(g.hazard().is_none());
        g.update_hazard(0.5);
        let x = g.hazard().map(|h| h.x);
        assert!(x.is_some());
        assert!(matches!(
            g.drain_events().as_slice(),
            [GameEvent::HazardSpawned { .. }]
        ));
        g.update_hazard(hazard::SPAWN_INTERVAL_SECS + 1.0);
        assert_eq!(g.hazard().map(|h| h.x), x);
        for _ in 0..100 {
            g.update_hazard(1.0);
        }
        assert!(g.drain_events().contains(&GameEvent::HazardDespawned));
    }

    #[test]
    fn slow_frames_do_not_let_shots_pass_through() {
        for dt in [0.1, 0.25] {
            for offset in 0..20 {
                let mut g = playing(&config());
                // Single cell straight above the ship's nose.
                let y = 160.0 + offset as f32;
                g.grid_mut().push(Shape::new(5, y, vec![vec![true]], 1));
                g.handle(Intent::Fire);
                for _ in 0..10 {
                    g.tick(dt);
                }
                assert_eq!(g.session().score(), 200, "dt {dt}, cluster at {y}");
            }
        }
    }

    #[test]
    fn clearing_awards_rectangle_points() {
        let mut g = playing(&config());
        // 2x2 with one hole at the bottom right, shot from under column 1.
        let layout = vec![vec![true, true], vec![true, false]];
        g.grid_mut().push(Shape::new(3, 100.0, layout, 2));
        g.projectiles
            .push(Projectile::new(3.0 * BLOCK_SIZE + 45.0, 130.0));
        g.tick(0.01);
        assert_eq!(g.session().score(), 400);
        assert!(g.projectiles().is_empty());
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::ScoreChanged(400)));
        assert!(events.contains(&GameEvent::Sound(Sound::Hit)));
        assert!(events.iter().any(|e| matches!(e, GameEvent::ClearTriggered(c) if c.points == 400)));
    }

    proptest! {
        #[test]
        fn accrual_is_tick_size_independent(steps in prop::collection::vec(0.001f32..0.2, 1..200)) {
            let mut s = Session::new(1, 100.0);
            s.speed = Speed::Fast;
            let mut total = 0.0f64;
            for dt in &steps {
                s.accrue(*dt, false);
                total += f64::from(*dt);
            }
            let expected = (total * 4.0 * BONUS_PER_SEC).floor();
            prop_assert!((f64::from(s.score) - expected).abs() <= 1.0);
        }

        #[test]
        fn penalty_clamps_at_zero(steps in prop::collection::vec(0.001f32..0.5, 1..100), start in 0u32..50) {
            let mut s = Session::new(1, 100.0);
            s.add_points(start);
            s.speed = Speed::Slow;
            let mut last = s.score;
            for dt in steps {
                s.accrue(dt, false);
                prop_assert!(s.score <= last);
                last = s.score;
            }
        }
    }
}
