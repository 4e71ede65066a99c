//! quarthtui — Quarth-style block shooter in the terminal.

mod app;
mod game;
mod grid;
mod hazard;
mod highscores;
mod input;
mod music;
mod player;
mod rng;
mod shape;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Options derived from the CLI that shape the simulation.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Field width in 40 px block columns.
    pub columns: u16,
    /// Field height in block rows.
    pub rows: u16,
    /// Seconds of play per level.
    pub level_duration: f32,
    pub initial_level: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            columns: 12,
            rows: 18,
            level_duration: 100.0,
            initial_level: 1,
            seed: None,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        columns: args.columns,
        rows: args.rows.max(8),
        level_duration: args.level_duration.max(1.0),
        initial_level: args.initial_level.max(1),
        seed: args.seed,
    };
    tracing::info!(?config, "starting");
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal belongs to the game, so logs only go to a file when asked for.
fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Quarth-style block shooter in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "quarthtui",
    version,
    about = "Quarth-style block shooter in the terminal. Shoot cells into falling clusters until they form solid rectangles.",
    long_about = "quarthtui is a terminal arcade game inspired by Konami's Quarth.\n\n\
        Irregular clusters of blocks fall toward your ship. Every shot attaches a block under \
        the column it hits; turn a cluster into a filled rectangle and it clears for \
        rows x cols x 100 points. If a cluster reaches the ship, the game is over.\n\n\
        CONTROLS:\n  Left/Right (h/l, a/d)  Move      Space  Fire\n  \
        Up (hold)   Fast forward (+5 pts/s)   Down (hold)  Slow motion (-40 pts/s)\n  \
        I  Instructions on the start screen    Q / Esc  Quit\n\n\
        Use --theme to load a btop-style theme and --music-dir to point at the soundtrack."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Neon arcade colours if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Field width in block columns (at least 7).
    #[arg(
        long,
        default_value = "12",
        value_name = "COLS",
        value_parser = clap::value_parser!(u16).range(i64::from(grid::MIN_COLUMNS)..)
    )]
    pub columns: u16,

    /// Field height in block rows.
    #[arg(long, default_value = "18", value_name = "ROWS")]
    pub rows: u16,

    /// Seconds of play per level.
    #[arg(long, default_value = "100", value_name = "SECS")]
    pub level_duration: f32,

    /// Level to start (and restart) from.
    #[arg(long, default_value = "1", value_name = "N")]
    pub initial_level: u32,

    /// Seed the random generator for a reproducible game.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Target render frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// High score file. Defaults to $XDG_CONFIG_HOME/quarthtui/scores.json.
    #[arg(long, value_name = "FILE")]
    pub scores_file: Option<PathBuf>,

    /// Directory holding quarth_soundtrack_NNx.ogg tracks.
    #[arg(long, value_name = "DIR")]
    pub music_dir: Option<PathBuf>,

    /// Write logs to this file (filter with RUST_LOG).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Disable loss fade, confetti and blinking.
    #[arg(long)]
    pub no_animation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
