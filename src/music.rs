//! Per-level soundtrack selection and the crossfade deck that follows the game's music cues.

use crate::game::MusicCue;
use crate::rng::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Playback volume of a settled track.
pub const VOLUME: f32 = 0.5;
const FADE_STEPS: u32 = 15;
const FADE_STEP_SECS: f32 = 1.5 / FADE_STEPS as f32;
/// Levels covered by the default variation when the listing is unavailable.
const FALLBACK_LEVELS: u32 = 10;
const PREFIX: &str = "quarth_soundtrack_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    pub level: u32,
    pub variation: char,
}

impl Track {
    pub fn file_name(&self) -> String {
        format!("{PREFIX}{:02}{}.ogg", self.level, self.variation)
    }
}

/// Extract the track encoded in a listing entry such as `quarth_soundtrack_03b.ogg`.
pub fn parse_track(name: &str) -> Option<Track> {
    let rest = &name[name.find(PREFIX)? + PREFIX.len()..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let level = rest[..digits].parse().ok()?;
    let mut tail = rest[digits..].chars();
    let variation = tail.next().filter(char::is_ascii_lowercase)?;
    tail.as_str().starts_with(".ogg").then_some(Track { level, variation })
}

/// Variations available per level.
#[derive(Debug, Clone, Default)]
pub struct MusicLibrary {
    dir: Option<PathBuf>,
    variations: BTreeMap<u32, Vec<char>>,
}

impl MusicLibrary {
    /// List `dir`; an unreadable directory degrades to variation `a` for levels 1 to 10.
    pub fn scan(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            return Self::default();
        };
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                let names: Vec<String> = entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| n.contains(".ogg"))
                    .collect();
                let library = Self::from_files(Some(dir), &names);
                info!(tracks = names.len(), dir = %dir.display(), "music listing loaded");
                library
            }
            Err(e) => {
                warn!(dir = %dir.display(), "music listing failed: {e}");
                Self::fallback(Some(dir))
            }
        }
    }

    pub fn from_files<S: AsRef<str>>(dir: Option<&Path>, files: &[S]) -> Self {
        let mut variations: BTreeMap<u32, Vec<char>> = BTreeMap::new();
        for track in files.iter().filter_map(|f| parse_track(f.as_ref())) {
            variations.entry(track.level).or_default().push(track.variation);
        }
        Self {
            dir: dir.map(Path::to_path_buf),
            variations,
        }
    }

    pub fn fallback(dir: Option<&Path>) -> Self {
        Self {
            dir: dir.map(Path::to_path_buf),
            variations: (1..=FALLBACK_LEVELS).map(|l| (l, vec!['a'])).collect(),
        }
    }

    pub fn variations(&self, level: u32) -> &[char] {
        match self.variations.get(&level) {
            Some(v) if !v.is_empty() => v.as_slice(),
            _ => &['a'],
        }
    }

    /// Random variation for `level`.
    pub fn pick(&self, level: u32, rng: &mut Rng) -> Track {
        let options = self.variations(level);
        Track {
            level,
            variation: options[rng.below(options.len())],
        }
    }

    pub fn is_available(&self, track: &Track) -> bool {
        self.dir
            .as_ref()
            .is_some_and(|d| d.join(track.file_name()).is_file())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fade {
    incoming: Track,
    start_volume: f32,
    elapsed: f32,
}

/// Which track is audible and at what volume. A level change fades the current track out over
/// 1.5 s in 15 steps before the next one starts; a newer change aborts a running fade.
#[derive(Debug)]
pub struct MusicDeck {
    library: MusicLibrary,
    rng: Rng,
    current: Option<Track>,
    playing: bool,
    intro: bool,
    volume: f32,
    fade: Option<Fade>,
}

impl MusicDeck {
    pub fn new(library: MusicLibrary, mut rng: Rng) -> Self {
        let first = library.pick(1, &mut rng);
        let current = library.is_available(&first).then_some(first);
        Self {
            library,
            rng,
            current,
            playing: false,
            intro: false,
            volume: VOLUME,
            fade: None,
        }
    }

    pub fn apply(&mut self, cue: MusicCue) {
        match cue {
            MusicCue::IntroStart => self.intro = true,
            MusicCue::IntroStop => self.intro = false,
            MusicCue::Play => self.playing = self.current.is_some(),
            MusicCue::Pause => self.playing = false,
            MusicCue::ChangeLevel(level) => self.change_level(level),
        }
    }

    fn change_level(&mut self, level: u32) {
        let track = self.library.pick(level, &mut self.rng);
        if !self.library.is_available(&track) {
            debug!(file = %track.file_name(), "track missing; keeping current");
            return;
        }
        if let Some(aborted) = self.fade.take() {
            debug!(file = %aborted.incoming.file_name(), "fade superseded");
        }
        if !self.playing || self.current.is_none() || self.volume <= 0.0 {
            self.switch_to(track);
            return;
        }
        self.fade = Some(Fade {
            incoming: track,
            start_volume: self.volume,
            elapsed: 0.0,
        });
    }

    fn switch_to(&mut self, track: Track) {
        info!(file = %track.file_name(), "music changed");
        self.current = Some(track);
        self.volume = VOLUME;
    }

    pub fn update(&mut self, dt: f32) {
        let Some(fade) = &mut self.fade else {
            return;
        };
        fade.elapsed += dt;
        let steps = ((fade.elapsed / FADE_STEP_SECS) as u32).min(FADE_STEPS);
        if steps < FADE_STEPS {
            self.volume = fade.start_volume * (1.0 - steps as f32 / FADE_STEPS as f32);
            return;
        }
        let incoming = fade.incoming;
        self.fade = None;
        self.switch_to(incoming);
    }

    pub fn now_playing(&self) -> Option<Track> {
        self.current.filter(|_| self.playing)
    }

    pub fn is_intro_playing(&self) -> bool {
        self.intro
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_with(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for f in files {
            std::fs::write(dir.path().join(f), b"").unwrap();
        }
        dir
    }

    #[test]
    fn parses_listing_names() {
        assert_eq!(
            parse_track("quarth_soundtrack_03b.ogg"),
            Some(Track { level: 3, variation: 'b' })
        );
        assert_eq!(
            parse_track("music/quarth_soundtrack_12a.ogg"),
            Some(Track { level: 12, variation: 'a' })
        );
        assert_eq!(parse_track("quarth_soundtrack_03.ogg"), None);
        assert_eq!(parse_track("quarth_soundtrack_03B.ogg"), None);
        assert_eq!(parse_track("intro.ogg"), None);
    }

    #[test]
    fn file_name_pads_level() {
        assert_eq!(
            Track { level: 7, variation: 'c' }.file_name(),
            "quarth_soundtrack_07c.ogg"
        );
    }

    #[test]
    fn missing_levels_default_to_a() {
        let lib = MusicLibrary::from_files(None, &["quarth_soundtrack_01b.ogg"]);
        assert_eq!(lib.variations(1), &['b']);
        assert_eq!(lib.variations(9), &['a']);
    }

    #[test]
    fn unreadable_dir_falls_back() {
        let dir = TempDir::new().unwrap();
        let lib = MusicLibrary::scan(Some(&dir.path().join("absent")));
        assert_eq!(lib.variations(10), &['a']);
    }

    #[test]
    fn scan_picks_listed_variations() {
        let dir = dir_with(&["quarth_soundtrack_02a.ogg", "quarth_soundtrack_02c.ogg", "cover.png"]);
        let lib = MusicLibrary::scan(Some(dir.path()));
        let mut v = lib.variations(2).to_vec();
        v.sort_unstable();
        assert_eq!(v, vec!['a', 'c']);
        let mut rng = Rng::new(1);
        for _ in 0..20 {
            assert!(lib.is_available(&lib.pick(2, &mut rng)));
        }
    }

    fn playing_deck(dir: &TempDir) -> MusicDeck {
        let mut deck = MusicDeck::new(MusicLibrary::scan(Some(dir.path())), Rng::new(5));
        deck.apply(MusicCue::Play);
        deck
    }

    #[test]
    fn fade_lasts_fifteen_steps() {
        let dir = dir_with(&["quarth_soundtrack_01a.ogg", "quarth_soundtrack_02a.ogg"]);
        let mut deck = playing_deck(&dir);
        assert_eq!(deck.now_playing(), Some(Track { level: 1, variation: 'a' }));

        deck.apply(MusicCue::ChangeLevel(2));
        assert!(deck.is_fading());
        deck.update(0.75);
        assert!(deck.volume() < VOLUME && deck.volume() > 0.0);
        assert_eq!(deck.now_playing().map(|t| t.level), Some(1));
        deck.update(0.8);
        assert!(!deck.is_fading());
        assert_eq!(deck.now_playing().map(|t| t.level), Some(2));
        assert_eq!(deck.volume(), VOLUME);
    }

    #[test]
    fn newer_change_supersedes_fade() {
        let dir = dir_with(&[
            "quarth_soundtrack_01a.ogg",
            "quarth_soundtrack_02a.ogg",
            "quarth_soundtrack_03a.ogg",
        ]);
        let mut deck = playing_deck(&dir);
        deck.apply(MusicCue::ChangeLevel(2));
        deck.update(0.5);
        let partial = deck.volume();
        deck.apply(MusicCue::ChangeLevel(3));
        assert_eq!(deck.volume(), partial);
        deck.update(1.6);
        assert_eq!(deck.now_playing().map(|t| t.level), Some(3));
    }

    #[test]
    fn paused_deck_switches_immediately() {
        let dir = dir_with(&["quarth_soundtrack_01a.ogg", "quarth_soundtrack_02a.ogg"]);
        let mut deck = playing_deck(&dir);
        deck.apply(MusicCue::Pause);
        deck.apply(MusicCue::ChangeLevel(2));
        assert!(!deck.is_fading());
        assert_eq!(deck.now_playing(), None);
        deck.apply(MusicCue::Play);
        assert_eq!(deck.now_playing().map(|t| t.level), Some(2));
    }

    #[test]
    fn missing_file_keeps_current_track() {
        let dir = dir_with(&["quarth_soundtrack_01a.ogg"]);
        let mut deck = playing_deck(&dir);
        deck.apply(MusicCue::ChangeLevel(4));
        assert!(!deck.is_fading());
        assert_eq!(deck.now_playing().map(|t| t.level), Some(1));
    }

    #[test]
    fn intro_toggles() {
        let mut deck = MusicDeck::new(MusicLibrary::default(), Rng::new(1));
        deck.apply(MusicCue::IntroStart);
        assert!(deck.is_intro_playing());
        deck.apply(MusicCue::IntroStop);
        assert!(!deck.is_intro_playing());
        deck.apply(MusicCue::Play);
        assert_eq!(deck.now_playing(), None);
    }
}
