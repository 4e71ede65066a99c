//! Colours: the neon arcade defaults, btop-style `theme[key]="value"` files, and palette overrides.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Cluster colours, indexed by the cluster's colour slot.
    pub shapes: [Color; 6],
    pub bg: Color,
    pub border: Color,
    pub text: Color,
    pub title: Color,
    pub dim: Color,
    pub ship: Color,
    pub projectile: Color,
    pub hazard: Color,
    /// Level banner and celebration highlights.
    pub accent: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ARCADE: [Color; 6] = [
    Color::Rgb(0xFF, 0x00, 0xFF),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0x00, 0xFF, 0xFF),
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0xFF, 0xFF, 0xFF),
];

const HIGH_CONTRAST: [Color; 6] = [
    Color::Rgb(0xFF, 0x00, 0xFF),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0x00, 0xFF, 0xFF),
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0x00, 0x88, 0xFF),
];

// Tol's bright scheme; no red/green pair carries meaning on its own.
const COLORBLIND: [Color; 6] = [
    Color::Rgb(0x00, 0x77, 0xBB),
    Color::Rgb(0xEE, 0x77, 0x33),
    Color::Rgb(0x00, 0x99, 0x88),
    Color::Rgb(0xCC, 0x33, 0x11),
    Color::Rgb(0xEE, 0x33, 0x77),
    Color::Rgb(0xBB, 0xBB, 0x00),
];

impl Default for Theme {
    fn default() -> Self {
        Self {
            shapes: ARCADE,
            bg: Color::Rgb(0x00, 0x00, 0x00),
            border: Color::Rgb(0x3F, 0x44, 0x4F),
            text: Color::Rgb(0xFF, 0xFF, 0xFF),
            title: Color::Rgb(0xFF, 0xFF, 0x00),
            dim: Color::Rgb(0x5C, 0x63, 0x70),
            ship: Color::Rgb(0xFF, 0xFF, 0xFF),
            projectile: Color::Rgb(0x00, 0xFF, 0xFF),
            hazard: Color::Rgb(0x8A, 0x2B, 0xE2),
            accent: Color::Rgb(0x00, 0xFF, 0xFF),
        }
    }
}

impl Theme {
    /// Load a btop-style file (`theme[key]="#hex"`); a missing path or file means the defaults.
    /// `palette` then overrides the cluster colours.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            _ => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.shapes = HIGH_CONTRAST;
                self.dim = Color::Rgb(0xAA, 0xAA, 0xAA);
            }
            Palette::Colorblind => {
                self.shapes = COLORBLIND;
                self.projectile = Color::Rgb(0xFF, 0xFF, 0xFF);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let d = Self::default();
        Self {
            shapes: [
                get("net_box").unwrap_or(d.shapes[0]),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(d.shapes[1]),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(d.shapes[2]),
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.shapes[3]),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.shapes[4]),
                get("main_fg").unwrap_or(d.shapes[5]),
            ],
            bg: get("main_bg").unwrap_or(d.bg),
            border: get("div_line").unwrap_or(d.border),
            text: get("main_fg").unwrap_or(d.text),
            title: get("title").unwrap_or(d.title),
            dim: get("inactive_fg").unwrap_or(d.dim),
            ship: get("selected_fg").unwrap_or(d.ship),
            projectile: get("hi_fg").unwrap_or(d.projectile),
            hazard: get("proc_box").unwrap_or(d.hazard),
            accent: get("cpu_box").unwrap_or(d.accent),
        }
    }

    #[inline]
    pub fn shape_color(&self, slot: u8) -> Color {
        self.shapes[usize::from(slot) % self.shapes.len()]
    }
}

fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse `#RRGGBB` or `#RGB`.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    match s.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_hex("#98C379").unwrap(), Color::Rgb(0x98, 0xC3, 0x79));
        assert_eq!(parse_hex("#FFF").unwrap(), Color::Rgb(255, 255, 255));
        assert!(parse_hex("#GG0000").is_err());
        assert!(parse_hex("#1234").is_err());
    }

    #[test]
    fn parses_theme_lines() {
        let map = parse_theme_file("# comment\ntheme[main_bg]=\"#31353F\"\ntheme[title]='#fff'\nbogus");
        assert_eq!(map.get("main_bg").map(String::as_str), Some("#31353F"));
        assert_eq!(map.get("title").map(String::as_str), Some("#fff"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn loads_file_and_keeps_defaults_for_missing_keys() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "theme[main_bg]=\"#102030\"\ntheme[cpu_end]=\"#bad\"").unwrap();
        let theme = Theme::load(Some(file.path()), Palette::Normal).unwrap();
        assert_eq!(theme.bg, Color::Rgb(0x10, 0x20, 0x30));
        assert_eq!(theme.shapes[4], Color::Rgb(0xBB, 0xAA, 0xDD));
        assert_eq!(theme.ship, Theme::default().ship);
    }

    #[test]
    fn palette_overrides_shape_colours() {
        let theme = Theme::load(None, Palette::Colorblind).unwrap();
        assert_eq!(theme.shapes, COLORBLIND);
        assert_eq!(theme.shape_color(7), COLORBLIND[1]);
    }
}
