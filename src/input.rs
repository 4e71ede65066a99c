//! Key bindings per mode: arrows or vim keys to steer, Space to fire, Up/Down for speed.

use crate::game::{Intent, Mode, Speed};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What the app should do with a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Game(Intent),
    /// Name entry: append an (uppercased) character.
    Type(char),
    Erase,
    /// Name entry: submit what has been typed so far.
    Confirm,
    Quit,
    None,
}

/// Keys whose release ends a held intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Left,
    Right,
    Fast,
    Slow,
}

impl Hold {
    pub fn of(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('a') => Some(Self::Left),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('d') => Some(Self::Right),
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('w') => Some(Self::Fast),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('s') => Some(Self::Slow),
            _ => None,
        }
    }

    pub fn intent(self, held: bool) -> Intent {
        match self {
            Self::Left => Intent::MoveLeft(held),
            Self::Right => Intent::MoveRight(held),
            Self::Fast if held => Intent::ChangeSpeed(Speed::Fast),
            Self::Slow if held => Intent::ChangeSpeed(Speed::Slow),
            Self::Fast | Self::Slow => Intent::ChangeSpeed(Speed::Normal),
        }
    }
}

/// Map a key event to an action for the current mode.
pub fn key_to_action(key: KeyEvent, mode: Mode) -> Action {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    let pressed = kind == KeyEventKind::Press;

    match mode {
        Mode::Playing | Mode::LevelTransition(_) => {
            if let Some(hold) = Hold::of(code) {
                return match kind {
                    KeyEventKind::Release => Action::Game(hold.intent(false)),
                    _ => Action::Game(hold.intent(true)),
                };
            }
            match code {
                KeyCode::Char(' ') if pressed => Action::Game(Intent::Fire),
                KeyCode::Char('q') | KeyCode::Esc if pressed => Action::Quit,
                _ => Action::None,
            }
        }
        _ if !pressed => Action::None,
        Mode::EnterName => match code {
            KeyCode::Enter => Action::Confirm,
            KeyCode::Backspace => Action::Erase,
            KeyCode::Esc => Action::Quit,
            KeyCode::Char(c) if c.is_ascii_alphanumeric() => Action::Type(c.to_ascii_uppercase()),
            _ => Action::None,
        },
        _ if matches!(code, KeyCode::Char('q') | KeyCode::Esc) => Action::Quit,
        Mode::Start => match code {
            KeyCode::Char('i') | KeyCode::Char('I') => Action::Game(Intent::ToggleInstructions),
            _ => Action::Game(Intent::Start),
        },
        Mode::Instructions => Action::Game(Intent::ToggleInstructions),
        Mode::Celebration => Action::None,
        Mode::GameOver => Action::Game(Intent::Restart),
    }
}
