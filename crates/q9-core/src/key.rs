//! Canonical key events shared by capture adapters, the UI click path and
//! the composition session.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The closed set of keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// Keypad digit 0-9.
    Digit(u8),
    /// Keypad decimal point; cancels the current composition.
    Dot,
    /// Function key that shows/hides the composition UI.
    ToggleVisibility,
    /// Flip traditional/simplified output. Only produced by the UI.
    ToggleScript,
}

impl KeyKind {
    pub fn digit(d: u8) -> Option<Self> {
        (d <= 9).then_some(Self::Digit(d))
    }

    /// Parse the single-token notation used by the headless driver and tests:
    /// `0`-`9`, `.`, `t` (toggle visibility), `s` (toggle script).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "." => Some(Self::Dot),
            "t" | "F10" => Some(Self::ToggleVisibility),
            "s" => Some(Self::ToggleScript),
            _ => {
                let mut chars = token.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                c.to_digit(10).and_then(|d| Self::digit(d as u8))
            }
        }
    }

    /// Whether visibility gating applies to this key.
    pub fn is_gated(&self) -> bool {
        matches!(self, Self::Digit(_) | Self::Dot)
    }
}

/// A key press after canonicalization. Immutable; consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyKind,
    pub captured_at: Instant,
}

impl KeyEvent {
    pub fn new(kind: KeyKind) -> Self {
        Self {
            kind,
            captured_at: Instant::now(),
        }
    }

    pub fn digit(d: u8) -> Self {
        Self::new(KeyKind::Digit(d.min(9)))
    }

    pub fn dot() -> Self {
        Self::new(KeyKind::Dot)
    }

    pub fn toggle_visibility() -> Self {
        Self::new(KeyKind::ToggleVisibility)
    }

    pub fn toggle_script() -> Self {
        Self::new(KeyKind::ToggleScript)
    }
}

impl From<KeyKind> for KeyEvent {
    fn from(kind: KeyKind) -> Self {
        Self::new(kind)
    }
}
