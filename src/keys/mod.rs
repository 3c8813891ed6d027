//! # Keys Module
//!
//! Keyboard key vocabulary shared by the configuration, the key emitter and
//! the keyboard listener.
//!
//! This module handles:
//! - Resolving configured key names (`"ctrl"`, `"f5"`, `"page_up"`, ...)
//! - Representing printable keys as characters
//! - Matching generic modifiers (`ctrl`) against side-specific ones (`ctrl_l`)
//!
//! ## Vocabulary
//!
//! | Name(s) | Key |
//! |---------|-----|
//! | `ctrl`, `ctrl_l`, `ctrl_r` | Control (either / left / right) |
//! | `alt`, `alt_l`, `alt_r`, `alt_gr` | Alt (either / left / right / right) |
//! | `shift`, `shift_l`, `shift_r` | Shift (either / left / right) |
//! | `cmd`, `cmd_l`, `cmd_r` | Meta / Windows / Command |
//! | `f1` .. `f20` | Function keys |
//! | `esc`, `enter`, `space`, `tab`, `backspace`, `delete`, `insert`, `caps_lock` | Editing keys |
//! | `up`, `down`, `left`, `right`, `home`, `end`, `page_up`, `page_down` | Navigation |
//! | `menu`, `num_lock`, `pause`, `print_screen`, `scroll_lock` | System keys |

pub mod emitter;
pub mod listener;

use std::fmt;

/// Non-printable keys addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Alt,
    AltLeft,
    AltRight,
    Ctrl,
    CtrlLeft,
    CtrlRight,
    Shift,
    ShiftLeft,
    ShiftRight,
    Cmd,
    CmdLeft,
    CmdRight,
    Backspace,
    CapsLock,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    Home,
    Insert,
    Left,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Space,
    Tab,
    Up,
}

/// Name table. The first entry for a key is its canonical display name.
const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("alt", NamedKey::Alt),
    ("alt_l", NamedKey::AltLeft),
    ("alt_r", NamedKey::AltRight),
    ("alt_gr", NamedKey::AltRight),
    ("ctrl", NamedKey::Ctrl),
    ("ctrl_l", NamedKey::CtrlLeft),
    ("ctrl_r", NamedKey::CtrlRight),
    ("shift", NamedKey::Shift),
    ("shift_l", NamedKey::ShiftLeft),
    ("shift_r", NamedKey::ShiftRight),
    ("cmd", NamedKey::Cmd),
    ("cmd_l", NamedKey::CmdLeft),
    ("cmd_r", NamedKey::CmdRight),
    ("backspace", NamedKey::Backspace),
    ("caps_lock", NamedKey::CapsLock),
    ("delete", NamedKey::Delete),
    ("down", NamedKey::Down),
    ("end", NamedKey::End),
    ("enter", NamedKey::Enter),
    ("esc", NamedKey::Esc),
    ("f1", NamedKey::F1),
    ("f2", NamedKey::F2),
    ("f3", NamedKey::F3),
    ("f4", NamedKey::F4),
    ("f5", NamedKey::F5),
    ("f6", NamedKey::F6),
    ("f7", NamedKey::F7),
    ("f8", NamedKey::F8),
    ("f9", NamedKey::F9),
    ("f10", NamedKey::F10),
    ("f11", NamedKey::F11),
    ("f12", NamedKey::F12),
    ("f13", NamedKey::F13),
    ("f14", NamedKey::F14),
    ("f15", NamedKey::F15),
    ("f16", NamedKey::F16),
    ("f17", NamedKey::F17),
    ("f18", NamedKey::F18),
    ("f19", NamedKey::F19),
    ("f20", NamedKey::F20),
    ("home", NamedKey::Home),
    ("insert", NamedKey::Insert),
    ("left", NamedKey::Left),
    ("menu", NamedKey::Menu),
    ("num_lock", NamedKey::NumLock),
    ("page_down", NamedKey::PageDown),
    ("page_up", NamedKey::PageUp),
    ("pause", NamedKey::Pause),
    ("print_screen", NamedKey::PrintScreen),
    ("right", NamedKey::Right),
    ("scroll_lock", NamedKey::ScrollLock),
    ("space", NamedKey::Space),
    ("tab", NamedKey::Tab),
    ("up", NamedKey::Up),
];

impl NamedKey {
    /// Resolves a vocabulary name, ignoring case and surrounding whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use hid_keybridge::keys::NamedKey;
    ///
    /// assert_eq!(NamedKey::from_name("ctrl_l"), Some(NamedKey::CtrlLeft));
    /// assert_eq!(NamedKey::from_name("F5"), Some(NamedKey::F5));
    /// assert_eq!(NamedKey::from_name("hyper"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        NAMED_KEYS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, key)| *key)
    }

    /// Canonical vocabulary name of this key.
    #[must_use]
    pub fn name(self) -> &'static str {
        NAMED_KEYS
            .iter()
            .find(|(_, key)| *key == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Side-agnostic form of a modifier; every other key maps to itself.
    #[must_use]
    pub fn generic(self) -> Self {
        match self {
            NamedKey::AltLeft | NamedKey::AltRight => NamedKey::Alt,
            NamedKey::CtrlLeft | NamedKey::CtrlRight => NamedKey::Ctrl,
            NamedKey::ShiftLeft | NamedKey::ShiftRight => NamedKey::Shift,
            NamedKey::CmdLeft | NamedKey::CmdRight => NamedKey::Cmd,
            other => other,
        }
    }
}

/// A keyboard key: either a printable character or a named key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Char(char),
    Named(NamedKey),
}

impl Key {
    /// Parses an action key: a single character, or a vocabulary name.
    ///
    /// # Examples
    ///
    /// ```
    /// use hid_keybridge::keys::{Key, NamedKey};
    ///
    /// assert_eq!(Key::parse("a"), Some(Key::Char('a')));
    /// assert_eq!(Key::parse("space"), Some(Key::Named(NamedKey::Space)));
    /// assert_eq!(Key::parse(""), None);
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Key::Char(c)),
            (Some(_), Some(_)) => NamedKey::from_name(value).map(Key::Named),
            (None, _) => None,
        }
    }

    /// Returns true if holding `self` fulfils the requirement `required`.
    ///
    /// A held `ctrl_l` fulfils both `ctrl_l` and `ctrl`; a held `ctrl_l`
    /// does not fulfil `ctrl_r`.
    #[must_use]
    pub fn satisfies(&self, required: &Key) -> bool {
        match (self, required) {
            (Key::Named(held), Key::Named(req)) => held == req || held.generic() == *req,
            (held, req) => held == req,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(named) => f.write_str(named.name()),
        }
    }
}
