//! Trait abstraction for host key synthesis to enable testing

use enigo::{Direction, Enigo, Keyboard, Settings};
use tracing::debug;

use super::{Key, NamedKey};
use crate::error::{KeybridgeError, Result};

/// Trait for synthesizing key-down/key-up events on the host
pub trait KeyEmitter {
    /// Send a key-down event
    fn press(&mut self, key: Key) -> Result<()>;

    /// Send a key-up event
    fn release(&mut self, key: Key) -> Result<()>;
}

/// Wrapper around `enigo::Enigo` that implements KeyEmitter
pub struct EnigoEmitter {
    enigo: Enigo,
}

impl std::fmt::Debug for EnigoEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnigoEmitter").finish_non_exhaustive()
    }
}

impl EnigoEmitter {
    /// Connect to the host input system.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmitter` if no input backend is available (for example no
    /// display server on Linux).
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| KeybridgeError::KeyEmitter(format!("Failed to initialize: {}", e)))?;
        Ok(Self { enigo })
    }

    fn send(&mut self, key: Key, direction: Direction) -> Result<()> {
        let target = to_enigo(key).ok_or_else(|| {
            KeybridgeError::KeyEmitter(format!("'{}' cannot be synthesized on this platform", key))
        })?;

        debug!("Synthesizing {:?} for '{}'", direction, key);
        self.enigo
            .key(target, direction)
            .map_err(|e| KeybridgeError::KeyEmitter(format!("{:?} '{}' failed: {}", direction, key, e)))
    }
}

impl KeyEmitter for EnigoEmitter {
    fn press(&mut self, key: Key) -> Result<()> {
        self.send(key, Direction::Press)
    }

    fn release(&mut self, key: Key) -> Result<()> {
        self.send(key, Direction::Release)
    }
}

/// Maps a vocabulary key onto the enigo key set.
///
/// Side-specific modifiers are synthesized as their generic modifier.
/// Returns `None` for keys the host input backend has no code for.
fn to_enigo(key: Key) -> Option<enigo::Key> {
    use enigo::Key as EK;

    let named = match key {
        Key::Char(c) => return Some(EK::Unicode(c)),
        Key::Named(named) => named.generic(),
    };

    let key = match named {
        NamedKey::Alt | NamedKey::AltLeft | NamedKey::AltRight => EK::Alt,
        NamedKey::Ctrl | NamedKey::CtrlLeft | NamedKey::CtrlRight => EK::Control,
        NamedKey::Shift | NamedKey::ShiftLeft | NamedKey::ShiftRight => EK::Shift,
        NamedKey::Cmd | NamedKey::CmdLeft | NamedKey::CmdRight => EK::Meta,
        NamedKey::Backspace => EK::Backspace,
        NamedKey::CapsLock => EK::CapsLock,
        NamedKey::Delete => EK::Delete,
        NamedKey::Down => EK::DownArrow,
        NamedKey::End => EK::End,
        NamedKey::Enter => EK::Return,
        NamedKey::Esc => EK::Escape,
        NamedKey::F1 => EK::F1,
        NamedKey::F2 => EK::F2,
        NamedKey::F3 => EK::F3,
        NamedKey::F4 => EK::F4,
        NamedKey::F5 => EK::F5,
        NamedKey::F6 => EK::F6,
        NamedKey::F7 => EK::F7,
        NamedKey::F8 => EK::F8,
        NamedKey::F9 => EK::F9,
        NamedKey::F10 => EK::F10,
        NamedKey::F11 => EK::F11,
        NamedKey::F12 => EK::F12,
        NamedKey::F13 => EK::F13,
        NamedKey::F14 => EK::F14,
        NamedKey::F15 => EK::F15,
        NamedKey::F16 => EK::F16,
        NamedKey::F17 => EK::F17,
        NamedKey::F18 => EK::F18,
        NamedKey::F19 => EK::F19,
        NamedKey::F20 => EK::F20,
        NamedKey::Home => EK::Home,
        NamedKey::Left => EK::LeftArrow,
        NamedKey::PageDown => EK::PageDown,
        NamedKey::PageUp => EK::PageUp,
        NamedKey::Right => EK::RightArrow,
        NamedKey::Space => EK::Space,
        NamedKey::Tab => EK::Tab,
        NamedKey::Up => EK::UpArrow,
        NamedKey::Insert
        | NamedKey::Menu
        | NamedKey::NumLock
        | NamedKey::Pause
        | NamedKey::PrintScreen
        | NamedKey::ScrollLock => return system_key(named),
    };
    Some(key)
}

/// Keycode of the context menu key: a virtual-key code on Windows, a keysym on X11.
#[cfg(target_os = "windows")]
const MENU_KEYCODE: u32 = 0x5d;
#[cfg(all(unix, not(target_os = "macos")))]
const MENU_KEYCODE: u32 = 0xff67;

#[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
fn system_key(named: NamedKey) -> Option<enigo::Key> {
    use enigo::Key as EK;

    match named {
        NamedKey::Insert => Some(EK::Insert),
        NamedKey::Menu => Some(EK::Other(MENU_KEYCODE)),
        NamedKey::NumLock => Some(EK::Numlock),
        NamedKey::Pause => Some(EK::Pause),
        NamedKey::PrintScreen => Some(EK::PrintScr),
        NamedKey::ScrollLock => Some(EK::ScrollLock),
        _ => None,
    }
}

// macOS keyboards have none of these keys
#[cfg(not(any(target_os = "windows", all(unix, not(target_os = "macos")))))]
fn system_key(_named: NamedKey) -> Option<enigo::Key> {
    None
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A synthesized key event captured by [`RecordingEmitter`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Emitted {
        Down(Key),
        Up(Key),
    }

    /// Mock emitter recording every event for testing
    #[derive(Clone, Default)]
    pub struct RecordingEmitter {
        pub emitted: Arc<Mutex<Vec<Emitted>>>,
        pub fail: Arc<Mutex<bool>>,
    }

    impl RecordingEmitter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_emitted(&self) -> Vec<Emitted> {
            self.emitted.lock().unwrap().clone()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn record(&self, event: Emitted) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(KeybridgeError::KeyEmitter("Mock emitter failure".to_string()));
            }
            self.emitted.lock().unwrap().push(event);
            Ok(())
        }
    }

    impl KeyEmitter for RecordingEmitter {
        fn press(&mut self, key: Key) -> Result<()> {
            self.record(Emitted::Down(key))
        }

        fn release(&mut self, key: Key) -> Result<()> {
            self.record(Emitted::Up(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{Emitted, RecordingEmitter};
    use super::*;

    #[test]
    fn test_to_enigo_chars() {
        assert_eq!(to_enigo(Key::Char('a')), Some(enigo::Key::Unicode('a')));
        assert_eq!(to_enigo(Key::Char('7')), Some(enigo::Key::Unicode('7')));
    }

    #[test]
    fn test_to_enigo_side_specific_modifiers_are_generic() {
        assert_eq!(to_enigo(Key::Named(NamedKey::CtrlLeft)), Some(enigo::Key::Control));
        assert_eq!(to_enigo(Key::Named(NamedKey::AltRight)), Some(enigo::Key::Alt));
        assert_eq!(to_enigo(Key::Named(NamedKey::ShiftRight)), Some(enigo::Key::Shift));
        assert_eq!(to_enigo(Key::Named(NamedKey::CmdLeft)), Some(enigo::Key::Meta));
    }

    #[test]
    fn test_to_enigo_named_keys() {
        assert_eq!(to_enigo(Key::Named(NamedKey::Enter)), Some(enigo::Key::Return));
        assert_eq!(to_enigo(Key::Named(NamedKey::Esc)), Some(enigo::Key::Escape));
        assert_eq!(to_enigo(Key::Named(NamedKey::Up)), Some(enigo::Key::UpArrow));
        assert_eq!(to_enigo(Key::Named(NamedKey::F9)), Some(enigo::Key::F9));
        assert_eq!(to_enigo(Key::Named(NamedKey::F17)), Some(enigo::Key::F17));
    }

    #[test]
    #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
    fn test_to_enigo_system_keys() {
        assert_eq!(to_enigo(Key::Named(NamedKey::Insert)), Some(enigo::Key::Insert));
        assert_eq!(to_enigo(Key::Named(NamedKey::ScrollLock)), Some(enigo::Key::ScrollLock));
        assert_eq!(to_enigo(Key::Named(NamedKey::PrintScreen)), Some(enigo::Key::PrintScr));
        assert_eq!(
            to_enigo(Key::Named(NamedKey::Menu)),
            Some(enigo::Key::Other(MENU_KEYCODE))
        );
    }

    #[test]
    fn test_recording_emitter_records_in_order() {
        let mut emitter = RecordingEmitter::new();
        emitter.press(Key::Char('a')).unwrap();
        emitter.release(Key::Char('a')).unwrap();

        assert_eq!(
            emitter.get_emitted(),
            vec![Emitted::Down(Key::Char('a')), Emitted::Up(Key::Char('a'))]
        );
    }

    #[test]
    fn test_recording_emitter_failure() {
        let mut emitter = RecordingEmitter::new();
        emitter.set_fail(true);

        assert!(matches!(
            emitter.press(Key::Char('a')),
            Err(KeybridgeError::KeyEmitter(_))
        ));
        assert!(emitter.get_emitted().is_empty());
    }
}
