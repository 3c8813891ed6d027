//! # Keyboard Listener
//!
//! Global keyboard observation on a background thread.
//!
//! The host keyboard state is polled through `device_query` and every change
//! in the set of held keys is turned into press/release [`KeyEvent`]s that are
//! pushed onto the session channel.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use device_query::{DeviceQuery, DeviceState, Keycode};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use super::{Key, NamedKey};
use crate::bridge::SessionEvent;
use crate::error::Result;

/// Whether a key went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// A host keyboard transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self { key, kind: KeyEventKind::Press }
    }

    pub fn release(key: Key) -> Self {
        Self { key, kind: KeyEventKind::Release }
    }
}

/// Snapshot access to the keys currently held on the host keyboard
pub trait KeyStateSource {
    fn held_keys(&self) -> Vec<Key>;
}

/// [`KeyStateSource`] backed by `device_query`
pub struct DeviceQuerySource {
    state: DeviceState,
}

impl DeviceQuerySource {
    /// Connect to the host keyboard state.
    ///
    /// # Errors
    ///
    /// Returns `KeyboardUnavailable` if no keyboard state backend can be
    /// opened (for example no X display on Linux).
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self> {
        let state = DeviceState::checked_new().ok_or_else(|| {
            crate::error::KeybridgeError::KeyboardUnavailable("cannot connect to the X display".to_string())
        })?;
        Ok(Self { state })
    }

    /// Connect to the host keyboard state.
    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Result<Self> {
        Ok(Self { state: DeviceState::new() })
    }
}

impl KeyStateSource for DeviceQuerySource {
    fn held_keys(&self) -> Vec<Key> {
        self.state
            .get_keys()
            .into_iter()
            .filter_map(from_keycode)
            .collect()
    }
}

/// Maps a `device_query` keycode into the key vocabulary.
///
/// Letters and digits become lowercase characters, modifiers keep their side.
/// Keys outside the vocabulary are dropped.
fn from_keycode(code: Keycode) -> Option<Key> {
    use device_query::Keycode as DK;

    let named = match code {
        DK::A => return Some(Key::Char('a')),
        DK::B => return Some(Key::Char('b')),
        DK::C => return Some(Key::Char('c')),
        DK::D => return Some(Key::Char('d')),
        DK::E => return Some(Key::Char('e')),
        DK::F => return Some(Key::Char('f')),
        DK::G => return Some(Key::Char('g')),
        DK::H => return Some(Key::Char('h')),
        DK::I => return Some(Key::Char('i')),
        DK::J => return Some(Key::Char('j')),
        DK::K => return Some(Key::Char('k')),
        DK::L => return Some(Key::Char('l')),
        DK::M => return Some(Key::Char('m')),
        DK::N => return Some(Key::Char('n')),
        DK::O => return Some(Key::Char('o')),
        DK::P => return Some(Key::Char('p')),
        DK::Q => return Some(Key::Char('q')),
        DK::R => return Some(Key::Char('r')),
        DK::S => return Some(Key::Char('s')),
        DK::T => return Some(Key::Char('t')),
        DK::U => return Some(Key::Char('u')),
        DK::V => return Some(Key::Char('v')),
        DK::W => return Some(Key::Char('w')),
        DK::X => return Some(Key::Char('x')),
        DK::Y => return Some(Key::Char('y')),
        DK::Z => return Some(Key::Char('z')),
        DK::Key0 => return Some(Key::Char('0')),
        DK::Key1 => return Some(Key::Char('1')),
        DK::Key2 => return Some(Key::Char('2')),
        DK::Key3 => return Some(Key::Char('3')),
        DK::Key4 => return Some(Key::Char('4')),
        DK::Key5 => return Some(Key::Char('5')),
        DK::Key6 => return Some(Key::Char('6')),
        DK::Key7 => return Some(Key::Char('7')),
        DK::Key8 => return Some(Key::Char('8')),
        DK::Key9 => return Some(Key::Char('9')),
        DK::LControl => NamedKey::CtrlLeft,
        DK::RControl => NamedKey::CtrlRight,
        DK::LShift => NamedKey::ShiftLeft,
        DK::RShift => NamedKey::ShiftRight,
        DK::LAlt => NamedKey::AltLeft,
        DK::RAlt => NamedKey::AltRight,
        DK::LMeta => NamedKey::CmdLeft,
        DK::RMeta => NamedKey::CmdRight,
        DK::Escape => NamedKey::Esc,
        DK::Enter => NamedKey::Enter,
        DK::Space => NamedKey::Space,
        DK::Tab => NamedKey::Tab,
        DK::Backspace => NamedKey::Backspace,
        DK::CapsLock => NamedKey::CapsLock,
        DK::Delete => NamedKey::Delete,
        DK::Home => NamedKey::Home,
        DK::End => NamedKey::End,
        DK::PageUp => NamedKey::PageUp,
        DK::PageDown => NamedKey::PageDown,
        DK::Up => NamedKey::Up,
        DK::Down => NamedKey::Down,
        DK::Left => NamedKey::Left,
        DK::Right => NamedKey::Right,
        DK::F1 => NamedKey::F1,
        DK::F2 => NamedKey::F2,
        DK::F3 => NamedKey::F3,
        DK::F4 => NamedKey::F4,
        DK::F5 => NamedKey::F5,
        DK::F6 => NamedKey::F6,
        DK::F7 => NamedKey::F7,
        DK::F8 => NamedKey::F8,
        DK::F9 => NamedKey::F9,
        DK::F10 => NamedKey::F10,
        DK::F11 => NamedKey::F11,
        DK::F12 => NamedKey::F12,
        DK::F13 => NamedKey::F13,
        DK::F14 => NamedKey::F14,
        DK::F15 => NamedKey::F15,
        DK::F16 => NamedKey::F16,
        DK::F17 => NamedKey::F17,
        DK::F18 => NamedKey::F18,
        DK::F19 => NamedKey::F19,
        DK::F20 => NamedKey::F20,
        DK::Insert => NamedKey::Insert,
        _ => return None,
    };
    Some(Key::Named(named))
}

/// Returns true if the listener can report `key` being held.
///
/// `device_query` has no keycodes for these system keys.
pub fn is_observable(key: NamedKey) -> bool {
    !matches!(
        key,
        NamedKey::Menu
            | NamedKey::NumLock
            | NamedKey::Pause
            | NamedKey::PrintScreen
            | NamedKey::ScrollLock
    )
}

/// Turns successive held-key snapshots into press/release events.
#[derive(Debug, Default)]
pub struct KeyStateDiff {
    last_keys: BTreeSet<Key>,
}

impl KeyStateDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `held` with the previous snapshot.
    ///
    /// Releases are reported before presses, each group in key order, so a
    /// key let go within the same poll never counts as held at a key-down.
    pub fn update(&mut self, held: impl IntoIterator<Item = Key>) -> Vec<KeyEvent> {
        let current: BTreeSet<Key> = held.into_iter().collect();

        let mut events: Vec<KeyEvent> = self
            .last_keys
            .difference(&current)
            .map(|key| KeyEvent::release(*key))
            .collect();
        events.extend(
            current
                .difference(&self.last_keys)
                .map(|key| KeyEvent::press(*key)),
        );

        self.last_keys = current;
        events
    }
}

/// Background keyboard polling thread
///
/// Stopped and joined by [`KeyboardListener::stop`] or on drop.
#[derive(Debug)]
pub struct KeyboardListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardListener {
    /// Start polling on a new thread.
    ///
    /// `make_source` runs on the listener thread, so the source itself does
    /// not have to be `Send`. If it fails, the error is logged and the
    /// thread ends; the session keeps running without manual unlock.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn<F, S>(
        make_source: F,
        poll_interval: Duration,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: KeyStateSource,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || {
                let source = match make_source() {
                    Ok(source) => source,
                    Err(e) => {
                        error!("Keyboard listener unavailable, manual unlock will not work: {}", e);
                        return;
                    }
                };
                let mut diff = KeyStateDiff::new();

                while !thread_stop.load(Ordering::Acquire) {
                    for event in diff.update(source.held_keys()) {
                        if events.send(SessionEvent::Key(event)).is_err() {
                            debug!("Session channel closed, keyboard listener exiting");
                            return;
                        }
                    }
                    thread::sleep(poll_interval);
                }
            })?;

        info!("Keyboard listener started (polling every {:?})", poll_interval);
        Ok(Self { stop, handle: Some(handle) })
    }

    /// Returns true while the polling thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the polling thread and wait for it to finish.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Keyboard listener thread panicked");
            }
            debug!("Keyboard listener joined");
        }
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}
