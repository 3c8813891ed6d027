//! # Unlock Tracker
//!
//! Follows the host keyboard and releases the press lock once every key of
//! the configured unlock combination is held at the same time.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::lock::LockGate;
use crate::keys::listener::{is_observable, KeyEvent, KeyEventKind};
use crate::keys::Key;

/// Keys that must all be held to unlock. Loaded once from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockKeySet {
    keys: BTreeSet<Key>,
}

impl UnlockKeySet {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    /// Required keys the keyboard listener cannot report as held.
    pub fn unobservable(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.iter().filter(|key| match key {
            Key::Named(named) => !is_observable(*named),
            Key::Char(_) => false,
        })
    }

    /// Returns true if `held` covers every required key.
    ///
    /// An empty set is never held, so unlock stays unavailable.
    pub fn is_held_by(&self, held: &BTreeSet<Key>) -> bool {
        !self.keys.is_empty()
            && self
                .keys
                .iter()
                .all(|required| held.iter().any(|key| key.satisfies(required)))
    }
}

impl fmt::Display for UnlockKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Tracks held host keys and unlocks the gate on the unlock combination.
#[derive(Debug)]
pub struct UnlockTracker {
    unlock_keys: UnlockKeySet,
    pressed: BTreeSet<Key>,
    gate: LockGate,
}

impl UnlockTracker {
    pub fn new(unlock_keys: UnlockKeySet, gate: LockGate) -> Self {
        Self {
            unlock_keys,
            pressed: BTreeSet::new(),
            gate,
        }
    }

    /// Applies a keyboard event. Returns true if it unlocked the gate.
    pub fn handle(&mut self, event: KeyEvent) -> bool {
        match event.kind {
            KeyEventKind::Press => self.on_key_down(event.key),
            KeyEventKind::Release => {
                self.on_key_up(event.key);
                false
            }
        }
    }

    /// Records a key-down. Returns true if it unlocked the gate.
    pub fn on_key_down(&mut self, key: Key) -> bool {
        self.pressed.insert(key);

        if self.unlock_keys.is_held_by(&self.pressed) && self.gate.unlock() {
            info!("HID buttons unlocked");
            return true;
        }
        false
    }

    pub fn on_key_up(&mut self, key: Key) {
        if !self.pressed.remove(&key) {
            debug!("Release of '{}' without a recorded press", key);
        }
    }

    pub fn pressed_keys(&self) -> &BTreeSet<Key> {
        &self.pressed
    }
}
