//! # Bridge Module
//!
//! Coordinates controller reports, host keyboard events and key synthesis.
//!
//! This module handles:
//! - Detecting button transitions between HID reports ([`report`])
//! - The press lock shared by both event paths ([`lock`])
//! - Unlocking through a keyboard hotkey combination ([`unlock`])
//! - Forwarding presses/releases to the [`KeyEmitter`]
//!
//! ## Lock Model
//!
//! Forwarding a press takes the lock; while locked, further presses from any
//! button are ignored. Releases are always forwarded so a held key is never
//! left stuck down. Holding the unlock combination frees the lock.

pub mod lock;
pub mod report;
pub mod unlock;

use tracing::info;

use crate::config::Config;
use crate::error::{KeybridgeError, Result};
use crate::keys::emitter::KeyEmitter;
use crate::keys::listener::KeyEvent;
use lock::LockGate;
use report::{ButtonEvent, ButtonTransition, ReportDiffEngine};
use unlock::UnlockTracker;

/// Normalized event delivered to the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw HID input report
    Report(Vec<u8>),
    /// Host keyboard transition
    Key(KeyEvent),
    /// A producer hit an unrecoverable error
    Fault(String),
}

/// Owns all mutable session state; fed by one ordered event stream.
pub struct Bridge<E: KeyEmitter> {
    engine: ReportDiffEngine,
    tracker: UnlockTracker,
    gate: LockGate,
    emitter: E,
}

impl<E: KeyEmitter> Bridge<E> {
    pub fn new(config: &Config, emitter: E) -> Self {
        let gate = LockGate::new();
        Self {
            engine: ReportDiffEngine::new(config.buttons.clone()),
            tracker: UnlockTracker::new(config.unlock_keys.clone(), gate.clone()),
            gate,
            emitter,
        }
    }

    pub fn gate(&self) -> &LockGate {
        &self.gate
    }

    /// Dispatches one session event.
    ///
    /// # Errors
    ///
    /// Returns the producer's fault, or a key emitter failure.
    pub fn handle(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Report(report) => self.handle_report(&report),
            SessionEvent::Key(key_event) => {
                self.tracker.handle(key_event);
                Ok(())
            }
            SessionEvent::Fault(reason) => Err(KeybridgeError::Hid(reason)),
        }
    }

    /// Runs a report through the diff engine and acts on each transition.
    pub fn handle_report(&mut self, report: &[u8]) -> Result<()> {
        for event in self.engine.process(report) {
            self.on_button(event)?;
        }
        Ok(())
    }

    fn on_button(&mut self, event: ButtonEvent) -> Result<()> {
        let action = &event.action;
        match event.transition {
            ButtonTransition::Press => {
                if !self.gate.try_lock() {
                    info!("[{}] ignored (locked)", action.name);
                    return Ok(());
                }

                info!("{} pressed", action.name);
                if let Err(e) = self.emitter.press(action.key) {
                    self.gate.unlock();
                    return Err(e);
                }
                info!("HID buttons locked");
            }
            ButtonTransition::Release => {
                info!("{} released", action.name);
                self.emitter.release(action.key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, ButtonConfig, DeviceConfig, KeyboardConfig};
    use crate::keys::emitter::mocks::{Emitted, RecordingEmitter};
    use crate::keys::listener::KeyStateDiff;
    use crate::keys::{Key, NamedKey};
    use std::collections::BTreeMap;
    use unlock::UnlockKeySet;

    const CTRL: Key = Key::Named(NamedKey::Ctrl);
    const ALT: Key = Key::Named(NamedKey::Alt);
    const CTRL_L: Key = Key::Named(NamedKey::CtrlLeft);
    const ALT_L: Key = Key::Named(NamedKey::AltLeft);

    fn test_config() -> Config {
        let button = |byte_index: usize, name: &str, key: char| ButtonConfig {
            byte_index,
            idle_value: 0,
            actions: BTreeMap::from([(
                1,
                Action {
                    name: name.to_string(),
                    key: Key::Char(key),
                },
            )]),
        };

        Config {
            device: DeviceConfig {
                vendor_id: 0x046d,
                product_id: 0xc216,
                report_buffer_size: 64,
                report_read_timeout_ms: 100,
            },
            buttons: vec![button(5, "A", 'a'), button(6, "B", 'b')],
            unlock_keys: UnlockKeySet::new([CTRL, ALT]),
            keyboard: KeyboardConfig { poll_interval_ms: 10 },
        }
    }

    fn report(a: u8, b: u8) -> SessionEvent {
        let mut bytes = vec![0u8; 8];
        bytes[5] = a;
        bytes[6] = b;
        SessionEvent::Report(bytes)
    }

    fn new_bridge() -> (Bridge<RecordingEmitter>, RecordingEmitter) {
        let emitter = RecordingEmitter::new();
        (Bridge::new(&test_config(), emitter.clone()), emitter)
    }

    #[test]
    fn test_press_release_scenario() {
        let (mut bridge, emitter) = new_bridge();

        bridge.handle(report(0, 0)).unwrap();
        assert!(emitter.get_emitted().is_empty());

        bridge.handle(report(1, 0)).unwrap();
        assert_eq!(emitter.get_emitted(), vec![Emitted::Down(Key::Char('a'))]);
        assert!(bridge.gate().is_locked());

        bridge.handle(report(0, 0)).unwrap();
        assert_eq!(
            emitter.get_emitted(),
            vec![Emitted::Down(Key::Char('a')), Emitted::Up(Key::Char('a'))]
        );
        // Release does not unlock
        assert!(bridge.gate().is_locked());
    }

    #[test]
    fn test_press_ignored_while_locked() {
        let (mut bridge, emitter) = new_bridge();

        bridge.handle(report(0, 0)).unwrap();
        bridge.handle(report(1, 0)).unwrap();
        bridge.handle(report(0, 0)).unwrap();
        // Second press of the same button and a press of a different button
        bridge.handle(report(1, 1)).unwrap();

        assert_eq!(
            emitter.get_emitted(),
            vec![Emitted::Down(Key::Char('a')), Emitted::Up(Key::Char('a'))]
        );
    }

    #[test]
    fn test_release_forwarded_while_locked() {
        let (mut bridge, emitter) = new_bridge();

        bridge.handle(report(0, 0)).unwrap();
        // A pressed and forwarded, B pressed and ignored
        bridge.handle(report(1, 0)).unwrap();
        bridge.handle(report(1, 1)).unwrap();
        // Both released: both key-ups are forwarded regardless of lock
        bridge.handle(report(0, 0)).unwrap();

        assert_eq!(
            emitter.get_emitted(),
            vec![
                Emitted::Down(Key::Char('a')),
                Emitted::Up(Key::Char('a')),
                Emitted::Up(Key::Char('b')),
            ]
        );
    }

    #[test]
    fn test_unlock_allows_next_press() {
        let (mut bridge, emitter) = new_bridge();

        bridge.handle(report(0, 0)).unwrap();
        bridge.handle(report(1, 0)).unwrap();
        bridge.handle(report(0, 0)).unwrap();

        bridge.handle(SessionEvent::Key(KeyEvent::press(CTRL_L))).unwrap();
        assert!(bridge.gate().is_locked());
        bridge.handle(SessionEvent::Key(KeyEvent::press(ALT_L))).unwrap();
        assert!(!bridge.gate().is_locked());

        bridge.handle(report(0, 1)).unwrap();
        assert_eq!(emitter.get_emitted().last(), Some(&Emitted::Down(Key::Char('b'))));
        assert!(bridge.gate().is_locked());
    }

    #[test]
    fn test_swapped_modifiers_within_one_poll_stay_locked() {
        let (mut bridge, _emitter) = new_bridge();
        bridge.handle(report(0, 0)).unwrap();
        bridge.handle(report(1, 0)).unwrap();
        assert!(bridge.gate().is_locked());

        // ctrl let go and alt pressed between two polls: never held together
        let mut diff = KeyStateDiff::new();
        for snapshot in [vec![CTRL_L], vec![ALT_L]] {
            for event in diff.update(snapshot) {
                bridge.handle(SessionEvent::Key(event)).unwrap();
            }
        }
        assert!(bridge.gate().is_locked());

        // Holding both does unlock
        for event in diff.update(vec![CTRL_L, ALT_L]) {
            bridge.handle(SessionEvent::Key(event)).unwrap();
        }
        assert!(!bridge.gate().is_locked());
    }

    #[test]
    fn test_first_report_with_pressed_button_is_baseline() {
        let (mut bridge, emitter) = new_bridge();
        bridge.handle(report(1, 0)).unwrap();
        assert!(emitter.get_emitted().is_empty());
        assert!(!bridge.gate().is_locked());
    }

    #[test]
    fn test_fault_event_is_error() {
        let (mut bridge, _emitter) = new_bridge();
        let result = bridge.handle(SessionEvent::Fault("device unplugged".to_string()));
        assert!(matches!(result, Err(KeybridgeError::Hid(_))));
    }

    #[test]
    fn test_failed_press_releases_gate() {
        let (mut bridge, emitter) = new_bridge();
        bridge.handle(report(0, 0)).unwrap();

        emitter.set_fail(true);
        assert!(bridge.handle(report(1, 0)).is_err());
        assert!(!bridge.gate().is_locked());
    }

    #[test]
    fn test_short_report_skips_out_of_range_buttons() {
        let (mut bridge, emitter) = new_bridge();
        bridge.handle(SessionEvent::Report(vec![0; 6])).unwrap();
        // Byte 6 (button B) does not exist; byte 5 still works
        let mut short = vec![0u8; 6];
        short[5] = 1;
        bridge.handle(SessionEvent::Report(short)).unwrap();
        assert_eq!(emitter.get_emitted(), vec![Emitted::Down(Key::Char('a'))]);
    }
}
