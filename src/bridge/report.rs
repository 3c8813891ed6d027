//! # Report Diff Engine
//!
//! Compares successive raw HID input reports and turns configured byte
//! transitions into logical button press/release events.
//!
//! ## Transition Rules
//!
//! For a button watching byte `i` with idle value `V`:
//!
//! | Previous | Current | Event |
//! |----------|---------|-------|
//! | `V` | value with an action | Press (that action) |
//! | value with an action | `V` | Release (that action) |
//! | anything else | | none |
//!
//! The first report only establishes the baseline. A report identical to the
//! previous one is skipped entirely.

use tracing::{debug, info};

use crate::config::{Action, ButtonConfig};

/// Direction of a button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTransition {
    Press,
    Release,
}

/// A logical button event detected between two reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEvent {
    pub transition: ButtonTransition,
    pub byte_index: usize,
    pub action: Action,
}

/// Stateful report comparator.
///
/// Not thread-safe; owned by the single session event loop.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use hid_keybridge::bridge::report::{ButtonTransition, ReportDiffEngine};
/// use hid_keybridge::config::{Action, ButtonConfig};
/// use hid_keybridge::keys::Key;
///
/// let button = ButtonConfig {
///     byte_index: 1,
///     idle_value: 0,
///     actions: BTreeMap::from([(1, Action { name: "A".into(), key: Key::Char('a') })]),
/// };
/// let mut engine = ReportDiffEngine::new(vec![button]);
///
/// assert!(engine.process(&[0, 0]).is_empty()); // baseline
/// let events = engine.process(&[0, 1]);
/// assert_eq!(events[0].transition, ButtonTransition::Press);
/// ```
#[derive(Debug)]
pub struct ReportDiffEngine {
    buttons: Vec<ButtonConfig>,
    last_report: Option<Vec<u8>>,
}

impl ReportDiffEngine {
    pub fn new(buttons: Vec<ButtonConfig>) -> Self {
        Self {
            buttons,
            last_report: None,
        }
    }

    /// The most recently processed report, if any.
    pub fn last_report(&self) -> Option<&[u8]> {
        self.last_report.as_deref()
    }

    /// Feeds one report and returns the detected events in button order.
    pub fn process(&mut self, report: &[u8]) -> Vec<ButtonEvent> {
        let Some(previous) = self.last_report.as_deref() else {
            info!("First report initialized");
            debug!("Initial report: {:?}", report);
            self.last_report = Some(report.to_vec());
            return Vec::new();
        };

        if previous == report {
            return Vec::new();
        }

        log_report_diff(previous, report);

        let events = self
            .buttons
            .iter()
            .filter_map(|button| detect_transition(button, previous, report))
            .collect();

        self.last_report = Some(report.to_vec());
        events
    }
}

/// Checks a single button; out-of-range indices yield no event.
fn detect_transition(button: &ButtonConfig, previous: &[u8], current: &[u8]) -> Option<ButtonEvent> {
    let idx = button.byte_index;
    let (Some(&prev), Some(&cur)) = (previous.get(idx), current.get(idx)) else {
        debug!("byte_index {} outside report (len {}/{}), skipped", idx, previous.len(), current.len());
        return None;
    };

    let (transition, action) = if prev == button.idle_value {
        (ButtonTransition::Press, button.actions.get(&cur)?)
    } else if cur == button.idle_value {
        (ButtonTransition::Release, button.actions.get(&prev)?)
    } else {
        return None;
    };

    Some(ButtonEvent {
        transition,
        byte_index: idx,
        action: action.clone(),
    })
}

fn log_report_diff(previous: &[u8], current: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    debug!("Report changed");
    debug!("  previous: {:?}", previous);
    debug!("  current:  {:?}", current);

    let fmt_byte = |b: Option<&u8>| b.map_or_else(|| "N/A".to_string(), u8::to_string);
    for i in 0..previous.len().max(current.len()) {
        let (prev, cur) = (previous.get(i), current.get(i));
        if prev != cur {
            debug!("  byte {}: previous={}, current={}", i, fmt_byte(prev), fmt_byte(cur));
        }
    }
}
