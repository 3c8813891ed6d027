//! # Press Lock
//!
//! Process-wide "a button press is active" flag. The report engine takes the
//! lock when it forwards a press; the unlock tracker releases it when the
//! hotkey combination is held. Both transitions are single compare-exchange
//! operations, so the two writers cannot interleave a read and a write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared lock flag. Clones observe the same state.
///
/// # Examples
///
/// ```
/// use hid_keybridge::bridge::lock::LockGate;
///
/// let gate = LockGate::new();
/// assert!(gate.try_lock());   // first press is forwarded
/// assert!(!gate.try_lock());  // further presses are suppressed
/// assert!(gate.unlock());     // hotkey releases the lock
/// assert!(!gate.is_locked());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LockGate {
    locked: Arc<AtomicBool>,
}

impl LockGate {
    /// Creates an unlocked gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Takes the lock if it is free. Returns false if it was already held.
    #[must_use]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the lock. Returns true only if it was held.
    pub fn unlock(&self) -> bool {
        self.locked
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
