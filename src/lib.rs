//! # HID Keybridge Library
//!
//! Turn USB HID game controller buttons into keyboard presses.
//!
//! This library provides the core functionality for watching raw HID input
//! reports, mapping configured byte transitions to synthesized key presses,
//! and gating presses behind a lock that a keyboard hotkey releases.

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod keys;
pub mod session;
