//! # Error Types
//!
//! Custom error types for HID Keybridge using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for HID Keybridge
#[derive(Debug, Error)]
pub enum KeybridgeError {
    /// Configuration file could not be read (missing, permissions)
    #[error("Cannot read configuration file '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors (syntax, missing keys, invalid values)
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// No HID device matched the configured identity
    #[error("HID device not found (vendor: 0x{vendor_id:04x}, product: 0x{product_id:04x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Matched device could not be opened (in use, permissions)
    #[error("Failed to open HID device: {0}")]
    DeviceOpen(String),

    /// A device failed to report its identity during enumeration
    #[error("Failed to query HID device: {0}")]
    DeviceQuery(String),

    /// HID API initialization or report read failures
    #[error("HID error: {0}")]
    Hid(String),

    /// Host key synthesis failures
    #[error("Key emitter error: {0}")]
    KeyEmitter(String),

    /// Host keyboard state could not be observed
    #[error("Keyboard state unavailable: {0}")]
    KeyboardUnavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every event producer stopped while the session was still running
    #[error("HID reader and keyboard listener have both stopped")]
    EventSourcesClosed,
}

/// Result type alias for HID Keybridge
pub type Result<T> = std::result::Result<T, KeybridgeError>;
