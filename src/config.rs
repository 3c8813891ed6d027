//! # Configuration Module
//!
//! Handles loading and validating configuration from JSON files.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "TARGET_VENDOR_ID": "0x046d",
//!   "TARGET_PRODUCT_ID": "0xc216",
//!   "BUTTON_CONFIGS": [
//!     { "byte_index": 5, "idle_value": 0,
//!       "actions": { "1": { "name": "A", "key": "a" },
//!                    "2": { "name": "B", "key": "space" } } }
//!   ],
//!   "UNLOCK_KEY_NAMES": ["ctrl", "alt"]
//! }
//! ```
//!
//! Optional keys: `REPORT_BUFFER_SIZE`, `REPORT_READ_TIMEOUT_MS`,
//! `KEYBOARD_POLL_INTERVAL_MS`.

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::bridge::unlock::UnlockKeySet;
use crate::error::{KeybridgeError, Result};
use crate::keys::{Key, NamedKey};

/// Raw configuration file layout
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawConfig {
    target_vendor_id: String,
    target_product_id: String,
    button_configs: Vec<RawButtonConfig>,
    unlock_key_names: Vec<String>,

    #[serde(default = "default_report_buffer_size")]
    report_buffer_size: usize,

    #[serde(default = "default_report_read_timeout_ms")]
    report_read_timeout_ms: u64,

    #[serde(default = "default_keyboard_poll_interval_ms")]
    keyboard_poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
struct RawButtonConfig {
    byte_index: usize,
    idle_value: i64,
    actions: BTreeMap<String, RawAction>,
}

#[derive(Debug, Deserialize, Clone)]
struct RawAction {
    name: String,
    key: String,
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub buttons: Vec<ButtonConfig>,
    pub unlock_keys: UnlockKeySet,
    pub keyboard: KeyboardConfig,
}

/// Target device identity and report reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub report_buffer_size: usize,
    pub report_read_timeout_ms: u64,
}

/// Keyboard listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardConfig {
    pub poll_interval_ms: u64,
}

impl KeyboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One watched report byte and the actions its values trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    pub byte_index: usize,
    pub idle_value: u8,
    pub actions: BTreeMap<u8, Action>,
}

/// A key bound to a report byte value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Display label used in status lines
    pub name: String,
    pub key: Key,
}

// Default value functions
fn default_report_buffer_size() -> usize { 64 }
fn default_report_read_timeout_ms() -> u64 { 100 }
fn default_keyboard_poll_interval_ms() -> u64 { 10 }

impl Config {
    /// Load configuration from a JSON file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - JSON parsing fails or a required key is missing
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hid_keybridge::config::Config;
    ///
    /// let config = Config::load("config.json")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| KeybridgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate configuration from a JSON string
    ///
    /// Unrecognized unlock key names are dropped with a warning.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        let config = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let vendor_id = parse_hex_id(&raw.target_vendor_id).ok_or_else(|| {
            config_error(format!("TARGET_VENDOR_ID '{}' is not a hex u16", raw.target_vendor_id))
        })?;
        let product_id = parse_hex_id(&raw.target_product_id).ok_or_else(|| {
            config_error(format!("TARGET_PRODUCT_ID '{}' is not a hex u16", raw.target_product_id))
        })?;

        let buttons = raw
            .button_configs
            .into_iter()
            .map(ButtonConfig::from_raw)
            .collect::<Result<Vec<_>>>()?;

        let (unlock_keys, unrecognized) = resolve_unlock_keys(&raw.unlock_key_names);
        for name in &unrecognized {
            warn!(
                "Unlock key '{}' is not recognized, check UNLOCK_KEY_NAMES in the configuration",
                name
            );
        }
        if unlock_keys.is_empty() {
            warn!("No valid unlock keys configured, manual unlock will not work");
        }
        for key in unlock_keys.unobservable() {
            warn!(
                "Unlock key '{}' cannot be detected on this keyboard backend, manual unlock will not work",
                key
            );
        }

        Ok(Self {
            device: DeviceConfig {
                vendor_id,
                product_id,
                report_buffer_size: raw.report_buffer_size,
                report_read_timeout_ms: raw.report_read_timeout_ms,
            },
            buttons,
            unlock_keys,
            keyboard: KeyboardConfig {
                poll_interval_ms: raw.keyboard_poll_interval_ms,
            },
        })
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.device.report_buffer_size == 0 || self.device.report_buffer_size > 1024 {
            return Err(config_error("REPORT_BUFFER_SIZE must be between 1 and 1024"));
        }

        if self.device.report_read_timeout_ms == 0 || self.device.report_read_timeout_ms > 1000 {
            return Err(config_error("REPORT_READ_TIMEOUT_MS must be between 1 and 1000"));
        }

        if self.keyboard.poll_interval_ms == 0 || self.keyboard.poll_interval_ms > 1000 {
            return Err(config_error("KEYBOARD_POLL_INTERVAL_MS must be between 1 and 1000"));
        }

        Ok(())
    }
}

impl ButtonConfig {
    fn from_raw(raw: RawButtonConfig) -> Result<Self> {
        let idle_value = u8::try_from(raw.idle_value).map_err(|_| {
            config_error(format!(
                "byte_index {}: idle_value {} must be between 0 and 255",
                raw.byte_index, raw.idle_value
            ))
        })?;

        let mut actions = BTreeMap::new();
        for (value, action) in raw.actions {
            let value: u8 = value.trim().parse().map_err(|_| {
                config_error(format!(
                    "byte_index {}: action value '{}' must be an integer between 0 and 255",
                    raw.byte_index, value
                ))
            })?;

            if action.name.trim().is_empty() {
                return Err(config_error(format!(
                    "byte_index {}: action for value {} has an empty name",
                    raw.byte_index, value
                )));
            }

            let key = Key::parse(&action.key).ok_or_else(|| {
                config_error(format!(
                    "byte_index {}: action '{}' has unknown key '{}'",
                    raw.byte_index, action.name, action.key
                ))
            })?;

            if value == idle_value {
                warn!(
                    "byte_index {}: action '{}' uses the idle value {} and can never fire, ignored",
                    raw.byte_index, action.name, value
                );
                continue;
            }

            actions.insert(value, Action { name: action.name, key });
        }

        Ok(Self {
            byte_index: raw.byte_index,
            idle_value,
            actions,
        })
    }
}

/// Parses a USB vendor/product ID written in hex, with or without `0x`.
///
/// # Examples
///
/// ```
/// use hid_keybridge::config::parse_hex_id;
///
/// assert_eq!(parse_hex_id("0x046d"), Some(0x046d));
/// assert_eq!(parse_hex_id("C216"), Some(0xc216));
/// assert_eq!(parse_hex_id("0x10000"), None);
/// ```
pub fn parse_hex_id(value: &str) -> Option<u16> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if digits.is_empty() {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

/// Resolves unlock key names against the key vocabulary.
///
/// Returns the resolved set and the names that did not resolve.
pub fn resolve_unlock_keys(names: &[String]) -> (UnlockKeySet, Vec<String>) {
    let mut keys = Vec::new();
    let mut unrecognized = Vec::new();

    for name in names {
        match NamedKey::from_name(name) {
            Some(key) => keys.push(Key::Named(key)),
            None => unrecognized.push(name.clone()),
        }
    }

    (UnlockKeySet::new(keys), unrecognized)
}

fn config_error(msg: impl std::fmt::Display) -> KeybridgeError {
    KeybridgeError::Config(serde_json::Error::custom(msg))
}
