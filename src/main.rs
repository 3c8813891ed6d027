//! # HID Keybridge
//!
//! Turn USB HID game controller buttons into keyboard presses.
//!
//! Reads raw input reports from the controller named in the configuration,
//! synthesizes the configured keys, and suppresses further presses until the
//! unlock hotkey is held on the keyboard.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use hid_keybridge::bridge::{Bridge, SessionEvent};
use hid_keybridge::config::Config;
use hid_keybridge::device::backend::HidApiBackend;
use hid_keybridge::error::KeybridgeError;
use hid_keybridge::keys::emitter::EnigoEmitter;
use hid_keybridge::keys::listener::DeviceQuerySource;
use hid_keybridge::session::{run_until, shutdown_signal, DeviceSession};

/// Configuration file used when no path argument is given
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Main entry point for HID Keybridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up timestamped logging
///    - Load the configuration (first argument, default `config.json`)
///    - Open the HID controller and start the keyboard listener
///
/// 2. **Main Loop**
///    - Forward button presses/releases as key events until Ctrl+C
///
/// 3. **Shutdown**
///    - Close the device and stop the keyboard listener on every exit path
///
/// Fatal startup errors wait for Enter (when run interactively) so the
/// message stays visible, then exit with a non-zero status.
///
/// # Examples
///
/// ```bash
/// hid-keybridge ./config.json
/// ```
///
/// Expected output:
/// ```text
/// 14:02:11  INFO hid_keybridge: HID Keybridge v0.1.0 starting...
/// 14:02:11  INFO hid_keybridge::device: Device opened: Gamepad F310 (Vendor ID: 0x046d, Product ID: 0xc216)
/// 14:02:11  INFO hid_keybridge: Press [alt, ctrl] to unlock controller emulation
/// 14:02:14  INFO hid_keybridge::bridge: A pressed
/// 14:02:14  INFO hid_keybridge::bridge: HID buttons locked
/// ```
#[tokio::main]
async fn main() -> ExitCode {
    let log_guard = init_logging();

    info!("HID Keybridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let (session, mut events, mut bridge) = match start(&config_path) {
        Ok(parts) => parts,
        Err(e) => {
            error!("{:#}", e);
            drop(log_guard);
            wait_for_acknowledgment();
            return ExitCode::FAILURE;
        }
    };

    let result = run_until(&mut bridge, &mut events, shutdown_signal()).await;

    // Closes the device and joins the keyboard listener
    drop(session);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", critical_error_message(e));
            ExitCode::FAILURE
        }
    }
}

/// Formats a runtime fault with its full cause chain.
fn critical_error_message(e: KeybridgeError) -> String {
    format!("Unexpected critical error: {:#}", anyhow::Error::from(e))
}

/// Loads the configuration, opens the device and builds the bridge.
fn start(
    config_path: &Path,
) -> Result<(DeviceSession, UnboundedReceiver<SessionEvent>, Bridge<EnigoEmitter>)> {
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let backend = HidApiBackend::new()?;
    let emitter = EnigoEmitter::new().context("Cannot synthesize keyboard input")?;

    let (session, events) = DeviceSession::start(&backend, &config, DeviceQuerySource::new)
        .context("Check that the controller is connected, not used by another program, and that the IDs in the configuration are correct")?;

    let bridge = Bridge::new(&config, emitter);

    info!("HID controller started");
    info!("Press {} to unlock controller emulation", config.unlock_keys);
    info!("Press Ctrl+C to exit");

    Ok((session, events, bridge))
}

/// Timestamped logging on a non-blocking stdout writer.
///
/// Defaults to `info`; override with `RUST_LOG` (e.g. `RUST_LOG=debug` for
/// report dumps).
fn init_logging() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(io::stdout());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
        .with_writer(writer)
        .init();

    guard
}

/// Keeps a console window open until the user presses Enter.
fn wait_for_acknowledgment() {
    if !io::stdin().is_terminal() {
        return;
    }

    print!("Press Enter to close...");
    let _ = io::stdout().flush();
    let _ = io::stdin().lock().read_line(&mut String::new());
}
