//! # Session Module
//!
//! Lifecycle of a running bridge: device discovery, the two event producers,
//! the ordered event loop and guaranteed shutdown.
//!
//! ## Control Flow
//!
//! 1. **Startup** ([`DeviceSession::start`])
//!    - Find and open the configured HID device
//!    - Start the HID report reader thread
//!    - Start the keyboard listener thread
//!
//! 2. **Event Loop** ([`run_until`])
//!    - Reports and key events arrive on one channel, in order
//!    - Each event is applied to the [`Bridge`]
//!    - Ends on the shutdown signal, a producer fault, or a key emitter error
//!
//! 3. **Shutdown** (`Drop for DeviceSession`)
//!    - Close the device and stop the keyboard listener on every exit path

use std::future::Future;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info};

use crate::bridge::{Bridge, SessionEvent};
use crate::config::Config;
use crate::device::backend::{DeviceIdentity, HidBackend};
use crate::device::{open_device, ReportReader};
use crate::error::{KeybridgeError, Result};
use crate::keys::emitter::KeyEmitter;
use crate::keys::listener::{KeyStateSource, KeyboardListener};

/// Opened device plus running listeners.
///
/// Dropping the session closes the device and joins the keyboard listener.
#[derive(Debug)]
pub struct DeviceSession {
    identity: DeviceIdentity,
    reader: ReportReader,
    listener: KeyboardListener,
}

impl DeviceSession {
    /// Open the configured device and start both event producers.
    ///
    /// # Arguments
    ///
    /// * `backend` - HID enumeration to search
    /// * `config` - Loaded configuration
    /// * `make_key_source` - Builds the keyboard state source on the listener thread
    ///
    /// # Returns
    ///
    /// The session guard and the receiving end of the event channel.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no device matches the configured IDs
    /// - `DeviceOpen`: the device could not be opened
    /// - `Io`: a producer thread could not be spawned
    pub fn start<B, F, S>(
        backend: &B,
        config: &Config,
        make_key_source: F,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>)>
    where
        B: HidBackend,
        F: FnOnce() -> Result<S> + Send + 'static,
        S: KeyStateSource,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let (identity, device) =
            open_device(backend, config.device.vendor_id, config.device.product_id)?;

        let reader = ReportReader::spawn(
            device,
            config.device.report_buffer_size,
            config.device.report_read_timeout_ms,
            tx.clone(),
        )?;

        let listener = KeyboardListener::spawn(make_key_source, config.keyboard.poll_interval(), tx)?;

        Ok((
            Self {
                identity,
                reader,
                listener,
            },
            rx,
        ))
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        info!("Closing the device and stopping the keyboard listener...");
        self.reader.stop();
        self.listener.stop();
        info!("Resources released");
    }
}

/// Applies session events to `bridge` until `shutdown` completes.
///
/// # Errors
///
/// - `Hid`: the report reader hit a read error
/// - `KeyEmitter`: a key could not be synthesized
/// - `EventSourcesClosed`: every producer stopped
pub async fn run_until<E, F>(
    bridge: &mut Bridge<E>,
    events: &mut UnboundedReceiver<SessionEvent>,
    shutdown: F,
) -> Result<()>
where
    E: KeyEmitter,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }

            event = events.recv() => match event {
                Some(event) => bridge.handle(event)?,
                None => return Err(KeybridgeError::EventSourcesClosed),
            }
        }
    }
}

/// Completes on Ctrl+C.
///
/// If the signal handler cannot be installed this never completes, leaving
/// shutdown to producer faults.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
