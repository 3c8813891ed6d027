//! # Device Module
//!
//! HID controller discovery and report reading.
//!
//! This module handles:
//! - Enumerating HID devices and matching the configured vendor/product ID
//! - Skipping devices that fail to report their identity
//! - Opening the matched device
//! - Reading raw input reports on a background thread and pushing them onto
//!   the session channel

pub mod backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::bridge::SessionEvent;
use crate::error::{KeybridgeError, Result};
use backend::{DeviceIdentity, HidBackend, ReportSource};

/// Finds the first device whose identity matches `vendor_id`/`product_id`.
///
/// Devices whose identity query fails are skipped.
///
/// # Returns
///
/// The enumeration index and identity of the matched device.
///
/// # Errors
///
/// - `DeviceNotFound`: no enumerated device matched
pub fn find_device<B: HidBackend>(
    backend: &B,
    vendor_id: u16,
    product_id: u16,
) -> Result<(usize, DeviceIdentity)> {
    let count = backend.device_count();
    debug!("Enumerated {} HID devices", count);

    for index in 0..count {
        let identity = match backend.identity(index) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Skipping HID device #{}: {}", index, e);
                continue;
            }
        };

        debug!(
            "Found HID device #{}: {} (vendor: 0x{:04x}, product: 0x{:04x})",
            index,
            identity.product_name.as_deref().unwrap_or("unnamed"),
            identity.vendor_id,
            identity.product_id
        );

        if identity.vendor_id == vendor_id && identity.product_id == product_id {
            return Ok((index, identity));
        }
    }

    Err(KeybridgeError::DeviceNotFound {
        vendor_id,
        product_id,
    })
}

/// Finds and opens the configured controller.
///
/// # Errors
///
/// - `DeviceNotFound`: no enumerated device matched
/// - `DeviceOpen`: the matched device could not be opened (in use, permissions)
pub fn open_device<B: HidBackend>(
    backend: &B,
    vendor_id: u16,
    product_id: u16,
) -> Result<(DeviceIdentity, B::Device)> {
    let (index, identity) = find_device(backend, vendor_id, product_id)?;
    let device = backend.open(index)?;

    info!(
        "Device opened: {} (Vendor ID: 0x{:04x}, Product ID: 0x{:04x})",
        identity.product_name.as_deref().unwrap_or("unnamed"),
        identity.vendor_id,
        identity.product_id
    );
    Ok((identity, device))
}

/// Background HID report reading thread
///
/// Owns the opened device; the device is closed when the thread exits.
#[derive(Debug)]
pub struct ReportReader {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReportReader {
    /// Start reading reports from `device` on a new thread.
    ///
    /// Each non-empty report is sent as [`SessionEvent::Report`]. A read
    /// error is sent as [`SessionEvent::Fault`] and ends the thread.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn<D: ReportSource + 'static>(
        mut device: D,
        buffer_size: usize,
        read_timeout_ms: u64,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let timeout_ms = i32::try_from(read_timeout_ms).unwrap_or(i32::MAX);

        let handle = thread::Builder::new()
            .name("hid-reader".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; buffer_size];

                while !thread_stop.load(Ordering::Acquire) {
                    match device.read_report(&mut buf, timeout_ms) {
                        Ok(0) => continue,
                        Ok(len) => {
                            if events.send(SessionEvent::Report(buf[..len].to_vec())).is_err() {
                                debug!("Session channel closed, HID reader exiting");
                                return;
                            }
                        }
                        Err(e) => {
                            error!("HID read failed: {}", e);
                            let _ = events.send(SessionEvent::Fault(e.to_string()));
                            return;
                        }
                    }
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Returns true while the reading thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the reading thread, wait for it and close the device.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("HID reader thread panicked");
            }
            debug!("HID device closed");
        }
    }
}

impl Drop for ReportReader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::backend::mocks::{MockBackend, MockDevice};
    use super::*;
    use tokio::sync::mpsc;

    const VID: u16 = 0x046d;
    const PID: u16 = 0xc216;

    #[test]
    fn test_find_matching_device() {
        let backend = MockBackend::new(vec![
            MockDevice::new(0x1234, 0x0001),
            MockDevice::new(VID, PID),
        ]);

        let (index, identity) = find_device(&backend, VID, PID).unwrap();
        assert_eq!(index, 1);
        assert_eq!(identity.vendor_id, VID);
        assert_eq!(identity.product_id, PID);
    }

    #[test]
    fn test_find_skips_device_failing_query() {
        let backend = MockBackend::new(vec![
            MockDevice::failing_query("device not ready"),
            MockDevice::new(VID, PID),
        ]);

        let (identity, _device) = open_device(&backend, VID, PID).unwrap();
        assert_eq!(identity.vendor_id, VID);
    }

    #[test]
    fn test_find_picks_first_match() {
        let first = MockDevice::new(VID, PID);
        let second = MockDevice::new(VID, PID);
        let backend = MockBackend::new(vec![first, second]);

        let (index, _) = find_device(&backend, VID, PID).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_vendor_match_alone_is_not_enough() {
        let backend = MockBackend::new(vec![MockDevice::new(VID, 0x0001)]);
        let result = find_device(&backend, VID, PID);
        assert!(matches!(
            result,
            Err(KeybridgeError::DeviceNotFound { vendor_id: VID, product_id: PID })
        ));
    }

    #[test]
    fn test_no_devices() {
        let backend = MockBackend::default();
        assert!(matches!(
            find_device(&backend, VID, PID),
            Err(KeybridgeError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_open_failure() {
        let backend = MockBackend::new(vec![MockDevice::new(VID, PID).with_open_error("busy")]);
        assert!(matches!(
            open_device(&backend, VID, PID),
            Err(KeybridgeError::DeviceOpen(_))
        ));
    }

    #[test]
    fn test_reader_forwards_reports() {
        let mock = MockDevice::new(VID, PID);
        mock.push_report(&[1, 2, 3]);
        mock.push_report(&[1, 2, 4]);
        let backend = MockBackend::new(vec![mock.clone()]);
        let (_, device) = open_device(&backend, VID, PID).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reader = ReportReader::spawn(device, 64, 5, tx).unwrap();

        assert_eq!(rx.blocking_recv(), Some(SessionEvent::Report(vec![1, 2, 3])));
        assert_eq!(rx.blocking_recv(), Some(SessionEvent::Report(vec![1, 2, 4])));

        reader.stop();
        assert!(!reader.is_running());
        assert!(mock.is_dropped(), "device should be closed after stop");
    }

    #[test]
    fn test_reader_truncates_to_buffer_size() {
        let mock = MockDevice::new(VID, PID);
        mock.push_report(&[9; 16]);
        let backend = MockBackend::new(vec![mock]);
        let (_, device) = open_device(&backend, VID, PID).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _reader = ReportReader::spawn(device, 4, 5, tx).unwrap();

        assert_eq!(rx.blocking_recv(), Some(SessionEvent::Report(vec![9; 4])));
    }

    #[test]
    fn test_reader_reports_fault_and_exits() {
        let mock = MockDevice::new(VID, PID);
        mock.push_read_error("device disconnected");
        let backend = MockBackend::new(vec![mock.clone()]);
        let (_, device) = open_device(&backend, VID, PID).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reader = ReportReader::spawn(device, 64, 5, tx).unwrap();

        assert!(matches!(rx.blocking_recv(), Some(SessionEvent::Fault(_))));
        // Thread has exited and dropped its sender
        assert_eq!(rx.blocking_recv(), None);
        reader.stop();
        assert!(mock.is_dropped());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_enumerate_real_hardware() {
        let backend = backend::HidApiBackend::new().expect("HID API unavailable");
        for index in 0..backend.device_count() {
            if let Ok(identity) = backend.identity(index) {
                println!("{:?}", identity);
            }
        }
    }
}
