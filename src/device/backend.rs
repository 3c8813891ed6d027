//! Trait abstraction for HID enumeration and report reading to enable testing

use hidapi::{HidApi, HidDevice};

use crate::error::{KeybridgeError, Result};

/// Identity reported by an enumerated HID device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: Option<String>,
}

/// Trait for reading raw input reports from an opened device
pub trait ReportSource: Send {
    /// Read one report into `buf`, waiting at most `timeout_ms`.
    ///
    /// Returns the report length, or 0 if the timeout expired.
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// Trait for HID device enumeration
pub trait HidBackend {
    type Device: ReportSource + 'static;

    /// Number of devices found by the last enumeration
    fn device_count(&self) -> usize;

    /// Query the identity of device `index`. May fail for devices that are
    /// not ready or refuse the query.
    fn identity(&self, index: usize) -> Result<DeviceIdentity>;

    /// Open device `index` for reading.
    fn open(&self, index: usize) -> Result<Self::Device>;
}

/// `hidapi`-backed enumeration
pub struct HidApiBackend {
    api: HidApi,
}

impl std::fmt::Debug for HidApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidApiBackend")
            .field("device_count", &self.device_count())
            .finish_non_exhaustive()
    }
}

impl HidApiBackend {
    /// Initialize the HID API and enumerate attached devices.
    ///
    /// # Errors
    ///
    /// Returns `Hid` if the platform HID library cannot be initialized.
    pub fn new() -> Result<Self> {
        let api = HidApi::new()
            .map_err(|e| KeybridgeError::Hid(format!("Failed to initialize HID API: {}", e)))?;
        Ok(Self { api })
    }

    fn info(&self, index: usize) -> Result<&hidapi::DeviceInfo> {
        self.api
            .device_list()
            .nth(index)
            .ok_or_else(|| KeybridgeError::DeviceQuery(format!("no device at index {}", index)))
    }
}

impl HidBackend for HidApiBackend {
    type Device = HidReportSource;

    fn device_count(&self) -> usize {
        self.api.device_list().count()
    }

    fn identity(&self, index: usize) -> Result<DeviceIdentity> {
        let info = self.info(index)?;
        Ok(DeviceIdentity {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            product_name: info.product_string().map(str::to_owned),
        })
    }

    fn open(&self, index: usize) -> Result<Self::Device> {
        let info = self.info(index)?;
        let device = info
            .open_device(&self.api)
            .map_err(|e| KeybridgeError::DeviceOpen(e.to_string()))?;
        Ok(HidReportSource { device })
    }
}

/// Wrapper around `hidapi::HidDevice` that implements ReportSource
///
/// The device handle is closed when this value is dropped.
pub struct HidReportSource {
    device: HidDevice,
}

impl ReportSource for HidReportSource {
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| KeybridgeError::Hid(format!("Failed to read report: {}", e)))
    }
}
