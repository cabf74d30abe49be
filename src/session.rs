//! Device session: one open connection to a measurement device.
//!
//! [`DeviceSession`] wraps a [`Handle`] with RAII semantics. The acquisition
//! routine closes it explicitly with [`DeviceSession::close`] so it can log
//! the outcome; if a session is dropped without that (an early return, a
//! panic in a caller), `Drop` releases the handle instead. Either way the
//! handle is closed exactly once.

use tracing::{debug, info, warn};

use crate::error::DeviceResult;
use crate::hal::{DeviceSelector, DeviceType, Hal, Handle, HandleInfo, StreamRead};

/// An open device handle plus its identity metadata.
pub struct DeviceSession<'a, H: Hal + ?Sized> {
    hal: &'a H,
    handle: Handle,
    info: HandleInfo,
    closed: bool,
}

impl<'a, H: Hal + ?Sized> DeviceSession<'a, H> {
    /// Open the first device matching `selector` and query its identity.
    ///
    /// No retries are attempted. If the identity query fails the handle is
    /// closed before the error is returned.
    pub fn open(hal: &'a H, selector: &DeviceSelector) -> DeviceResult<Self> {
        let handle = hal.open(selector)?;

        let info = match hal.handle_info(handle) {
            Ok(info) => info,
            Err(e) => {
                if let Err(close_err) = hal.close(handle) {
                    warn!(error = %close_err, "Error closing device after failed identity query");
                }
                return Err(e);
            }
        };

        info!(
            device_type = %info.device_type,
            connection = %info.connection_type,
            serial = info.serial_number,
            "Opened device"
        );

        Ok(Self {
            hal,
            handle,
            info,
            closed: false,
        })
    }

    /// The raw handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Identity metadata captured at open.
    pub fn info(&self) -> &HandleInfo {
        &self.info
    }

    /// Device family of the open device.
    pub fn device_type(&self) -> DeviceType {
        self.info.device_type
    }

    /// Human-readable identity summary for the acquisition log.
    pub fn identity_line(&self) -> String {
        format!(
            "Opened a device with Device type: {}, Connection type: {},\n\
             Serial number: {}, IP address: {}, Port: {},\n\
             Max bytes per MB: {}",
            self.info.device_type.raw(),
            self.info.connection_type.raw(),
            self.info.serial_number,
            self.info.ip_string(),
            self.info.port,
            self.info.max_bytes_per_mb
        )
    }

    /// Resolve a register name to its address.
    pub fn address_of(&self, name: &str) -> DeviceResult<u32> {
        self.hal.name_to_address(name)
    }

    /// Write one named register.
    pub fn write(&self, name: &str, value: f64) -> DeviceResult<()> {
        debug!(register = name, value, "Write register");
        self.hal.write_name(self.handle, name, value)
    }

    /// Write several named registers in one transaction.
    pub fn write_many(&self, frames: &[(String, f64)]) -> DeviceResult<()> {
        let (names, values): (Vec<String>, Vec<f64>) = frames.iter().cloned().unzip();
        debug!(frames = frames.len(), "Write registers");
        self.hal.write_names(self.handle, &names, &values)
    }

    /// Read one named register.
    pub fn read(&self, name: &str) -> DeviceResult<f64> {
        self.hal.read_name(self.handle, name)
    }

    /// Start the stream; returns the achieved scan rate.
    pub fn stream_start(
        &self,
        scans_per_read: usize,
        scan_list: &[u32],
        scan_rate: f64,
    ) -> DeviceResult<f64> {
        self.hal
            .stream_start(self.handle, scans_per_read, scan_list, scan_rate)
    }

    /// Block for the next batch.
    pub fn stream_read(&self) -> DeviceResult<StreamRead> {
        self.hal.stream_read(self.handle)
    }

    /// Stop the stream.
    pub fn stream_stop(&self) -> DeviceResult<()> {
        self.hal.stream_stop(self.handle)
    }

    /// Bound how long a stream read may block.
    pub fn set_stream_timeout(&self, timeout: std::time::Duration) -> DeviceResult<()> {
        self.hal.set_stream_timeout(self.handle, timeout)
    }

    /// Close the handle.
    ///
    /// Consumes the session; the handle is released even if the device
    /// reports an error while closing.
    pub fn close(mut self) -> DeviceResult<()> {
        self.closed = true;
        debug!(handle = self.handle.0, "Closing device");
        self.hal.close(self.handle)
    }
}

impl<H: Hal + ?Sized> Drop for DeviceSession<'_, H> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            warn!(handle = self.handle.0, "Device session dropped without close");
            if let Err(e) = self.hal.close(self.handle) {
                warn!(error = %e, "Error closing device on drop");
            }
        }
    }
}

impl<H: Hal + ?Sized> std::fmt::Debug for DeviceSession<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("handle", &self.handle)
            .field("info", &self.info)
            .field("closed", &self.closed)
            .finish()
    }
}
