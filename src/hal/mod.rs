//! Hardware abstraction layer.
//!
//! The acquisition pipeline never talks to a vendor library directly. It
//! drives a device through the [`Hal`] trait, which mirrors the named-register
//! and stream primitives of T-series devices: open/close a handle, resolve
//! register names to addresses, read and write named registers, and run a
//! hardware-timed stream.
//!
//! Every operation returns a [`DeviceResult`]. Implementations are expected to
//! use interior mutability where they need it, so the trait takes `&self`
//! throughout; a handle must still only be driven from one logical flow at a
//! time.
//!
//! [`sim::SimulatedDevice`] is the in-tree implementation used by the CLI and
//! the test suite.

pub mod registers;
pub mod sim;

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::DeviceResult;

/// Value reported in place of a sample that was lost to a buffer overflow.
pub const SENTINEL: f64 = -9999.0;

/// Value of `AIN_ALL_NEGATIVE_CH` selecting single-ended (ground) inputs.
pub const GND: f64 = 199.0;

/// Opaque device handle returned by [`Hal::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub i32);

/// Device family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Any device (only meaningful as an open selector)
    Any,
    /// T4
    T4,
    /// T7
    T7,
    /// T8
    T8,
    /// Digit
    Digit,
    /// A family this crate does not know by name
    Other(i32),
}

impl DeviceType {
    /// Convert from the raw vendor constant.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Any,
            4 => Self::T4,
            7 => Self::T7,
            8 => Self::T8,
            200 => Self::Digit,
            other => Self::Other(other),
        }
    }

    /// The raw vendor constant.
    pub fn raw(self) -> i32 {
        match self {
            Self::Any => 0,
            Self::T4 => 4,
            Self::T7 => 7,
            Self::T8 => 8,
            Self::Digit => 200,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::T4 => write!(f, "T4"),
            Self::T7 => write!(f, "T7"),
            Self::T8 => write!(f, "T8"),
            Self::Digit => write!(f, "DIGIT"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ANY" => Ok(Self::Any),
            "T4" => Ok(Self::T4),
            "T7" => Ok(Self::T7),
            "T8" => Ok(Self::T8),
            "DIGIT" => Ok(Self::Digit),
            other => other
                .parse::<i32>()
                .map(Self::from_raw)
                .map_err(|_| format!("Unknown device type '{}'", s)),
        }
    }
}

/// Transport used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Any transport (only meaningful as an open selector)
    Any,
    /// USB
    Usb,
    /// TCP (Ethernet or WiFi)
    Tcp,
    /// Ethernet
    Ethernet,
    /// WiFi
    Wifi,
    /// A transport this crate does not know by name
    Other(i32),
}

impl ConnectionType {
    /// Convert from the raw vendor constant.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Any,
            1 => Self::Usb,
            2 => Self::Tcp,
            3 => Self::Ethernet,
            4 => Self::Wifi,
            other => Self::Other(other),
        }
    }

    /// The raw vendor constant.
    pub fn raw(self) -> i32 {
        match self {
            Self::Any => 0,
            Self::Usb => 1,
            Self::Tcp => 2,
            Self::Ethernet => 3,
            Self::Wifi => 4,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::Usb => write!(f, "USB"),
            Self::Tcp => write!(f, "TCP"),
            Self::Ethernet => write!(f, "ETHERNET"),
            Self::Wifi => write!(f, "WIFI"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ANY" => Ok(Self::Any),
            "USB" => Ok(Self::Usb),
            "TCP" => Ok(Self::Tcp),
            "ETHERNET" => Ok(Self::Ethernet),
            "WIFI" => Ok(Self::Wifi),
            other => other
                .parse::<i32>()
                .map(Self::from_raw)
                .map_err(|_| format!("Unknown connection type '{}'", s)),
        }
    }
}

/// Which device to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelector {
    /// Device family, or [`DeviceType::Any`]
    pub device_type: DeviceType,
    /// Transport, or [`ConnectionType::Any`]
    pub connection_type: ConnectionType,
    /// Serial number, IP address, name, or `"ANY"`
    pub identifier: String,
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Any,
            connection_type: ConnectionType::Any,
            identifier: "ANY".to_string(),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.device_type, self.connection_type, self.identifier
        )
    }
}

/// Identity metadata of an open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleInfo {
    /// Device family
    pub device_type: DeviceType,
    /// Transport in use
    pub connection_type: ConnectionType,
    /// Serial number
    pub serial_number: i32,
    /// IPv4 address as a packed integer (0 over USB)
    pub ip_address: u32,
    /// Port (0 over USB)
    pub port: i32,
    /// Largest packet the connection can carry, in bytes
    pub max_bytes_per_mb: i32,
}

impl HandleInfo {
    /// The IP address in dotted-quad form.
    pub fn ip_string(&self) -> String {
        Ipv4Addr::from(self.ip_address).to_string()
    }
}

/// One batch returned by [`Hal::stream_read`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRead {
    /// Multiplexed samples, `scans_per_read × scan_list.len()` long. Only the
    /// leading `scans_per_read × n_inputs` values are input samples.
    pub data: Vec<f64>,
    /// Scans waiting in the device buffer after this read
    pub device_backlog: u32,
    /// Scans waiting in the host driver buffer after this read
    pub host_backlog: u32,
}

/// Named-register and stream primitives of a measurement device.
pub trait Hal {
    /// Open the first device matching `selector`.
    fn open(&self, selector: &DeviceSelector) -> DeviceResult<Handle>;

    /// Query identity metadata for an open handle.
    fn handle_info(&self, handle: Handle) -> DeviceResult<HandleInfo>;

    /// Resolve a register name (e.g. `"AIN0"`) to its numeric address.
    fn name_to_address(&self, name: &str) -> DeviceResult<u32>;

    /// Write a single named register.
    fn write_name(&self, handle: Handle, name: &str, value: f64) -> DeviceResult<()>;

    /// Write several named registers in one transaction.
    ///
    /// `names` and `values` are paired by position.
    fn write_names(&self, handle: Handle, names: &[String], values: &[f64]) -> DeviceResult<()>;

    /// Read a single named register.
    fn read_name(&self, handle: Handle, name: &str) -> DeviceResult<f64>;

    /// Start a hardware-timed stream over `scan_list`.
    ///
    /// Returns the scan rate the device committed to, which may differ from
    /// `scan_rate`.
    fn stream_start(
        &self,
        handle: Handle,
        scans_per_read: usize,
        scan_list: &[u32],
        scan_rate: f64,
    ) -> DeviceResult<f64>;

    /// Block until one full batch is available and return it.
    fn stream_read(&self, handle: Handle) -> DeviceResult<StreamRead>;

    /// Stop the running stream.
    fn stream_stop(&self, handle: Handle) -> DeviceResult<()>;

    /// Release the handle.
    fn close(&self, handle: Handle) -> DeviceResult<()>;

    /// Bound how long [`Hal::stream_read`] may block.
    ///
    /// The default implementation accepts and ignores the bound.
    fn set_stream_timeout(&self, _handle: Handle, _timeout: Duration) -> DeviceResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_round_trip_raw() {
        assert_eq!(DeviceType::from_raw(4), DeviceType::T4);
        assert_eq!(DeviceType::T7.raw(), 7);
        assert_eq!(DeviceType::from_raw(84), DeviceType::Other(84));
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!("t4".parse::<DeviceType>(), Ok(DeviceType::T4));
        assert_eq!(" ANY ".parse::<DeviceType>(), Ok(DeviceType::Any));
        assert_eq!("7".parse::<DeviceType>(), Ok(DeviceType::T7));
        assert!("T9000".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_connection_type_parse() {
        assert_eq!("usb".parse::<ConnectionType>(), Ok(ConnectionType::Usb));
        assert_eq!("3".parse::<ConnectionType>(), Ok(ConnectionType::Ethernet));
        assert!("serial".parse::<ConnectionType>().is_err());
    }

    #[test]
    fn test_ip_string() {
        let info = HandleInfo {
            device_type: DeviceType::T7,
            connection_type: ConnectionType::Ethernet,
            serial_number: 470010000,
            ip_address: 0xC0A8_0164,
            port: 502,
            max_bytes_per_mb: 1040,
        };
        assert_eq!(info.ip_string(), "192.168.1.100");
    }
}
