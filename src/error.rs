//! Error types for the acquisition pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`DeviceError`] is what every HAL call returns. It carries the vendor
//!   error code and diagnostic text.
//! - [`ConfigError`] covers settings that fail to load or validate.
//! - [`OutputError`] covers writing the CSV table and the text log.
//! - [`AcquisitionError`] is the taxonomy the acquisition routine records.
//!   Each variant says which stage a failure happened in, which decides
//!   what cleanup still runs.
//!
//! None of these ever unwind out of [`run_acquisition`](crate::run_acquisition).
//! They are converted to log text at the point where they occur.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for HAL operations.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

/// Broad classification of a device-layer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// No device matched the requested type/connection/identifier.
    NotFound,
    /// Transport-level failure (USB/Ethernet/WiFi).
    Communication,
    /// A named register could not be resolved, read or written.
    Register,
    /// Stream start/read/stop failure reported by the device or driver.
    Stream,
    /// A blocking call exceeded its configured timeout.
    Timeout,
    /// The handle is closed or was never opened.
    InvalidHandle,
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "device not found"),
            Self::Communication => write!(f, "communication"),
            Self::Register => write!(f, "register"),
            Self::Stream => write!(f, "stream"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidHandle => write!(f, "invalid handle"),
        }
    }
}

/// Error signal raised by a HAL call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error (code {code}): {message}")]
pub struct DeviceError {
    /// Classification of the failure
    pub kind: DeviceErrorKind,
    /// Vendor error code, 0 when the failure did not come from the device
    pub code: i32,
    /// Vendor diagnostic text
    pub message: String,
}

impl DeviceError {
    /// Create a new device error.
    pub fn new(kind: DeviceErrorKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a stream failure without a vendor code.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Stream, 0, message)
    }

    /// Shorthand for a register failure without a vendor code.
    pub fn register(message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Register, 0, message)
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == DeviceErrorKind::Timeout
    }

    /// Check if this is a "device not found" error.
    pub fn is_not_found(&self) -> bool {
        self.kind == DeviceErrorKind::NotFound
    }
}

/// Errors raised while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The layered settings could not be extracted.
    #[error("Failed to load settings: {0}")]
    Load(Box<figment::Error>),

    /// An explicitly requested settings file does not exist.
    #[error("Settings file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    /// Settings parsed but are semantically invalid.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong
        message: String,
    },
}

impl ConfigError {
    /// Create an [`ConfigError::Invalid`] from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Errors raised while writing the output artifacts.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Filesystem failure.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// CSV serialization failure.
    #[error("CSV error on '{}': {source}", .path.display())]
    Csv {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        source: csv::Error,
    },
}

/// Failure recorded by the acquisition routine, tagged by stage.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Settings were rejected before any device work.
    #[error("Settings rejected: {0}")]
    Settings(#[from] ConfigError),

    /// The device could not be opened. Nothing else is attempted.
    #[error("Connection failed: {0}")]
    Connection(#[source] DeviceError),

    /// A register write/read failed during setup. The stream never starts.
    #[error("Configuration failed: {0}")]
    Configuration(#[source] DeviceError),

    /// Stream start or a stream read failed.
    #[error("Stream failed: {0}")]
    Stream(#[source] DeviceError),

    /// Stopping the stream failed.
    #[error("Stream stop failed: {0}")]
    Stop(#[source] DeviceError),

    /// Closing the device handle failed.
    #[error("Device close failed: {0}")]
    Close(#[source] DeviceError),

    /// Writing an output artifact failed.
    #[error("Output failed: {0}")]
    Output(#[from] OutputError),
}

impl AcquisitionError {
    /// The device error behind this failure, if any.
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Connection(e)
            | Self::Configuration(e)
            | Self::Stream(e)
            | Self::Stop(e)
            | Self::Close(e) => Some(e),
            Self::Settings(_) | Self::Output(_) => None,
        }
    }
}
