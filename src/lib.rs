//! # ljstream
//!
//! Synchronized stream-in/stream-out acquisition for LabJack T-series
//! devices. A run loads a waveform into a stream-out buffer, streams a set of
//! analog inputs in lock-step with it, and leaves two artifacts behind: a CSV
//! scan table and a human-readable run log.
//!
//! ## Crate Structure
//!
//! - **`hal`**: The [`Hal`](hal::Hal) trait over the vendor driver's
//!   named-register and stream calls, device identity types, and the
//!   in-memory [`SimulatedDevice`](hal::sim::SimulatedDevice).
//! - **`session`**: [`DeviceSession`](session::DeviceSession), an RAII guard
//!   over one open handle.
//! - **`stream`**: Stream-out waveform loading, per-variant input
//!   configuration, scan-list construction, start/stop.
//! - **`acquisition`**: The batch read loop, statistics, and
//!   [`run_acquisition`], the only entry point most callers need.
//! - **`output`**: Scan sinks (buffered, incremental, forwarding) and the
//!   run-log writer.
//! - **`config`**: Figment-layered [`Settings`](config::Settings).
//! - **`error`**: Error types for each layer.
//! - **`tracing_init`**: Subscriber setup for the binary.
//!
//! ## Example
//!
//! ```no_run
//! use ljstream::config::Settings;
//! use ljstream::hal::sim::{SimConfig, SimulatedDevice};
//! use ljstream::{run_acquisition, AcquisitionRequest};
//!
//! let device = SimulatedDevice::new(SimConfig::default());
//! let request = AcquisitionRequest::new("/tmp/run", 10, Settings::default());
//! let result = run_acquisition(&device, &request);
//! println!("{}", result.message);
//! ```

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod output;
pub mod session;
pub mod stream;
pub mod tracing_init;

pub use acquisition::{
    run_acquisition, AcquisitionRequest, AcquisitionResult, AcquisitionStats, CancellationToken,
    ScanBatch, ScanRecord,
};
pub use error::{AcquisitionError, ConfigError, DeviceError, OutputError};
