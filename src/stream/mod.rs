//! Stream configurator.
//!
//! Everything that happens between opening a session and the first stream
//! read:
//!
//! - [`waveform`]: declare and load stream-out buffers
//! - [`profile`]: variant-specific input register tables
//! - [`config`]: scan rate, batch size, scan list; start and stop
//! - [`channel`]: channel specs and scan-list ordering

pub mod channel;
pub mod config;
pub mod profile;
pub mod waveform;

pub use channel::{ChannelSpec, Direction, ScanList};
pub use config::{start, stop, StreamConfig, StreamConfigBuilder};
pub use profile::{configure_inputs, DeviceProfile};
pub use waveform::{buffer_status, declare_output_stream, load_waveform, WaveformBuffer};
