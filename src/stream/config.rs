//! Negotiated stream parameters.

use std::time::Duration;

use tracing::info;

use super::channel::{ChannelSpec, Direction, ScanList};
use crate::error::{ConfigError, DeviceResult};
use crate::hal::{Hal, GND};
use crate::session::DeviceSession;

/// Configuration for a stream-in/stream-out acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Input channels, in demultiplexing order
    pub inputs: Vec<ChannelSpec>,
    /// Stream-out slots appended to the scan list
    pub output_slots: Vec<u8>,
    /// Requested scan rate in scans/second
    pub scan_rate: f64,
    /// Scans returned by each stream read
    pub scans_per_read: usize,
    /// Stream settling time in microseconds (0 = device default)
    pub settling_us: f64,
    /// Stream resolution index (0 = device default)
    pub resolution_index: u32,
    /// `AIN_ALL_NEGATIVE_CH` value on devices that take one
    pub negative_channel: f64,
    /// Upper bound on a single blocking read
    pub read_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_slots: Vec::new(),
            scan_rate: 2000.0,
            scans_per_read: 60,
            settling_us: 0.0,
            resolution_index: 0,
            negative_channel: GND,
            read_timeout: None,
        }
    }
}

impl StreamConfig {
    /// Create a new builder for stream configuration.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::invalid("At least one input channel is required"));
        }
        if self.inputs.iter().any(|ch| ch.direction != Direction::Input) {
            return Err(ConfigError::invalid("Output channel listed as an input"));
        }
        if !(self.scan_rate > 0.0 && self.scan_rate.is_finite()) {
            return Err(ConfigError::invalid(format!(
                "Invalid scan rate: {}",
                self.scan_rate
            )));
        }
        if self.scans_per_read == 0 {
            return Err(ConfigError::invalid("Scans per read must be greater than 0"));
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::invalid("Read timeout must be greater than 0"));
        }
        Ok(())
    }

    /// The scan list the device cycles through.
    pub fn scan_list(&self) -> ScanList {
        ScanList::build(&self.inputs, &self.output_slots)
    }

    /// Number of input channels.
    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of valid input samples in one batch.
    pub fn input_samples_per_read(&self) -> usize {
        self.scans_per_read * self.inputs.len()
    }

    /// Input channel names in declared order.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|ch| ch.name.clone()).collect()
    }

    /// Nominal time the device needs to fill one batch.
    pub fn batch_period(&self) -> Duration {
        Duration::from_secs_f64(self.scans_per_read as f64 / self.scan_rate)
    }
}

/// Builder for StreamConfig.
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Set the input channels.
    pub fn inputs(mut self, inputs: Vec<ChannelSpec>) -> Self {
        self.config.inputs = inputs;
        self
    }

    /// Add one input channel.
    pub fn input(mut self, input: ChannelSpec) -> Self {
        self.config.inputs.push(input);
        self
    }

    /// Set the stream-out slots.
    pub fn output_slots(mut self, slots: &[u8]) -> Self {
        self.config.output_slots = slots.to_vec();
        self
    }

    /// Set the requested scan rate in Hz.
    pub fn scan_rate(mut self, rate: f64) -> Self {
        self.config.scan_rate = rate;
        self
    }

    /// Set the number of scans per read.
    pub fn scans_per_read(mut self, scans: usize) -> Self {
        self.config.scans_per_read = scans;
        self
    }

    /// Set the settling time in microseconds.
    pub fn settling_us(mut self, us: f64) -> Self {
        self.config.settling_us = us;
        self
    }

    /// Set the resolution index.
    pub fn resolution_index(mut self, index: u32) -> Self {
        self.config.resolution_index = index;
        self
    }

    /// Set the negative channel for devices that take one.
    pub fn negative_channel(mut self, value: f64) -> Self {
        self.config.negative_channel = value;
        self
    }

    /// Bound a single read.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<StreamConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Start the synchronized input/output stream.
///
/// Applies the read timeout first when one is configured. Returns the scan
/// rate the device committed to.
pub fn start<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    config: &StreamConfig,
) -> DeviceResult<f64> {
    if let Some(timeout) = config.read_timeout {
        session.set_stream_timeout(timeout)?;
    }

    let scan_list = config.scan_list();
    let achieved = session.stream_start(config.scans_per_read, scan_list.addresses(), config.scan_rate)?;

    info!(
        requested = config.scan_rate,
        achieved,
        scans_per_read = config.scans_per_read,
        n_inputs = scan_list.n_inputs(),
        n_outputs = scan_list.n_outputs(),
        "Started stream"
    );
    Ok(achieved)
}

/// Stop the stream.
pub fn stop<H: Hal + ?Sized>(session: &DeviceSession<'_, H>) -> DeviceResult<()> {
    session.stream_stop()?;
    info!("Stopped stream");
    Ok(())
}
