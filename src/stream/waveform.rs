//! Stream-out waveform buffers.
//!
//! A waveform is declared (target, buffer size, enable), loaded (loop size,
//! samples, commit) and then left alone: the device plays it back in step
//! with input scanning for as long as the stream runs.

use tracing::debug;

use super::channel::ChannelSpec;
use crate::error::{ConfigError, DeviceResult};
use crate::hal::registers::STREAM_OUT_SLOTS;
use crate::hal::Hal;
use crate::session::DeviceSession;

/// Bytes one sample occupies in a stream-out buffer.
pub const BYTES_PER_SAMPLE: u32 = 2;

/// Values loaded into a stream-out slot before acquisition starts.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBuffer {
    /// Stream-out slot (0..4)
    pub slot: u8,
    /// Channel the slot drives
    pub target: ChannelSpec,
    /// Device buffer size in bytes (power of two)
    pub capacity_bytes: u32,
    /// Samples in volts, played in order
    pub samples: Vec<f64>,
    /// Repeat the samples indefinitely once started
    pub looping: bool,
}

impl WaveformBuffer {
    /// Validate slot, capacity and sample count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot >= STREAM_OUT_SLOTS {
            return Err(ConfigError::invalid(format!(
                "Stream-out slot {} out of range (0..{})",
                self.slot, STREAM_OUT_SLOTS
            )));
        }
        if !self.capacity_bytes.is_power_of_two() {
            return Err(ConfigError::invalid(format!(
                "Stream-out buffer size {} is not a power of two",
                self.capacity_bytes
            )));
        }
        if self.samples.is_empty() {
            return Err(ConfigError::invalid(format!(
                "Waveform for {} has no samples",
                self.target.name
            )));
        }
        let needed = self.samples.len() as u64 * u64::from(BYTES_PER_SAMPLE);
        if needed > u64::from(self.capacity_bytes) {
            return Err(ConfigError::invalid(format!(
                "{} samples need {} bytes but the buffer holds {}",
                self.samples.len(),
                needed,
                self.capacity_bytes
            )));
        }
        Ok(())
    }

    /// Full name of a per-slot register, e.g. `STREAM_OUT0_TARGET`.
    pub fn register(&self, suffix: &str) -> String {
        format!("STREAM_OUT{}_{}", self.slot, suffix)
    }
}

/// Reserve device memory for the waveform and enable the output stream.
///
/// Must precede [`load_waveform`].
pub fn declare_output_stream<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    waveform: &WaveformBuffer,
) -> DeviceResult<()> {
    session.write(&waveform.register("TARGET"), f64::from(waveform.target.address))?;
    session.write(&waveform.register("BUFFER_SIZE"), f64::from(waveform.capacity_bytes))?;
    session.write(&waveform.register("ENABLE"), 1.0)?;
    debug!(
        slot = waveform.slot,
        target = %waveform.target.name,
        capacity = waveform.capacity_bytes,
        "Declared stream-out buffer"
    );
    Ok(())
}

/// Write the samples into the declared buffer and commit them for playback.
pub fn load_waveform<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    waveform: &WaveformBuffer,
) -> DeviceResult<()> {
    let loop_size = if waveform.looping {
        waveform.samples.len()
    } else {
        0
    };
    session.write(&waveform.register("LOOP_SIZE"), loop_size as f64)?;

    let buffer = waveform.register("BUFFER_F32");
    for &sample in &waveform.samples {
        session.write(&buffer, sample)?;
    }

    session.write(&waveform.register("SET_LOOP"), 1.0)?;
    debug!(
        slot = waveform.slot,
        samples = waveform.samples.len(),
        looping = waveform.looping,
        "Loaded stream-out waveform"
    );
    Ok(())
}

/// Read back the slot's buffer status.
pub fn buffer_status<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    waveform: &WaveformBuffer,
) -> DeviceResult<f64> {
    session.read(&waveform.register("BUFFER_STATUS"))
}
