//! Channel specifications and scan-list construction.

use std::fmt;

use crate::hal::registers::stream_out_address;

/// Direction of a channel relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sampled by the device and returned to the host
    Input,
    /// Driven by the device from a stream-out buffer
    Output,
}

/// One channel participating in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    /// Register name, e.g. `"AIN0"` or `"DAC0"`
    pub name: String,
    /// Resolved register address
    pub address: u32,
    /// Input or output
    pub direction: Direction,
    /// Engineering-unit range (±volts for inputs)
    pub range: f64,
}

impl ChannelSpec {
    /// Create an input channel.
    pub fn input(name: impl Into<String>, address: u32, range: f64) -> Self {
        Self {
            name: name.into(),
            address,
            direction: Direction::Input,
            range,
        }
    }

    /// Create an output channel.
    pub fn output(name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            address,
            direction: Direction::Output,
            range: 0.0,
        }
    }

    /// Name of the register holding this channel's range.
    pub fn range_register(&self) -> String {
        format!("{}_RANGE", self.name)
    }
}

/// Ordered list of addresses the device cycles through on every scan.
///
/// Inputs come first, in declared order; stream-out markers follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanList {
    addresses: Vec<u32>,
    n_inputs: usize,
}

impl ScanList {
    /// Build the scan list from declared inputs and stream-out slots.
    pub fn build(inputs: &[ChannelSpec], output_slots: &[u8]) -> Self {
        let addresses = inputs
            .iter()
            .map(|ch| ch.address)
            .chain(output_slots.iter().map(|&slot| stream_out_address(slot)))
            .collect();
        Self {
            addresses,
            n_inputs: inputs.len(),
        }
    }

    /// All addresses, inputs first.
    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }

    /// Number of input entries.
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Number of stream-out entries.
    pub fn n_outputs(&self) -> usize {
        self.addresses.len() - self.n_inputs
    }

    /// Total entries per scan.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl fmt::Display for ScanList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, address) in self.addresses.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", address)?;
        }
        write!(f, "]")
    }
}
