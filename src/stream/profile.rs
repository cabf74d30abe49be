//! Per-variant input configuration tables.
//!
//! When streaming, negative channels and ranges are set per analog input, but
//! the stream has one settling time and one resolution index. Which registers
//! exist depends on the device family:
//!
//! - T4 has no global negative-channel register and no trigger/clock
//!   selection to reset.
//! - T7 and everything else takes `AIN_ALL_NEGATIVE_CH` and needs triggered
//!   stream disabled and the internal clock selected.

use tracing::debug;

use super::config::StreamConfig;
use crate::error::DeviceResult;
use crate::hal::{DeviceType, Hal};
use crate::session::DeviceSession;

/// Input configuration profile for a device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    /// T4
    T4,
    /// T7 and every unknown family
    General,
}

impl DeviceProfile {
    /// Pick the profile for a device family. Unknown families get
    /// [`DeviceProfile::General`].
    pub fn for_device(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::T4 => Self::T4,
            _ => Self::General,
        }
    }

    /// Registers written one at a time before the input table.
    pub fn preamble(self) -> &'static [(&'static str, f64)] {
        match self {
            Self::T4 => &[],
            Self::General => &[("STREAM_TRIGGER_INDEX", 0.0), ("STREAM_CLOCK_SOURCE", 0.0)],
        }
    }

    /// The multi-register write configuring the inputs.
    pub fn input_frames(self, config: &StreamConfig) -> Vec<(String, f64)> {
        let mut frames = Vec::with_capacity(config.inputs.len() + 3);
        if self == Self::General {
            frames.push(("AIN_ALL_NEGATIVE_CH".to_string(), config.negative_channel));
        }
        frames.extend(config.inputs.iter().map(|ch| (ch.range_register(), ch.range)));
        frames.push(("STREAM_SETTLING_US".to_string(), config.settling_us));
        frames.push((
            "STREAM_RESOLUTION_INDEX".to_string(),
            f64::from(config.resolution_index),
        ));
        frames
    }
}

impl std::fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::T4 => write!(f, "T4"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Apply the profile's register table to the device.
///
/// Returns the frames of the multi-register write, for the acquisition log.
pub fn configure_inputs<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    config: &StreamConfig,
    profile: DeviceProfile,
) -> DeviceResult<Vec<(String, f64)>> {
    for &(name, value) in profile.preamble() {
        session.write(name, value)?;
    }

    let frames = profile.input_frames(config);
    session.write_many(&frames)?;

    debug!(%profile, frames = frames.len(), "Configured stream inputs");
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::GND;
    use crate::stream::ChannelSpec;

    fn config() -> StreamConfig {
        StreamConfig::builder()
            .inputs(vec![
                ChannelSpec::input("AIN0", 0, 10.0),
                ChannelSpec::input("AIN2", 4, 1.0),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_profile_selection() {
        assert_eq!(DeviceProfile::for_device(DeviceType::T4), DeviceProfile::T4);
        assert_eq!(DeviceProfile::for_device(DeviceType::T7), DeviceProfile::General);
        assert_eq!(
            DeviceProfile::for_device(DeviceType::Other(99)),
            DeviceProfile::General
        );
    }

    #[test]
    fn test_t4_table() {
        let frames = DeviceProfile::T4.input_frames(&config());
        let names: Vec<&str> = frames.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "AIN0_RANGE",
                "AIN2_RANGE",
                "STREAM_SETTLING_US",
                "STREAM_RESOLUTION_INDEX"
            ]
        );
        assert_eq!(frames[1].1, 1.0);
        assert!(DeviceProfile::T4.preamble().is_empty());
    }

    #[test]
    fn test_general_table() {
        let frames = DeviceProfile::General.input_frames(&config());
        assert_eq!(frames[0], ("AIN_ALL_NEGATIVE_CH".to_string(), GND));
        assert_eq!(frames.len(), 5);
        assert_eq!(DeviceProfile::General.preamble().len(), 2);
    }
}
