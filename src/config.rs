//! Run settings.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults (two inputs `AIN0`/`AIN2` at ±10 V, `DAC0` looping a
//!    0..5 V staircase, 2000 scans/s, 60 scans per read)
//! 2. An optional TOML file
//! 3. Environment variables prefixed `LJSTREAM_`, nested keys split on `__`
//!    (e.g. `LJSTREAM_STREAM__SCAN_RATE=5000`)
//!
//! # Example
//! ```no_run
//! use ljstream::config::Settings;
//! use std::path::Path;
//!
//! let settings = Settings::load(Some(Path::new("config/ljstream.toml")))?;
//! println!("{} inputs at {} Hz", settings.inputs.len(), settings.stream.scan_rate);
//! # Ok::<(), ljstream::error::ConfigError>(())
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hal::registers::STREAM_OUT_SLOTS;
use crate::hal::sim::SimConfig;
use crate::hal::{ConnectionType, DeviceSelector, DeviceType, GND};
use crate::stream::waveform::BYTES_PER_SAMPLE;
use crate::stream::{ChannelSpec, StreamConfig, WaveformBuffer};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LJSTREAM_";

/// Top-level settings for one acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which device to open
    pub device: DeviceSettings,
    /// Stream timing
    pub stream: StreamSettings,
    /// Input channels in column order
    pub inputs: Vec<InputSettings>,
    /// Stream-out waveforms
    pub waveforms: Vec<WaveformSettings>,
    /// Scan table handling
    pub output: OutputSettings,
    /// Diagnostic logging
    pub logging: LoggingSettings,
    /// Simulated device used by the CLI
    pub simulation: SimulationSettings,
}

/// Device selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// `ANY`, `T4`, `T7`, `T8`, `DIGIT` or a raw constant
    pub device_type: String,
    /// `ANY`, `USB`, `TCP`, `ETHERNET`, `WIFI` or a raw constant
    pub connection_type: String,
    /// Serial number, IP address, name, or `ANY`
    pub identifier: String,
}

/// Stream timing and input-conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Requested scans per second
    pub scan_rate: f64,
    /// Scans per stream read
    pub scans_per_read: usize,
    /// Settling time in microseconds (0 = default)
    pub settling_us: f64,
    /// Resolution index (0 = default)
    pub resolution_index: u32,
    /// Negative channel for devices with `AIN_ALL_NEGATIVE_CH`
    pub negative_channel: f64,
    /// Bound on a single read in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

/// One input channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Register name, also the column header
    pub name: String,
    /// ±volts
    #[serde(default = "default_range")]
    pub range: f64,
}

/// One stream-out waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformSettings {
    /// Stream-out slot (0..4)
    #[serde(default)]
    pub slot: u8,
    /// Register the slot drives, e.g. `DAC0`
    pub target: String,
    /// Buffer size in bytes (power of two)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    /// Samples in volts
    pub samples: Vec<f64>,
    /// Repeat the samples
    #[serde(default = "default_looping")]
    pub looping: bool,
}

/// How scan rows reach the CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Keep rows in memory, write once at the end
    #[default]
    Buffered,
    /// Append rows after every batch
    Incremental,
}

/// Scan table settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Buffered or incremental
    pub mode: OutputMode,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-oriented
    Pretty,
    /// Single-line
    #[default]
    Compact,
    /// JSON lines
    Json,
}

/// Diagnostic logging settings. `RUST_LOG` overrides `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Simulated device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Family the simulated device reports
    pub device_type: String,
    /// Serial number
    pub serial_number: i32,
    /// Uniform noise amplitude in volts
    pub noise_volts: f64,
    /// Noise seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Wire stream-out slot 0 to the first input
    pub loopback: bool,
    /// Pace reads at the scan rate
    pub realtime: bool,
}

fn default_range() -> f64 {
    10.0
}

fn default_buffer_size() -> u32 {
    512
}

fn default_looping() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: DeviceSettings::default(),
            stream: StreamSettings::default(),
            inputs: vec![
                InputSettings {
                    name: "AIN0".to_string(),
                    range: default_range(),
                },
                InputSettings {
                    name: "AIN2".to_string(),
                    range: default_range(),
                },
            ],
            waveforms: vec![WaveformSettings {
                slot: 0,
                target: "DAC0".to_string(),
                buffer_size: default_buffer_size(),
                samples: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                looping: true,
            }],
            output: OutputSettings::default(),
            logging: LoggingSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_type: "ANY".to_string(),
            connection_type: "ANY".to_string(),
            identifier: "ANY".to_string(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            scan_rate: 2000.0,
            scans_per_read: 60,
            settling_us: 0.0,
            resolution_index: 0,
            negative_channel: GND,
            read_timeout_ms: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            device_type: "T7".to_string(),
            serial_number: 470_010_000,
            noise_volts: 0.002,
            seed: None,
            loopback: true,
            realtime: true,
        }
    }
}

impl Settings {
    /// Load defaults, then `path` (if given), then the environment, and
    /// validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate settings from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for mistakes the device would otherwise report
    /// halfway through setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device
            .device_type
            .parse::<DeviceType>()
            .map_err(ConfigError::invalid)?;
        self.device
            .connection_type
            .parse::<ConnectionType>()
            .map_err(ConfigError::invalid)?;

        if self.inputs.is_empty() {
            return Err(ConfigError::invalid("At least one input channel is required"));
        }
        let mut names = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                return Err(ConfigError::invalid("Input channel name is empty"));
            }
            if !names.insert(input.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "Duplicate input channel '{}'",
                    input.name
                )));
            }
            if !(input.range > 0.0 && input.range.is_finite()) {
                return Err(ConfigError::invalid(format!(
                    "Invalid range {} for {}",
                    input.range, input.name
                )));
            }
        }

        if !(self.stream.scan_rate > 0.0 && self.stream.scan_rate.is_finite()) {
            return Err(ConfigError::invalid(format!(
                "Scan rate must be positive, got {}",
                self.stream.scan_rate
            )));
        }
        if self.stream.scans_per_read == 0 {
            return Err(ConfigError::invalid("Scans per read must be greater than 0"));
        }
        if self.stream.read_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("Read timeout must be greater than 0"));
        }

        let mut slots = HashSet::new();
        for waveform in &self.waveforms {
            if waveform.slot >= STREAM_OUT_SLOTS {
                return Err(ConfigError::invalid(format!(
                    "Stream-out slot {} out of range (0..{})",
                    waveform.slot, STREAM_OUT_SLOTS
                )));
            }
            if !slots.insert(waveform.slot) {
                return Err(ConfigError::invalid(format!(
                    "Stream-out slot {} used twice",
                    waveform.slot
                )));
            }
            if !waveform.buffer_size.is_power_of_two() {
                return Err(ConfigError::invalid(format!(
                    "Buffer size {} for {} is not a power of two",
                    waveform.buffer_size, waveform.target
                )));
            }
            if waveform.samples.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "Waveform for {} has no samples",
                    waveform.target
                )));
            }
            let needed = waveform.samples.len() as u64 * u64::from(BYTES_PER_SAMPLE);
            if needed > u64::from(waveform.buffer_size) {
                return Err(ConfigError::invalid(format!(
                    "Buffer size {} is too small for {} samples",
                    waveform.buffer_size,
                    waveform.samples.len()
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::invalid(format!("Unknown log level '{}'", other)));
            }
        }

        self.simulation
            .device_type
            .parse::<DeviceType>()
            .map_err(ConfigError::invalid)?;

        Ok(())
    }

    /// The device selector. Unparseable fields fall back to `ANY`.
    pub fn selector(&self) -> DeviceSelector {
        DeviceSelector {
            device_type: self.device.device_type.parse().unwrap_or(DeviceType::Any),
            connection_type: self
                .device
                .connection_type
                .parse()
                .unwrap_or(ConnectionType::Any),
            identifier: self.device.identifier.clone(),
        }
    }

    /// Input names in column order.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|input| input.name.clone()).collect()
    }

    /// Build the stream configuration from resolved input channels.
    pub fn stream_config(&self, inputs: Vec<ChannelSpec>) -> Result<StreamConfig, ConfigError> {
        let slots: Vec<u8> = self.waveforms.iter().map(|w| w.slot).collect();
        StreamConfig::builder()
            .inputs(inputs)
            .output_slots(&slots)
            .scan_rate(self.stream.scan_rate)
            .scans_per_read(self.stream.scans_per_read)
            .settling_us(self.stream.settling_us)
            .resolution_index(self.stream.resolution_index)
            .negative_channel(self.stream.negative_channel)
            .read_timeout(self.stream.read_timeout_ms.map(Duration::from_millis))
            .build()
    }
}

impl WaveformSettings {
    /// Bind the waveform to its resolved target channel.
    pub fn buffer(&self, target: ChannelSpec) -> WaveformBuffer {
        WaveformBuffer {
            slot: self.slot,
            target,
            capacity_bytes: self.buffer_size,
            samples: self.samples.clone(),
            looping: self.looping,
        }
    }
}

impl From<&SimulationSettings> for SimConfig {
    fn from(settings: &SimulationSettings) -> Self {
        let device_type = settings.device_type.parse().unwrap_or(DeviceType::T7);
        let base = if device_type == DeviceType::T4 {
            SimConfig::t4()
        } else {
            SimConfig::default()
        };
        SimConfig {
            device_type,
            serial_number: settings.serial_number,
            noise_volts: settings.noise_volts,
            seed: settings.seed,
            loopback: settings.loopback,
            realtime: settings.realtime,
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_toml(text: &str) -> Result<Settings, ConfigError> {
        Settings::from_figment(
            Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(text)),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.input_names(), vec!["AIN0", "AIN2"]);
        assert_eq!(settings.stream.scans_per_read, 60);
        assert_eq!(settings.selector(), DeviceSelector::default());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let settings = with_toml(
            r#"
            [stream]
            scan_rate = 5000.0

            [[inputs]]
            name = "AIN1"
            range = 1.0

            [output]
            mode = "incremental"
            "#,
        )
        .unwrap();
        assert_eq!(settings.stream.scan_rate, 5000.0);
        assert_eq!(settings.stream.scans_per_read, 60);
        assert_eq!(settings.input_names(), vec!["AIN1"]);
        assert_eq!(settings.output.mode, OutputMode::Incremental);
        assert_eq!(settings.waveforms.len(), 1);
    }

    #[test]
    fn test_rejects_duplicate_inputs() {
        let err = with_toml(
            r#"
            [[inputs]]
            name = "AIN0"
            [[inputs]]
            name = "AIN0"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate input channel"));
    }

    #[test]
    fn test_rejects_bad_buffer_size() {
        let mut settings = Settings::default();
        settings.waveforms[0].buffer_size = 500;
        assert!(settings.validate().is_err());

        settings.waveforms[0].buffer_size = 8;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_slots() {
        let mut settings = Settings::default();
        let mut second = settings.waveforms[0].clone();
        second.target = "DAC1".to_string();
        settings.waveforms.push(second);
        assert!(settings.validate().is_err());

        settings.waveforms[1].slot = 1;
        settings.validate().unwrap();
    }

    #[test]
    fn test_rejects_stream_parameters() {
        let mut settings = Settings::default();
        settings.stream.scan_rate = -1.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.stream.scans_per_read = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.inputs.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/ljstream.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_stream_config_carries_slots() {
        let settings = Settings::default();
        let inputs = vec![
            ChannelSpec::input("AIN0", 0, 10.0),
            ChannelSpec::input("AIN2", 4, 10.0),
        ];
        let config = settings.stream_config(inputs).unwrap();
        assert_eq!(config.scan_list().addresses(), &[0, 4, 4800]);
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn test_simulation_settings_convert() {
        let settings = SimulationSettings {
            device_type: "T4".to_string(),
            seed: Some(3),
            ..Default::default()
        };
        let sim = SimConfig::from(&settings);
        assert_eq!(sim.device_type, DeviceType::T4);
        assert_eq!(sim.seed, Some(3));
    }

    #[test]
    fn test_settings_serialize_to_toml() {
        let text = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(text.contains("scan_rate = 2000.0"));
        assert!(text.contains("[[inputs]]"));
    }
}
