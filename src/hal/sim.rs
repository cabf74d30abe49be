//! Simulated T-series device.
//!
//! [`SimulatedDevice`] implements [`Hal`] entirely in memory. It models the
//! parts of a device the acquisition pipeline depends on:
//!
//! - stream-out slots that must be declared (`TARGET`/`BUFFER_SIZE`/`ENABLE`)
//!   before samples can be loaded, and that only play once committed with
//!   `SET_LOOP`
//! - a scan list whose trailing stream-out entries pad every batch
//! - an optional wire from `DAC0` to the first input, so the waveform shows
//!   up in the captured data
//! - device/host backlog counters
//!
//! Faults are injected with [`SimFault`] the way the mock driver crate's
//! error scenarios work, and every HAL call is counted so tests can assert
//! on call discipline (one stop, one close).
//!
//! # Example
//!
//! ```
//! use ljstream::hal::sim::{SimConfig, SimFault, SimulatedDevice};
//!
//! let device = SimulatedDevice::new(SimConfig::default())
//!     .with_fault(SimFault::ReadFailsAt { batch: 2 });
//! assert_eq!(device.calls().opens, 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use super::registers::{self, STREAM_OUT_SLOTS};
use super::{
    ConnectionType, DeviceSelector, DeviceType, Hal, Handle, HandleInfo, StreamRead, SENTINEL,
};
use crate::error::{DeviceError, DeviceErrorKind, DeviceResult};

/// Fault injected into a [`SimulatedDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum SimFault {
    /// `open` fails as if no device were connected
    OpenFails,
    /// Writes to the named register fail, including inside `write_names`
    WriteFails {
        /// Register name
        register: String,
    },
    /// Reads of the named register fail
    ReadFails {
        /// Register name
        register: String,
    },
    /// `stream_start` fails
    StartFails,
    /// The `batch`-th stream read (1-based) fails
    ReadFailsAt {
        /// 1-based read index
        batch: u64,
    },
    /// Every stream read fails
    EveryReadFails,
    /// The `batch`-th stream read returns fewer values than a full batch
    ShortBatchAt {
        /// 1-based read index
        batch: u64,
    },
    /// The first `scans` scans of the `batch`-th read were lost to an overflow
    OverflowAt {
        /// 1-based read index
        batch: u64,
        /// Scans replaced by sentinels
        scans: usize,
    },
    /// Device backlog grows by `per_read` scans on every read
    BacklogGrowth {
        /// Scans added per read
        per_read: u32,
    },
    /// `stream_stop` fails
    StopFails,
    /// `close` fails (the handle is still released)
    CloseFails,
}

/// Identity and signal model of a simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Family reported by `handle_info`
    pub device_type: DeviceType,
    /// Transport reported by `handle_info`
    pub connection_type: ConnectionType,
    /// Serial number
    pub serial_number: i32,
    /// Packed IPv4 address
    pub ip_address: u32,
    /// Port
    pub port: i32,
    /// Max bytes per packet
    pub max_bytes_per_mb: i32,
    /// Peak amplitude of uniform noise added to every input sample
    pub noise_volts: f64,
    /// Seed for the noise generator; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Feed stream-out slot 0 back into the first input
    pub loopback: bool,
    /// Block each read for the real duration of a batch
    pub realtime: bool,
    /// Stream clock the requested scan rate is divided down from
    pub clock_hz: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::T7,
            connection_type: ConnectionType::Usb,
            serial_number: 470_010_000,
            ip_address: 0,
            port: 0,
            max_bytes_per_mb: 64,
            noise_volts: 0.0,
            seed: None,
            loopback: true,
            realtime: false,
            clock_hz: 80_000_000.0,
        }
    }
}

impl SimConfig {
    /// Simulate a T4 instead of a T7.
    pub fn t4() -> Self {
        Self {
            device_type: DeviceType::T4,
            serial_number: 440_010_000,
            ..Default::default()
        }
    }
}

/// Counts of HAL calls made against a [`SimulatedDevice`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `open` calls
    pub opens: usize,
    /// `close` calls
    pub closes: usize,
    /// `stream_start` calls
    pub stream_starts: usize,
    /// `stream_read` calls
    pub stream_reads: usize,
    /// `stream_stop` calls
    pub stream_stops: usize,
    /// Registers written, counting each entry of a multi-write
    pub register_writes: usize,
}

#[derive(Debug, Default, Clone)]
struct StreamOutSlot {
    target: Option<u32>,
    buffer_size: u32,
    enabled: bool,
    loop_size: usize,
    pending: Vec<f64>,
    active: Vec<f64>,
}

impl StreamOutSlot {
    fn free_entries(&self) -> f64 {
        let capacity = (self.buffer_size / 2) as usize;
        capacity.saturating_sub(self.active.len()) as f64
    }
}

#[derive(Debug)]
struct RunningStream {
    scans_per_read: usize,
    scan_list: Vec<u32>,
    n_inputs: usize,
    scan_rate: f64,
    reads: u64,
    next_scan: u64,
}

struct SimState {
    rng: ChaCha8Rng,
    next_handle: i32,
    open_handle: Option<Handle>,
    registers: HashMap<String, f64>,
    writes: Vec<(String, f64)>,
    slots: Vec<StreamOutSlot>,
    stream: Option<RunningStream>,
    timeout: Option<Duration>,
    calls: CallCounts,
}

impl SimState {
    fn check_handle(&self, handle: Handle) -> DeviceResult<()> {
        if self.open_handle == Some(handle) {
            Ok(())
        } else {
            Err(DeviceError::new(
                DeviceErrorKind::InvalidHandle,
                0,
                format!("Handle {} is not open", handle.0),
            ))
        }
    }
}

/// In-memory [`Hal`] implementation.
///
/// Clones share state, so a test can keep a clone and inspect call counts
/// after handing the device to the acquisition routine.
#[derive(Clone)]
pub struct SimulatedDevice {
    config: SimConfig,
    faults: Arc<Vec<SimFault>>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    /// Create a simulated device.
    pub fn new(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let state = SimState {
            rng,
            next_handle: 1,
            open_handle: None,
            registers: HashMap::new(),
            writes: Vec::new(),
            slots: vec![StreamOutSlot::default(); usize::from(STREAM_OUT_SLOTS)],
            stream: None,
            timeout: None,
            calls: CallCounts::default(),
        };
        Self {
            config,
            faults: Arc::new(Vec::new()),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a fault.
    pub fn with_fault(self, fault: SimFault) -> Self {
        let mut faults = self.faults.as_ref().clone();
        faults.push(fault);
        Self {
            faults: Arc::new(faults),
            ..self
        }
    }

    /// Add several faults.
    pub fn with_faults(self, faults: impl IntoIterator<Item = SimFault>) -> Self {
        faults.into_iter().fold(self, Self::with_fault)
    }

    /// The simulation model.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// HAL calls made so far.
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls.clone()
    }

    /// Every register write in order, multi-writes flattened.
    pub fn writes(&self) -> Vec<(String, f64)> {
        self.state.lock().writes.clone()
    }

    /// Last value written to a register.
    pub fn register(&self, name: &str) -> Option<f64> {
        self.state.lock().registers.get(name).copied()
    }

    /// Whether a handle is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().open_handle.is_some()
    }

    /// Whether a stream is running.
    pub fn is_streaming(&self) -> bool {
        self.state.lock().stream.is_some()
    }

    /// Stream timeout most recently configured.
    pub fn stream_timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }

    fn has_fault(&self, predicate: impl Fn(&SimFault) -> bool) -> bool {
        self.faults.iter().any(predicate)
    }

    fn write_one(&self, state: &mut SimState, name: &str, value: f64) -> DeviceResult<()> {
        if self.has_fault(|f| matches!(f, SimFault::WriteFails { register } if register == name)) {
            return Err(DeviceError::register(format!(
                "Simulated write failure on {}",
                name
            )));
        }

        if let Some((slot, suffix)) = parse_stream_out(name) {
            let entry = &mut state.slots[usize::from(slot)];
            match suffix {
                "TARGET" => entry.target = Some(value as u32),
                "BUFFER_SIZE" => {
                    let size = value as u32;
                    if !size.is_power_of_two() {
                        return Err(DeviceError::register(format!(
                            "{} must be a power of two, got {}",
                            name, size
                        )));
                    }
                    entry.buffer_size = size;
                }
                "ENABLE" => entry.enabled = value != 0.0,
                "LOOP_SIZE" => entry.loop_size = value as usize,
                "BUFFER_F32" => {
                    if !entry.enabled || entry.buffer_size == 0 {
                        return Err(DeviceError::register(format!(
                            "STREAM_OUT{} buffer written before it was enabled",
                            slot
                        )));
                    }
                    if entry.pending.len() + 1 > (entry.buffer_size / 2) as usize {
                        return Err(DeviceError::register(format!(
                            "STREAM_OUT{} buffer is full",
                            slot
                        )));
                    }
                    entry.pending.push(value);
                }
                "SET_LOOP" => {
                    let pending = std::mem::take(&mut entry.pending);
                    let keep = if entry.loop_size == 0 {
                        pending.len()
                    } else {
                        entry.loop_size.min(pending.len())
                    };
                    entry.active = pending[pending.len() - keep..].to_vec();
                }
                _ => {}
            }
        }

        state.registers.insert(name.to_string(), value);
        state.writes.push((name.to_string(), value));
        state.calls.register_writes += 1;
        trace!(register = name, value, "Simulated register write");
        Ok(())
    }

    fn input_value(&self, state: &mut SimState, input: usize, scan: u64) -> f64 {
        let mut value = 0.0;
        if self.config.loopback && input == 0 {
            let played = &state.slots[0].active;
            if !played.is_empty() {
                value = played[(scan % played.len() as u64) as usize];
            }
        }
        if self.config.noise_volts > 0.0 {
            let amplitude = self.config.noise_volts;
            value += state.rng.gen_range(-amplitude..=amplitude);
        }
        value
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("config", &self.config)
            .field("faults", &self.faults)
            .finish()
    }
}

impl Hal for SimulatedDevice {
    fn open(&self, selector: &DeviceSelector) -> DeviceResult<Handle> {
        let mut state = self.state.lock();
        state.calls.opens += 1;

        if self.has_fault(|f| matches!(f, SimFault::OpenFails)) {
            return Err(DeviceError::new(
                DeviceErrorKind::NotFound,
                0,
                "No devices found (simulated)",
            ));
        }

        let type_matches = matches!(selector.device_type, DeviceType::Any)
            || selector.device_type == self.config.device_type;
        let connection_matches = matches!(selector.connection_type, ConnectionType::Any)
            || selector.connection_type == self.config.connection_type;
        let identifier_matches = selector.identifier.eq_ignore_ascii_case("ANY")
            || selector.identifier == self.config.serial_number.to_string();
        if !(type_matches && connection_matches && identifier_matches) {
            return Err(DeviceError::new(
                DeviceErrorKind::NotFound,
                0,
                format!("No device matches {}", selector),
            ));
        }

        if state.open_handle.is_some() {
            return Err(DeviceError::new(
                DeviceErrorKind::Communication,
                0,
                "Device is already open",
            ));
        }

        let handle = Handle(state.next_handle);
        state.next_handle += 1;
        state.open_handle = Some(handle);
        debug!(handle = handle.0, "Opened simulated device");
        Ok(handle)
    }

    fn handle_info(&self, handle: Handle) -> DeviceResult<HandleInfo> {
        self.state.lock().check_handle(handle)?;
        Ok(HandleInfo {
            device_type: self.config.device_type,
            connection_type: self.config.connection_type,
            serial_number: self.config.serial_number,
            ip_address: self.config.ip_address,
            port: self.config.port,
            max_bytes_per_mb: self.config.max_bytes_per_mb,
        })
    }

    fn name_to_address(&self, name: &str) -> DeviceResult<u32> {
        registers::address_of(name)
            .ok_or_else(|| DeviceError::register(format!("Unknown register name '{}'", name)))
    }

    fn write_name(&self, handle: Handle, name: &str, value: f64) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.check_handle(handle)?;
        self.write_one(&mut state, name, value)
    }

    fn write_names(&self, handle: Handle, names: &[String], values: &[f64]) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.check_handle(handle)?;
        if names.len() != values.len() {
            return Err(DeviceError::register(format!(
                "{} names but {} values",
                names.len(),
                values.len()
            )));
        }
        for (name, &value) in names.iter().zip(values) {
            self.write_one(&mut state, name, value)?;
        }
        Ok(())
    }

    fn read_name(&self, handle: Handle, name: &str) -> DeviceResult<f64> {
        let state = self.state.lock();
        state.check_handle(handle)?;

        if self.has_fault(|f| matches!(f, SimFault::ReadFails { register } if register == name)) {
            return Err(DeviceError::register(format!(
                "Simulated read failure on {}",
                name
            )));
        }

        if let Some((slot, "BUFFER_STATUS")) = parse_stream_out(name) {
            return Ok(state.slots[usize::from(slot)].free_entries());
        }
        if let Some(&value) = state.registers.get(name) {
            return Ok(value);
        }
        registers::address_of(name)
            .map(|_| 0.0)
            .ok_or_else(|| DeviceError::register(format!("Unknown register name '{}'", name)))
    }

    fn stream_start(
        &self,
        handle: Handle,
        scans_per_read: usize,
        scan_list: &[u32],
        scan_rate: f64,
    ) -> DeviceResult<f64> {
        let mut state = self.state.lock();
        state.check_handle(handle)?;
        state.calls.stream_starts += 1;

        if self.has_fault(|f| matches!(f, SimFault::StartFails)) {
            return Err(DeviceError::stream("Simulated stream start failure"));
        }
        if state.stream.is_some() {
            return Err(DeviceError::stream("Stream is already running"));
        }
        if scan_list.is_empty() || scans_per_read == 0 || scan_rate <= 0.0 {
            return Err(DeviceError::stream(format!(
                "Invalid stream parameters: {} addresses, {} scans per read, {} Hz",
                scan_list.len(),
                scans_per_read,
                scan_rate
            )));
        }

        for &address in scan_list {
            if registers::is_stream_out_address(address) {
                let slot = (address - registers::STREAM_OUT_BASE_ADDRESS) as usize;
                let entry = &state.slots[slot];
                if !entry.enabled || entry.target.is_none() {
                    return Err(DeviceError::stream(format!(
                        "STREAM_OUT{} is in the scan list but not enabled",
                        slot
                    )));
                }
            }
        }

        let n_inputs = scan_list
            .iter()
            .filter(|&&a| !registers::is_stream_out_address(a))
            .count();
        let divisor = (self.config.clock_hz / scan_rate).round().max(1.0);
        let achieved = self.config.clock_hz / divisor;

        state.stream = Some(RunningStream {
            scans_per_read,
            scan_list: scan_list.to_vec(),
            n_inputs,
            scan_rate: achieved,
            reads: 0,
            next_scan: 0,
        });
        debug!(
            requested = scan_rate,
            achieved,
            n_inputs,
            "Started simulated stream"
        );
        Ok(achieved)
    }

    fn stream_read(&self, handle: Handle) -> DeviceResult<StreamRead> {
        let (read, pace) = {
            let mut state = self.state.lock();
            state.check_handle(handle)?;
            state.calls.stream_reads += 1;

            let (batch, scans_per_read, n_inputs, total, first_scan, scan_rate) = {
                let stream = state
                    .stream
                    .as_mut()
                    .ok_or_else(|| DeviceError::stream("Stream is not running"))?;
                stream.reads += 1;
                let first_scan = stream.next_scan;
                stream.next_scan += stream.scans_per_read as u64;
                (
                    stream.reads,
                    stream.scans_per_read,
                    stream.n_inputs,
                    stream.scan_list.len(),
                    first_scan,
                    stream.scan_rate,
                )
            };

            if self.has_fault(|f| {
                matches!(f, SimFault::EveryReadFails)
                    || matches!(f, SimFault::ReadFailsAt { batch: b } if *b == batch)
            }) {
                return Err(DeviceError::stream(format!(
                    "Simulated read failure on batch {}",
                    batch
                )));
            }

            let pace = Duration::from_secs_f64(scans_per_read as f64 / scan_rate);
            if let Some(timeout) = state.timeout {
                if self.config.realtime && pace > timeout {
                    return Err(DeviceError::new(
                        DeviceErrorKind::Timeout,
                        0,
                        format!("No batch within {:?}", timeout),
                    ));
                }
            }

            let mut data = vec![0.0; scans_per_read * total];
            for scan in 0..scans_per_read {
                for input in 0..n_inputs {
                    data[scan * n_inputs + input] =
                        self.input_value(&mut state, input, first_scan + scan as u64);
                }
            }

            for fault in self.faults.iter() {
                if let SimFault::OverflowAt { batch: b, scans } = fault {
                    if *b == batch {
                        let lost = (*scans).min(scans_per_read) * n_inputs;
                        data[..lost].fill(SENTINEL);
                    }
                }
            }

            if self.has_fault(|f| matches!(f, SimFault::ShortBatchAt { batch: b } if *b == batch)) {
                data.truncate((scans_per_read * n_inputs).saturating_sub(1));
            }

            let growth = self
                .faults
                .iter()
                .find_map(|f| match f {
                    SimFault::BacklogGrowth { per_read } => Some(*per_read),
                    _ => None,
                })
                .unwrap_or(0);
            let device_backlog = growth.saturating_mul(batch as u32);

            (
                StreamRead {
                    data,
                    device_backlog,
                    host_backlog: device_backlog / 2,
                },
                pace,
            )
        };

        if self.config.realtime {
            std::thread::sleep(pace);
        }
        Ok(read)
    }

    fn stream_stop(&self, handle: Handle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.check_handle(handle)?;
        state.calls.stream_stops += 1;

        if self.has_fault(|f| matches!(f, SimFault::StopFails)) {
            return Err(DeviceError::stream("Simulated stream stop failure"));
        }
        match state.stream.take() {
            Some(stream) => {
                debug!(reads = stream.reads, "Stopped simulated stream");
                Ok(())
            }
            None => Err(DeviceError::stream("Stream is not running")),
        }
    }

    fn close(&self, handle: Handle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.calls.closes += 1;
        state.check_handle(handle)?;

        state.open_handle = None;
        state.stream = None;
        debug!(handle = handle.0, "Closed simulated device");

        if self.has_fault(|f| matches!(f, SimFault::CloseFails)) {
            return Err(DeviceError::new(
                DeviceErrorKind::Communication,
                0,
                "Simulated close failure",
            ));
        }
        Ok(())
    }

    fn set_stream_timeout(&self, handle: Handle, timeout: Duration) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.check_handle(handle)?;
        state.timeout = Some(timeout);
        Ok(())
    }
}

/// Split `STREAM_OUT<n>_<SUFFIX>` into slot and suffix.
fn parse_stream_out(name: &str) -> Option<(u8, &str)> {
    let rest = name.strip_prefix("STREAM_OUT")?;
    let (slot, suffix) = rest.split_once('_')?;
    let slot: u8 = slot.parse().ok()?;
    (slot < STREAM_OUT_SLOTS).then_some((slot, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(device: &SimulatedDevice) -> Handle {
        device.open(&DeviceSelector::default()).unwrap()
    }

    fn load_slot0(device: &SimulatedDevice, handle: Handle, samples: &[f64]) {
        device.write_name(handle, "STREAM_OUT0_TARGET", 1000.0).unwrap();
        device.write_name(handle, "STREAM_OUT0_BUFFER_SIZE", 512.0).unwrap();
        device.write_name(handle, "STREAM_OUT0_ENABLE", 1.0).unwrap();
        device
            .write_name(handle, "STREAM_OUT0_LOOP_SIZE", samples.len() as f64)
            .unwrap();
        for &v in samples {
            device.write_name(handle, "STREAM_OUT0_BUFFER_F32", v).unwrap();
        }
        device.write_name(handle, "STREAM_OUT0_SET_LOOP", 1.0).unwrap();
    }

    #[test]
    fn test_parse_stream_out() {
        assert_eq!(parse_stream_out("STREAM_OUT0_TARGET"), Some((0, "TARGET")));
        assert_eq!(
            parse_stream_out("STREAM_OUT3_BUFFER_F32"),
            Some((3, "BUFFER_F32"))
        );
        assert_eq!(parse_stream_out("STREAM_OUT9_TARGET"), None);
        assert_eq!(parse_stream_out("AIN0_RANGE"), None);
    }

    #[test]
    fn test_open_respects_selector() {
        let device = SimulatedDevice::new(SimConfig::t4());
        let wrong = DeviceSelector {
            device_type: DeviceType::T7,
            ..Default::default()
        };
        let err = device.open(&wrong).unwrap_err();
        assert!(err.is_not_found());

        let right = DeviceSelector {
            device_type: DeviceType::T4,
            identifier: "440010000".to_string(),
            ..Default::default()
        };
        assert!(device.open(&right).is_ok());
        assert_eq!(device.calls().opens, 2);
    }

    #[test]
    fn test_buffer_write_requires_enable() {
        let device = SimulatedDevice::new(SimConfig::default());
        let handle = open(&device);
        let err = device
            .write_name(handle, "STREAM_OUT0_BUFFER_F32", 1.0)
            .unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Register);
    }

    #[test]
    fn test_buffer_status_reports_free_entries() {
        let device = SimulatedDevice::new(SimConfig::default());
        let handle = open(&device);
        load_slot0(&device, handle, &[0.0, 1.0, 2.0]);
        let status = device.read_name(handle, "STREAM_OUT0_BUFFER_STATUS").unwrap();
        assert_eq!(status, 253.0);
    }

    #[test]
    fn test_stream_loopback_and_padding() {
        let device = SimulatedDevice::new(SimConfig::default());
        let handle = open(&device);
        load_slot0(&device, handle, &[0.0, 1.0, 2.0]);

        let rate = device.stream_start(handle, 4, &[0, 4, 4800], 2000.0).unwrap();
        assert_eq!(rate, 2000.0);

        let read = device.stream_read(handle).unwrap();
        assert_eq!(read.data.len(), 12);
        let first_input: Vec<f64> = read.data[..8].iter().step_by(2).copied().collect();
        assert_eq!(first_input, vec![0.0, 1.0, 2.0, 0.0]);
        assert!(read.data[8..].iter().all(|&v| v == 0.0));

        device.stream_stop(handle).unwrap();
        assert!(device.stream_stop(handle).is_err());
    }

    #[test]
    fn test_overflow_marks_whole_scans() {
        let device = SimulatedDevice::new(SimConfig {
            seed: Some(7),
            noise_volts: 0.01,
            ..Default::default()
        })
        .with_fault(SimFault::OverflowAt { batch: 1, scans: 2 });
        let handle = open(&device);

        device.stream_start(handle, 5, &[0, 2, 4], 1000.0).unwrap();
        let read = device.stream_read(handle).unwrap();
        let sentinels = read.data.iter().filter(|&&v| v == SENTINEL).count();
        assert_eq!(sentinels, 6);
        assert!(read.data[..6].iter().all(|&v| v == SENTINEL));
    }

    #[test]
    fn test_start_rejects_undeclared_stream_out() {
        let device = SimulatedDevice::new(SimConfig::default());
        let handle = open(&device);
        let err = device.stream_start(handle, 10, &[0, 4800], 100.0).unwrap_err();
        assert!(err.message.contains("STREAM_OUT0"));
    }

    #[test]
    fn test_close_releases_handle_even_on_fault() {
        let device =
            SimulatedDevice::new(SimConfig::default()).with_fault(SimFault::CloseFails);
        let handle = open(&device);
        assert!(device.close(handle).is_err());
        assert!(!device.is_open());
        assert!(device.handle_info(handle).is_err());
    }

    #[test]
    fn test_timeout_applies_in_realtime_mode() {
        let device = SimulatedDevice::new(SimConfig {
            realtime: true,
            ..Default::default()
        });
        let handle = open(&device);
        device
            .set_stream_timeout(handle, Duration::from_millis(1))
            .unwrap();
        device.stream_start(handle, 100, &[0], 10.0).unwrap();
        let err = device.stream_read(handle).unwrap_err();
        assert!(err.is_timeout());
    }
}
