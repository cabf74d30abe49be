//! The batch read loop.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{AcquisitionLog, AcquisitionTotals, CancellationToken, ScanBatch, ScanRecord};
use crate::error::{AcquisitionError, DeviceError};
use crate::hal::{Hal, SENTINEL};
use crate::output::ScanSink;
use crate::session::DeviceSession;
use crate::stream::StreamConfig;

/// How the read loop ended.
#[derive(Debug)]
pub enum LoopEnd {
    /// All requested batches were read.
    Completed,
    /// The cancellation token was set; `after` batches were read.
    Cancelled {
        /// Batches completed before the token was seen
        after: u64,
    },
    /// A read or the sink failed.
    Failed(AcquisitionError),
}

/// Everything the loop hands back to the acquisition routine.
#[derive(Debug)]
pub struct LoopOutcome {
    /// Running totals
    pub totals: AcquisitionTotals,
    /// Batches fully read and stored
    pub batches_completed: u64,
    /// When the loop began
    pub started: Instant,
    /// When the loop ended
    pub finished: Instant,
    /// Why it ended
    pub end: LoopEnd,
}

impl LoopOutcome {
    /// Wall-clock time spent in the loop.
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// Count sentinel samples (`-9999.0`) in a slice.
pub fn count_sentinels(data: &[f64]) -> usize {
    data.iter().filter(|&&v| v == SENTINEL).count()
}

/// Split an interleaved input slice into one record per scan.
///
/// `data` holds `scans × n_inputs` values ordered scan-major. Scan numbers
/// continue from `first_scan_number`. The last scan is stamped `read_at`;
/// earlier scans step back by `scan_period` each, floored at zero.
pub fn demultiplex(
    data: &[f64],
    n_inputs: usize,
    first_scan_number: u64,
    batch: u64,
    read_at: Duration,
    scan_period: Duration,
) -> Vec<ScanRecord> {
    if n_inputs == 0 {
        return Vec::new();
    }
    let scans = data.len() / n_inputs;
    data.chunks_exact(n_inputs)
        .enumerate()
        .map(|(i, scan)| {
            let behind = u32::try_from(scans - 1 - i).unwrap_or(u32::MAX);
            ScanRecord {
                elapsed: read_at.saturating_sub(scan_period.saturating_mul(behind)),
                values: scan.to_vec(),
                scan_number: first_scan_number + i as u64,
                batch,
            }
        })
        .collect()
}

/// Time between scans at `scan_rate`; zero when the rate is unusable.
fn scan_period(scan_rate: f64) -> Duration {
    if scan_rate > 0.0 && scan_rate.is_finite() {
        Duration::from_secs_f64(1.0 / scan_rate)
    } else {
        Duration::ZERO
    }
}

/// Read up to `max_batches` batches from a started stream.
///
/// The token is checked before every read. Each batch is demultiplexed,
/// pushed to `sink` and summarized in `log`. Row times are spread across the
/// batch at `scan_rate` and never run backwards. The first read or sink
/// failure ends the loop; nothing is retried.
pub fn read_batches<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    config: &StreamConfig,
    scan_rate: f64,
    max_batches: u64,
    cancel: &CancellationToken,
    sink: &mut dyn ScanSink,
    log: &mut AcquisitionLog,
) -> LoopOutcome {
    let names = config.input_names();
    let n_inputs = config.n_inputs();
    let expected = config.input_samples_per_read();

    let mut totals = AcquisitionTotals::default();
    let mut next_scan = 1u64;
    let mut completed = 0u64;
    let mut last_time = Duration::ZERO;
    let period = scan_period(scan_rate);
    let started = Instant::now();

    let end = loop {
        if completed >= max_batches {
            break LoopEnd::Completed;
        }
        if cancel.is_cancelled() {
            debug!(completed, "Cancellation requested");
            break LoopEnd::Cancelled { after: completed };
        }
        let index = completed + 1;

        let read = match session.stream_read() {
            Ok(read) => read,
            Err(e) => break LoopEnd::Failed(AcquisitionError::Stream(e)),
        };
        if read.data.len() < expected {
            break LoopEnd::Failed(AcquisitionError::Stream(DeviceError::stream(format!(
                "Stream read #{} returned {} values, expected at least {}",
                index,
                read.data.len(),
                expected
            ))));
        }

        // Stream-out entries are padding; only the input slice is valid.
        let data = &read.data[..expected];
        let skipped = count_sentinels(data);
        if skipped % n_inputs != 0 {
            warn!(
                batch = index,
                skipped, n_inputs, "Sentinel count is not a whole number of scans"
            );
        } else if skipped > 0 {
            warn!(batch = index, scans = skipped / n_inputs, "Scans skipped after buffer overflow");
        }

        let mut records = demultiplex(data, n_inputs, next_scan, index, started.elapsed(), period);
        for record in &mut records {
            record.elapsed = record.elapsed.max(last_time);
            last_time = record.elapsed;
        }
        let batch = ScanBatch {
            batch: index,
            skipped_scans: (skipped / n_inputs) as u64,
            device_backlog: read.device_backlog,
            host_backlog: read.host_backlog,
            records,
        };

        if let Err(e) = sink.push_batch(&batch) {
            break LoopEnd::Failed(AcquisitionError::Output(e));
        }

        if read.device_backlog > totals.device_backlog && totals.total_scans > 0 {
            warn!(
                batch = index,
                device_backlog = read.device_backlog,
                previous = totals.device_backlog,
                "Device backlog growing"
            );
        }

        let scans = batch.records.len() as u64;
        totals.total_scans += scans;
        totals.total_skipped += skipped as u64;
        totals.device_backlog = read.device_backlog;
        totals.host_backlog = read.host_backlog;
        next_scan += scans;
        completed = index;

        log.blank();
        log.push(format!("Stream read #{}, {} scans", index, scans));
        log.push(batch_readout(&batch, &names));
        debug!(
            batch = index,
            scans,
            skipped = batch.skipped_scans,
            device_backlog = read.device_backlog,
            host_backlog = read.host_backlog,
            "Stream read"
        );
    };

    let finished = Instant::now();
    trace!(?end, completed, "Read loop ended");
    LoopOutcome {
        totals,
        batches_completed: completed,
        started,
        finished,
        end,
    }
}

/// Per-scan readout plus skip and backlog summary for one batch.
fn batch_readout(batch: &ScanBatch, names: &[String]) -> String {
    let mut text = String::from("  ");
    for record in &batch.records {
        for (name, value) in names.iter().zip(&record.values) {
            let _ = write!(text, "{}: {:.5}, ", name, value);
        }
        text.push_str("\n  ");
    }
    let _ = write!(
        text,
        "Scans Skipped = {}, Scan Backlogs: Device = {}, Host = {}",
        batch.skipped_scans, batch.device_backlog, batch.host_backlog
    );
    text
}
