//! The acquisition routine.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::reader::{read_batches, LoopEnd};
use super::{AcquisitionLog, AcquisitionStats, CancellationToken, ScanBatch};
use crate::config::{OutputMode, Settings};
use crate::error::AcquisitionError;
use crate::hal::Hal;
use crate::output::{self, ChannelSink, CsvScanWriter, ScanSink, ScanTable};
use crate::session::DeviceSession;
use crate::stream::{self, ChannelSpec, DeviceProfile, StreamConfig};

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    /// Artifacts are written to `<prefix>-data.csv` and `<prefix>-log.txt`
    pub output_prefix: PathBuf,
    /// Stream reads to perform
    pub max_batches: u64,
    /// Device, stream, channel and output settings
    pub settings: Settings,
    /// Checked between batches
    pub cancel: CancellationToken,
    /// Optional live consumer of each batch
    pub consumer: Option<mpsc::Sender<ScanBatch>>,
}

impl AcquisitionRequest {
    /// Request a run with default cancellation and no consumer.
    pub fn new(output_prefix: impl Into<PathBuf>, max_batches: u64, settings: Settings) -> Self {
        Self {
            output_prefix: output_prefix.into(),
            max_batches,
            settings,
            cancel: CancellationToken::new(),
            consumer: None,
        }
    }

    /// Use `cancel` as the stop signal.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward every batch to `tx`.
    pub fn with_consumer(mut self, tx: mpsc::Sender<ScanBatch>) -> Self {
        self.consumer = Some(tx);
        self
    }

    /// `<prefix>-data.csv`
    pub fn data_path(&self) -> PathBuf {
        with_suffix(&self.output_prefix, "-data.csv")
    }

    /// `<prefix>-log.txt`
    pub fn log_path(&self) -> PathBuf {
        with_suffix(&self.output_prefix, "-log.txt")
    }
}

fn with_suffix(prefix: &std::path::Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

/// Outcome of one run.
#[derive(Debug)]
pub struct AcquisitionResult {
    /// No stage failed
    pub success: bool,
    /// `"Success"`, the cancellation notice, or the first failure
    pub message: String,
    /// Scan table path
    pub data_path: PathBuf,
    /// Run log path
    pub log_path: PathBuf,
    /// Present when the stream started
    pub stats: Option<AcquisitionStats>,
    /// Batches read and stored
    pub batches_completed: u64,
    /// Rows written to the scan table
    pub rows_written: u64,
    /// Whether the run stopped early on request
    pub cancelled: bool,
    /// Every failure, in the order it happened
    pub errors: Vec<AcquisitionError>,
}

#[derive(Debug, Default)]
struct StreamSummary {
    stats: Option<AcquisitionStats>,
    batches_completed: u64,
    cancelled: bool,
}

/// Stage failures in order of occurrence.
///
/// The first failure decides the result message; later ones (a stop after
/// a failed read, a close after that) are recorded but never replace it.
#[derive(Debug, Default)]
struct Failures(Vec<AcquisitionError>);

impl Failures {
    fn record(&mut self, log: &mut AcquisitionLog, err: AcquisitionError) {
        error!(error = %err, "Acquisition step failed");
        log.error(&err);
        self.0.push(err);
    }
}

/// Run one acquisition to completion.
///
/// Never panics and never returns early: every failure is captured into the
/// run log, cleanup runs for every stage that was reached, and both
/// artifacts are attempted before returning.
pub fn run_acquisition<H: Hal + ?Sized>(
    hal: &H,
    request: &AcquisitionRequest,
) -> AcquisitionResult {
    let data_path = request.data_path();
    let log_path = request.log_path();
    let names = request.settings.input_names();
    let mut log = AcquisitionLog::new();
    let mut failures = Failures::default();

    info!(
        prefix = %request.output_prefix.display(),
        max_batches = request.max_batches,
        "Starting acquisition"
    );

    let sink = match request.settings.validate() {
        Ok(()) => match open_sink(request, &names) {
            Ok(sink) => Some(sink),
            Err(e) => {
                failures.record(&mut log, e);
                None
            }
        },
        Err(e) => {
            failures.record(&mut log, AcquisitionError::Settings(e));
            // Still leave a header-only table behind.
            Some(Box::new(ScanTable::new(&data_path, names.clone())) as Box<dyn ScanSink>)
        }
    };

    let mut summary = StreamSummary::default();
    let mut rows_written = 0;
    if let Some(mut sink) = sink {
        if failures.0.is_empty() {
            summary = acquire(hal, request, sink.as_mut(), &mut log, &mut failures);
        }
        match sink.finish() {
            Ok(rows) => rows_written = rows,
            Err(e) => failures.record(&mut log, AcquisitionError::Output(e)),
        }
    }

    if let Err(e) = output::write_log(&log_path, &log) {
        error!(error = %e, "Could not write run log");
        failures.0.push(AcquisitionError::Output(e));
    }

    let errors = failures.0;
    let success = errors.is_empty();
    let message = match errors.first() {
        Some(e) => e.to_string(),
        None if summary.cancelled => format!(
            "Cancelled after {} of {} batches",
            summary.batches_completed, request.max_batches
        ),
        None => "Success".to_string(),
    };

    if success {
        info!(rows = rows_written, batches = summary.batches_completed, "{}", message);
    } else {
        warn!(failures = errors.len(), "Acquisition finished with errors: {}", message);
    }

    AcquisitionResult {
        success,
        message,
        data_path,
        log_path,
        stats: summary.stats,
        batches_completed: summary.batches_completed,
        rows_written,
        cancelled: summary.cancelled,
        errors,
    }
}

fn open_sink(
    request: &AcquisitionRequest,
    names: &[String],
) -> Result<Box<dyn ScanSink>, AcquisitionError> {
    let path = request.data_path();
    let base: Box<dyn ScanSink> = match request.settings.output.mode {
        OutputMode::Buffered => Box::new(ScanTable::new(path, names.to_vec())),
        OutputMode::Incremental => Box::new(CsvScanWriter::create(path, names)?),
    };
    Ok(match &request.consumer {
        Some(tx) => Box::new(ChannelSink::new(base, tx.clone())),
        None => base,
    })
}

/// Open, configure, stream and close. Stages that were never reached are
/// never cleaned up; every stage that was reached is.
fn acquire<H: Hal + ?Sized>(
    hal: &H,
    request: &AcquisitionRequest,
    sink: &mut dyn ScanSink,
    log: &mut AcquisitionLog,
    failures: &mut Failures,
) -> StreamSummary {
    let session = match DeviceSession::open(hal, &request.settings.selector()) {
        Ok(session) => session,
        Err(e) => {
            failures.record(log, AcquisitionError::Connection(e));
            return StreamSummary::default();
        }
    };
    log.push(session.identity_line());

    let summary = match configure(&session, &request.settings, log) {
        Ok(config) => run_stream(&session, request, &config, sink, log, failures),
        Err(e) => {
            failures.record(log, e);
            StreamSummary::default()
        }
    };

    if let Err(e) = session.close() {
        failures.record(log, AcquisitionError::Close(e));
    }
    summary
}

/// Resolve channels, load every waveform and configure the inputs.
fn configure<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    settings: &Settings,
    log: &mut AcquisitionLog,
) -> Result<StreamConfig, AcquisitionError> {
    let inputs = settings
        .inputs
        .iter()
        .map(|input| {
            session
                .address_of(&input.name)
                .map(|address| ChannelSpec::input(input.name.clone(), address, input.range))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(AcquisitionError::Configuration)?;
    let config = settings.stream_config(inputs)?;

    for waveform in &settings.waveforms {
        let address = session
            .address_of(&waveform.target)
            .map_err(AcquisitionError::Configuration)?;
        let buffer = waveform.buffer(ChannelSpec::output(waveform.target.clone(), address));
        buffer.validate()?;

        stream::declare_output_stream(session, &buffer).map_err(AcquisitionError::Configuration)?;
        stream::load_waveform(session, &buffer).map_err(AcquisitionError::Configuration)?;
        let status =
            stream::buffer_status(session, &buffer).map_err(AcquisitionError::Configuration)?;
        log.push(format!("{} = {:.6}", buffer.register("BUFFER_STATUS"), status));
    }

    let profile = DeviceProfile::for_device(session.device_type());
    stream::configure_inputs(session, &config, profile).map_err(AcquisitionError::Configuration)?;
    log.push(config.scan_list().to_string());
    Ok(config)
}

/// Start, read, stop. Stop is attempted whenever start was attempted.
fn run_stream<H: Hal + ?Sized>(
    session: &DeviceSession<'_, H>,
    request: &AcquisitionRequest,
    config: &StreamConfig,
    sink: &mut dyn ScanSink,
    log: &mut AcquisitionLog,
    failures: &mut Failures,
) -> StreamSummary {
    let mut summary = StreamSummary::default();

    match stream::start(session, config) {
        Ok(achieved) => {
            log.blank();
            log.push(format!("Stream started with a scan rate of {:.0} Hz.", achieved));
            log.blank();
            log.push(format!("Performing {} stream reads.", request.max_batches));

            let outcome = read_batches(
                session,
                config,
                achieved,
                request.max_batches,
                &request.cancel,
                sink,
                log,
            );
            let stats = AcquisitionStats::compute(
                &outcome.totals,
                config.n_inputs(),
                outcome.elapsed(),
                Some(achieved),
            );
            summary.batches_completed = outcome.batches_completed;

            match outcome.end {
                LoopEnd::Completed => {}
                LoopEnd::Cancelled { after } => {
                    summary.cancelled = true;
                    log.blank();
                    log.push(format!("Acquisition cancelled after {} batches", after));
                }
                LoopEnd::Failed(e) => failures.record(log, e),
            }

            log.blank();
            log.push(stats.render());
            summary.stats = Some(stats);
        }
        Err(e) => failures.record(log, AcquisitionError::Stream(e)),
    }

    log.blank();
    log.push("Stop Stream");
    if let Err(e) = stream::stop(session) {
        failures.record(log, AcquisitionError::Stop(e));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths() {
        let request = AcquisitionRequest::new("/tmp/runs/2026-01-01_00-00-00", 3, Settings::default());
        assert_eq!(
            request.data_path(),
            PathBuf::from("/tmp/runs/2026-01-01_00-00-00-data.csv")
        );
        assert_eq!(
            request.log_path(),
            PathBuf::from("/tmp/runs/2026-01-01_00-00-00-log.txt")
        );
    }
}
