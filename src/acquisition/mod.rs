//! Acquisition routine.
//!
//! [`run_acquisition`] drives one complete run against a [`Hal`](crate::hal::Hal):
//! open, configure stream-out and inputs, start, read `max_batches` batches,
//! stop, close, then write the scan table and the run log. Every stage
//! failure is caught where it happens and recorded in the [`AcquisitionLog`];
//! the caller only ever sees an [`AcquisitionResult`].
//!
//! ```text
//!   open ──► declare/load waveforms ──► configure inputs ──► start
//!     │                │                       │               │
//!     │                └──────── Configuration ┘            Stream
//!  Connection                    │                             │
//!     │                          ▼                             ▼
//!     │                        close ◄──── stop ◄──── read loop × N
//!     ▼                          │
//!  write table + log ◄───────────┘
//! ```

mod log;
mod reader;
mod run;
mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use log::AcquisitionLog;
pub use reader::{count_sentinels, demultiplex, read_batches, LoopEnd, LoopOutcome};
pub use run::{run_acquisition, AcquisitionRequest, AcquisitionResult};
pub use stats::AcquisitionStats;

/// One demultiplexed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    /// Time since the read loop began, interpolated within the batch from
    /// the scan rate
    pub elapsed: Duration,
    /// One value per input channel, in declared order
    pub values: Vec<f64>,
    /// Scan number, contiguous from 1
    pub scan_number: u64,
    /// Read cycle the scan arrived in, from 1
    pub batch: u64,
}

/// The rows produced by one stream read.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBatch {
    /// Read cycle, from 1
    pub batch: u64,
    /// Rows in scan-number order
    pub records: Vec<ScanRecord>,
    /// Scans lost to buffer overflow in this batch
    pub skipped_scans: u64,
    /// Scans waiting in the device buffer after this read
    pub device_backlog: u32,
    /// Scans waiting in the host buffer after this read
    pub host_backlog: u32,
}

/// Running totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionTotals {
    /// Scans received
    pub total_scans: u64,
    /// Sentinel samples received (a multiple of the input count)
    pub total_skipped: u64,
    /// Most recent device backlog
    pub device_backlog: u32,
    /// Most recent host backlog
    pub host_backlog: u32,
}

/// Cooperative stop request, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
