use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use super::ScanSink;
use crate::acquisition::ScanBatch;
use crate::error::OutputError;

/// Forwards every batch to a live consumer after storing it.
///
/// The channel is bounded. Outside an async runtime a slow consumer slows
/// the read loop down at batch cadence. Inside a runtime the thread must not
/// block, so a full channel drops the batch for the consumer only. A
/// consumer that goes away is logged once; storage continues either way.
pub struct ChannelSink {
    inner: Box<dyn ScanSink>,
    tx: Option<mpsc::Sender<ScanBatch>>,
    dropped: u64,
}

impl ChannelSink {
    /// Wrap `inner`, forwarding to `tx`.
    pub fn new(inner: Box<dyn ScanSink>, tx: mpsc::Sender<ScanBatch>) -> Self {
        Self {
            inner,
            tx: Some(tx),
            dropped: 0,
        }
    }

    fn forward(tx: &mpsc::Sender<ScanBatch>, batch: &ScanBatch) -> Result<(), TrySendError<()>> {
        if tokio::runtime::Handle::try_current().is_ok() {
            tx.try_send(batch.clone()).map_err(|e| match e {
                TrySendError::Full(_) => TrySendError::Full(()),
                TrySendError::Closed(_) => TrySendError::Closed(()),
            })
        } else {
            tx.blocking_send(batch.clone())
                .map_err(|_| TrySendError::Closed(()))
        }
    }
}

impl ScanSink for ChannelSink {
    fn push_batch(&mut self, batch: &ScanBatch) -> Result<(), OutputError> {
        self.inner.push_batch(batch)?;

        if let Some(tx) = &self.tx {
            match Self::forward(tx, batch) {
                Ok(()) => {}
                Err(TrySendError::Full(())) => {
                    self.dropped += 1;
                    warn!(
                        batch = batch.batch,
                        dropped = self.dropped,
                        "Scan consumer full, batch not forwarded"
                    );
                }
                Err(TrySendError::Closed(())) => {
                    warn!(batch = batch.batch, "Scan consumer disconnected, no longer forwarding");
                    self.tx = None;
                }
            }
        }
        Ok(())
    }

    fn rows(&self) -> u64 {
        self.inner.rows()
    }

    fn finish(self: Box<Self>) -> Result<u64, OutputError> {
        let Self { inner, dropped, .. } = *self;
        if dropped > 0 {
            trace!(dropped, "Batches not forwarded to the consumer");
        }
        inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ScanTable;

    fn empty_batch(index: u64) -> ScanBatch {
        ScanBatch {
            batch: index,
            records: Vec::new(),
            skipped_scans: 0,
            device_backlog: 0,
            host_backlog: 0,
        }
    }

    #[test]
    fn test_forwards_batches() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let table = ScanTable::new(dir.path().join("x-data.csv"), vec!["A".to_string()]);
        let mut sink = ChannelSink::new(Box::new(table), tx);

        sink.push_batch(&empty_batch(1)).unwrap();
        sink.push_batch(&empty_batch(2)).unwrap();

        assert_eq!(rx.try_recv().unwrap().batch, 1);
        assert_eq!(rx.try_recv().unwrap().batch, 2);
    }

    #[test]
    fn test_dropped_consumer_does_not_fail_storage() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let table = ScanTable::new(dir.path().join("x-data.csv"), vec!["A".to_string()]);
        let mut sink = ChannelSink::new(Box::new(table), tx);

        sink.push_batch(&empty_batch(1)).unwrap();
        assert!(sink.tx.is_none());
        assert_eq!(Box::new(sink).finish().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_channel_inside_runtime_drops_instead_of_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let table = ScanTable::new(dir.path().join("x-data.csv"), vec!["A".to_string()]);
        let mut sink = ChannelSink::new(Box::new(table), tx);

        for index in 1..=3 {
            sink.push_batch(&empty_batch(index)).unwrap();
        }
        assert_eq!(sink.dropped, 2);
        assert!(sink.tx.is_some());
        assert_eq!(rx.recv().await.unwrap().batch, 1);
    }
}
