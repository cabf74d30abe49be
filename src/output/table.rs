use std::path::PathBuf;

use tracing::debug;

use super::{header, row, ScanSink};
use crate::acquisition::{ScanBatch, ScanRecord};
use crate::error::OutputError;

/// In-memory scan table, written to CSV when the run finishes.
#[derive(Debug)]
pub struct ScanTable {
    path: PathBuf,
    input_names: Vec<String>,
    records: Vec<ScanRecord>,
}

impl ScanTable {
    /// Create an empty table destined for `path`.
    pub fn new(path: impl Into<PathBuf>, input_names: Vec<String>) -> Self {
        Self {
            path: path.into(),
            input_names,
            records: Vec::new(),
        }
    }

    fn write(&self) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(header(&self.input_names))?;
        for record in &self.records {
            writer.write_record(row(record))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ScanSink for ScanTable {
    fn push_batch(&mut self, batch: &ScanBatch) -> Result<(), OutputError> {
        self.records.extend_from_slice(&batch.records);
        Ok(())
    }

    fn rows(&self) -> u64 {
        self.records.len() as u64
    }

    fn finish(self: Box<Self>) -> Result<u64, OutputError> {
        self.write().map_err(|source| OutputError::Csv {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), rows = self.records.len(), "Wrote scan table");
        Ok(self.records.len() as u64)
    }
}
