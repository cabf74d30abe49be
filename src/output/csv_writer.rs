use std::fs::File;
use std::path::PathBuf;

use tracing::{debug, trace};

use super::{header, row, ScanSink};
use crate::acquisition::ScanBatch;
use crate::error::OutputError;

/// Incremental CSV sink.
///
/// The header is written on creation and each batch is flushed as soon as it
/// arrives, so a crash mid-run leaves every completed batch on disk.
pub struct CsvScanWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
}

impl CsvScanWriter {
    /// Create the file and write the header.
    pub fn create(path: impl Into<PathBuf>, input_names: &[String]) -> Result<Self, OutputError> {
        let path = path.into();
        let mut writer = csv::Writer::from_path(&path).map_err(|source| OutputError::Csv {
            path: path.clone(),
            source,
        })?;
        writer
            .write_record(header(input_names))
            .map_err(|source| OutputError::Csv {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Opened incremental scan table");
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    fn csv_err(&self, source: csv::Error) -> OutputError {
        OutputError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl ScanSink for CsvScanWriter {
    fn push_batch(&mut self, batch: &ScanBatch) -> Result<(), OutputError> {
        for record in &batch.records {
            self.writer
                .write_record(row(record))
                .map_err(|e| self.csv_err(e))?;
        }
        self.writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.rows += batch.records.len() as u64;
        trace!(batch = batch.batch, rows = self.rows, "Appended batch");
        Ok(())
    }

    fn rows(&self) -> u64 {
        self.rows
    }

    fn finish(mut self: Box<Self>) -> Result<u64, OutputError> {
        self.writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.rows)
    }
}

impl std::fmt::Debug for CsvScanWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvScanWriter")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}
