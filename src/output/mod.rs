//! Output assembly.
//!
//! Scan rows flow from the acquisition loop into a [`ScanSink`]. Two sinks
//! produce the `<prefix>-data.csv` table:
//!
//! - [`ScanTable`] buffers every row in memory and writes the file once the
//!   run finishes.
//! - [`CsvScanWriter`] writes the header when the run begins and appends
//!   each batch as it completes.
//!
//! Both emit the same columns in the same order. [`ChannelSink`] wraps
//! either one and forwards batches to a live consumer.
//!
//! The run log (`<prefix>-log.txt`) is written by [`write_log`].

mod channel;
mod csv_writer;
mod table;

use std::path::Path;
use std::time::Duration;

use crate::acquisition::{AcquisitionLog, ScanBatch, ScanRecord};
use crate::error::OutputError;

pub use channel::ChannelSink;
pub use csv_writer::CsvScanWriter;
pub use table::ScanTable;

/// Destination for demultiplexed scan rows.
pub trait ScanSink: Send {
    /// Accept one batch of rows, in scan-number order.
    fn push_batch(&mut self, batch: &ScanBatch) -> Result<(), OutputError>;

    /// Rows accepted so far.
    fn rows(&self) -> u64;

    /// Flush everything to disk. Returns the number of rows written.
    fn finish(self: Box<Self>) -> Result<u64, OutputError>;
}

/// Column header: `Time`, input names in declared order, `ScanNumber`, `ScanBlock`.
pub fn header(input_names: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(input_names.len() + 3);
    columns.push("Time".to_string());
    columns.extend(input_names.iter().cloned());
    columns.push("ScanNumber".to_string());
    columns.push("ScanBlock".to_string());
    columns
}

/// Serialize one row in column order.
pub fn row(record: &ScanRecord) -> Vec<String> {
    let mut fields = Vec::with_capacity(record.values.len() + 3);
    fields.push(format_elapsed(record.elapsed));
    fields.extend(record.values.iter().map(|v| format!("{v:?}")));
    fields.push(record.scan_number.to_string());
    fields.push(record.batch.to_string());
    fields
}

/// Format an elapsed duration as `D days HH:MM:SS.ffffff`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!(
        "{} days {:02}:{:02}:{:02}.{:06}",
        days,
        hours,
        minutes,
        seconds,
        elapsed.subsec_micros()
    )
}

/// Write the run log verbatim.
pub fn write_log(path: &Path, log: &AcquisitionLog) -> Result<(), OutputError> {
    std::fs::write(path, log.render()).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0 days 00:00:00.000000");
        assert_eq!(
            format_elapsed(Duration::from_micros(3_723_000_042)),
            "0 days 01:02:03.000042"
        );
        assert_eq!(
            format_elapsed(Duration::from_secs(90_061)),
            "1 days 01:01:01.000000"
        );
    }

    #[test]
    fn test_header_and_row() {
        let names = vec!["AIN0".to_string(), "AIN2".to_string()];
        assert_eq!(
            header(&names),
            vec!["Time", "AIN0", "AIN2", "ScanNumber", "ScanBlock"]
        );

        let record = ScanRecord {
            elapsed: Duration::from_millis(5),
            values: vec![1.0, -9999.0],
            scan_number: 7,
            batch: 2,
        };
        assert_eq!(
            row(&record),
            vec!["0 days 00:00:00.005000", "1.0", "-9999.0", "7", "2"]
        );
    }
}
