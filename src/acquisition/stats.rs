use std::time::Duration;

use super::AcquisitionTotals;

/// Summary statistics for one run. Descriptive only.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionStats {
    /// Scans received
    pub total_scans: u64,
    /// Wall-clock time spent reading
    pub elapsed: Duration,
    /// Scan rate the device committed to
    pub device_scan_rate: Option<f64>,
    /// Scans per second actually received
    pub timed_scan_rate: Option<f64>,
    /// Input samples per second actually received
    pub timed_sample_rate: Option<f64>,
    /// Scans lost to overflow
    pub skipped_scans: u64,
    /// Sentinel samples seen
    pub skipped_samples: u64,
}

impl AcquisitionStats {
    /// Derive statistics from loop totals.
    ///
    /// Timed rates are `None` when nothing was received or no time elapsed.
    pub fn compute(
        totals: &AcquisitionTotals,
        n_inputs: usize,
        elapsed: Duration,
        device_scan_rate: Option<f64>,
    ) -> Self {
        let seconds = elapsed.as_secs_f64();
        let measurable = seconds > 0.0 && totals.total_scans > 0;
        let scan_rate = measurable.then(|| totals.total_scans as f64 / seconds);
        let sample_rate = scan_rate.map(|rate| rate * n_inputs as f64);
        let skipped_scans = if n_inputs == 0 {
            0
        } else {
            totals.total_skipped / n_inputs as u64
        };

        Self {
            total_scans: totals.total_scans,
            elapsed,
            device_scan_rate,
            timed_scan_rate: scan_rate,
            timed_sample_rate: sample_rate,
            skipped_scans,
            skipped_samples: totals.total_skipped,
        }
    }

    /// The statistics block written to the run log.
    pub fn render(&self) -> String {
        format!(
            "Total scans = {}\n\
             Time taken = {:.6} seconds\n\
             Device Scan Rate = {} scans/second\n\
             Timed Scan Rate = {} scans/second\n\
             Timed Sample Rate = {} samples/second\n\
             Skipped scans = {}",
            self.total_scans,
            self.elapsed.as_secs_f64(),
            rate(self.device_scan_rate),
            rate(self.timed_scan_rate),
            rate(self.timed_sample_rate),
            self.skipped_scans
        )
    }
}

fn rate(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6}", v),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let totals = AcquisitionTotals {
            total_scans: 600,
            total_skipped: 4,
            ..Default::default()
        };
        let stats = AcquisitionStats::compute(&totals, 2, Duration::from_millis(300), Some(2000.0));
        assert!((stats.timed_scan_rate.unwrap() - 2000.0).abs() < 1e-6);
        assert!((stats.timed_sample_rate.unwrap() - 4000.0).abs() < 1e-6);
        assert_eq!(stats.skipped_scans, 2);
    }

    #[test]
    fn test_no_scans_renders_not_available() {
        let stats = AcquisitionStats::compute(
            &AcquisitionTotals::default(),
            2,
            Duration::from_millis(5),
            Some(2000.0),
        );
        assert_eq!(stats.timed_scan_rate, None);
        let text = stats.render();
        assert!(text.contains("Total scans = 0"));
        assert!(text.contains("Timed Scan Rate = n/a scans/second"));
        assert!(text.contains("Timed Sample Rate = n/a"));
        assert!(text.contains("Device Scan Rate = 2000.000000"));
    }

    #[test]
    fn test_zero_elapsed() {
        let totals = AcquisitionTotals {
            total_scans: 10,
            ..Default::default()
        };
        let stats = AcquisitionStats::compute(&totals, 1, Duration::ZERO, None);
        assert_eq!(stats.timed_scan_rate, None);
        assert!(stats.render().contains("Device Scan Rate = n/a"));
    }
}
