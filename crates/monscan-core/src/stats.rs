use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters kept by the scan scheduler for the lifetime of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Iterations that obtained a frame.
    pub total_scans: u64,
    /// Iterations that produced at least one detection.
    pub detection_scans: u64,
}

impl ScanStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scan(&mut self) {
        self.total_scans += 1;
    }

    pub fn record_detections(&mut self, count: usize) {
        if count > 0 {
            self.detection_scans += 1;
        }
    }
}

impl fmt::Display for ScanStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total scans: {}", self.total_scans)?;
        write!(f, "Screenshots with detections: {}", self.detection_scans)
    }
}
