//! Progress events emitted during a pipeline run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Terminal failure categories.
///
/// Certificate problems are kept apart from generic network errors because
/// the remediation differs: trust roots need upgrading, retrying does not
/// help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    ToolUnavailable,
    Network,
    Certificate,
    Unknown,
}

impl FailureKind {
    /// One remediation step, surfaced alongside the failure notification.
    pub fn remediation(&self) -> &'static str {
        match self {
            FailureKind::ToolUnavailable => {
                "Reinstall the media toolchain or check your network, then retry"
            }
            FailureKind::Network => "Check your connection and retry",
            FailureKind::Certificate => {
                "Update your system certificate store, then retry"
            }
            FailureKind::Unknown => "See the log for the underlying error",
        }
    }
}

/// Progress for one request, strictly ordered in time
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        /// Clamped to [0, 100]; absent when the payload size is unknown
        percent: Option<f64>,
        bytes_done: u64,
        bytes_total: Option<u64>,
        speed_bps: f64,
        eta: Option<Duration>,
    },
    Postprocessing,
    Finished {
        location: PathBuf,
    },
    Failed {
        kind: FailureKind,
        detail: String,
    },
}

/// Accumulates retrieval notifications into well-formed progress events.
///
/// Byte counts are forced monotonic and percentages clamped, whatever the
/// underlying tool reports.
#[derive(Debug, Default)]
pub struct DownloadMeter {
    bytes_done: u64,
    bytes_total: Option<u64>,
}

impl DownloadMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification carrying absolute byte counts.
    pub fn on_bytes(&mut self, bytes_done: u64, bytes_total: Option<u64>, speed_bps: f64) -> ProgressEvent {
        self.bytes_done = self.bytes_done.max(bytes_done);
        if bytes_total.is_some() {
            self.bytes_total = bytes_total;
        }
        self.event(speed_bps)
    }

    /// Notification carrying a percentage, as reported by tool output lines.
    pub fn on_percent(&mut self, percent: f64, bytes_total: Option<u64>, speed_bps: f64) -> ProgressEvent {
        if bytes_total.is_some() {
            self.bytes_total = bytes_total;
        }
        if let Some(total) = self.bytes_total {
            let clamped = percent.clamp(0.0, 100.0);
            let done = (clamped / 100.0 * total as f64) as u64;
            self.bytes_done = self.bytes_done.max(done);
        }
        self.event(speed_bps)
    }

    fn event(&self, speed_bps: f64) -> ProgressEvent {
        let percent = self.bytes_total.map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.bytes_done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            }
        });

        let eta = match (self.bytes_total, speed_bps > 0.0) {
            (Some(total), true) if total > self.bytes_done => {
                Some(Duration::from_secs_f64((total - self.bytes_done) as f64 / speed_bps))
            }
            (Some(_), true) => Some(Duration::from_secs(0)),
            _ => None,
        };

        ProgressEvent::Downloading {
            percent,
            bytes_done: self.bytes_done,
            bytes_total: self.bytes_total,
            speed_bps,
            eta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent_of(event: &ProgressEvent) -> Option<f64> {
        match event {
            ProgressEvent::Downloading { percent, .. } => *percent,
            _ => panic!("expected Downloading event"),
        }
    }

    #[test]
    fn test_bytes_with_known_total() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_bytes(500, Some(1000), 100.0);
        assert_eq!(percent_of(&event), Some(50.0));

        match event {
            ProgressEvent::Downloading { eta, .. } => {
                assert_eq!(eta.unwrap().as_secs(), 5);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bytes_without_total_has_no_percent() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_bytes(500, None, 100.0);
        assert_eq!(percent_of(&event), None);
    }

    #[test]
    fn test_bytes_monotonic_across_calls() {
        let mut meter = DownloadMeter::new();
        meter.on_bytes(800, Some(1000), 100.0);
        // A stale lower report must not move progress backwards.
        let event = meter.on_bytes(300, Some(1000), 100.0);
        assert_eq!(percent_of(&event), Some(80.0));
    }

    #[test]
    fn test_percent_clamped_to_bounds() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_percent(150.0, Some(1000), 0.0);
        assert_eq!(percent_of(&event), Some(100.0));

        let mut meter = DownloadMeter::new();
        let event = meter.on_percent(-5.0, Some(1000), 0.0);
        assert_eq!(percent_of(&event), Some(0.0));
    }

    #[test]
    fn test_percent_with_zero_total() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_percent(42.0, Some(0), 0.0);
        assert_eq!(percent_of(&event), Some(0.0));
    }

    #[test]
    fn test_zero_speed_has_no_eta() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_bytes(500, Some(1000), 0.0);
        match event {
            ProgressEvent::Downloading { eta, .. } => assert!(eta.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_completed_eta_zero() {
        let mut meter = DownloadMeter::new();
        let event = meter.on_bytes(1000, Some(1000), 100.0);
        match event {
            ProgressEvent::Downloading { eta, .. } => {
                assert_eq!(eta.unwrap().as_secs(), 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_remediation_text_is_distinct() {
        assert_ne!(
            FailureKind::Network.remediation(),
            FailureKind::Certificate.remediation()
        );
    }
}
