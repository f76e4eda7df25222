//! Progress tracking

use tokio::sync::watch;
use tracing::info;

use buckscan_common::{ProbeVerdict, ScanStats, StatsSnapshot};

/// Owns one scan's counters and publishes a snapshot after every verdict.
pub struct ProgressTracker {
    stats: ScanStats,
    live: watch::Sender<StatsSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (live, _) = watch::channel(StatsSnapshot::default());
        Self {
            stats: ScanStats::new(),
            live,
        }
    }

    /// Count a verdict. Publishing never waits on subscribers.
    pub fn observe(&self, verdict: &ProbeVerdict) {
        let snapshot = self.stats.observe(verdict);
        self.live.send_replace(snapshot);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.live.subscribe()
    }

    pub fn log_summary(&self, queued: usize) {
        let s = self.snapshot();

        info!("Scan Summary:");
        info!("  Names queued: {}", queued);
        info!("  Tested: {}", s.total);
        info!("  Found: {}", s.found);
        info!("  Not found: {}", s.not_found);
        info!("  Public read: {}", s.with_public_read);
        info!("  Public write: {}", s.with_public_write);
        info!("  Credentialed read: {}", s.with_credential_read);
        if s.total > 0 {
            info!("  Hit rate: {:.1}%", (s.found as f64 / s.total as f64) * 100.0);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
