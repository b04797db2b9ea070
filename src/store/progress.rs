//! Progress tracking for the sync driver.
//!
//! Records how many events have been folded and how far up the chain the scan has
//! reached, and logs progress at intervals so long catch-ups stay observable.

use tracing::info;

/// Interval (in folded events) between progress log lines.
const LOG_INTERVAL: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct SyncProgress {
    /// Events folded so far.
    events_processed: usize,
    /// Highest block an event has been folded from.
    highest_block: u64,
    /// Event count at the last progress line.
    last_logged: usize,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one folded event at the given block.
    pub fn record_event(&mut self, block: u64) {
        self.events_processed += 1;
        self.highest_block = self.highest_block.max(block);
    }

    /// Log progress every [`LOG_INTERVAL`] events, or immediately when forced.
    pub fn log_progress(&mut self, force: bool) {
        if force || self.events_processed - self.last_logged >= LOG_INTERVAL {
            info!(
                "Sync progress: {} events folded up to block {}",
                self.events_processed, self.highest_block
            );
            self.last_logged = self.events_processed;
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} events folded up to block {}",
            self.events_processed, self.highest_block
        )
    }
}
