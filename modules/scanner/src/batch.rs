use monitor_core::{FieldUpdate, FieldUpdates, ProbeResult};
use std::time::Duration;
use tokio::time::Instant;

/// Completed results waiting to be written, plus the time of the last write.
pub struct ScanBatch {
    pending: FieldUpdates,
    last_flush: Instant,
    max_entries: usize,
    max_age: Duration,
}

impl ScanBatch {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        ScanBatch {
            pending: FieldUpdates::new(),
            last_flush: Instant::now(),
            max_entries: max_entries.max(1),
            max_age,
        }
    }

    pub fn push(&mut self, host: String, result: ProbeResult) {
        self.pending.insert(host, FieldUpdate::from(result));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Size threshold reached, or the interval since the last flush elapsed.
    pub fn should_flush(&self, now: Instant) -> bool {
        !self.is_empty()
            && (self.pending.len() >= self.max_entries || now.duration_since(self.last_flush) >= self.max_age)
    }

    /// Empty the buffer and restart the interval clock.
    pub fn take(&mut self) -> FieldUpdates {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.pending)
    }
}
