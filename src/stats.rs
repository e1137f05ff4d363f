use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters shared by the ingestion and persistence stages.
///
/// Plain counters use relaxed ordering: they are diagnostic. The stop flag uses
/// release/acquire because it gates termination of the recording loop.
#[derive(Debug, Default)]
pub struct RunStatistics {
    samples_received: AtomicU64,
    hud_received: AtomicU64,
    lines_discarded: AtomicU64,
    transport_errors: AtomicU64,
    stop_received: AtomicBool,
    disk_writes: AtomicU64,
    write_failures: AtomicU64,
    last_write_size: AtomicU64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hud(&self) {
        self.hud_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.lines_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_stop_received(&self) {
        self.stop_received.store(true, Ordering::Release);
    }

    pub fn record_write(&self, count: usize) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
        self.last_write_size.store(count as u64, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_received(&self) -> u64 {
        self.samples_received.load(Ordering::Relaxed)
    }

    pub fn hud_received(&self) -> u64 {
        self.hud_received.load(Ordering::Relaxed)
    }

    pub fn stop_received(&self) -> bool {
        self.stop_received.load(Ordering::Acquire)
    }

    pub fn disk_writes(&self) -> u64 {
        self.disk_writes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_received: self.samples_received(),
            hud_received: self.hud_received(),
            lines_discarded: self.lines_discarded.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            stop_received: self.stop_received(),
            disk_writes: self.disk_writes(),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            last_write_size: self.last_write_size.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunStatistics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_received: u64,
    pub hud_received: u64,
    pub lines_discarded: u64,
    pub transport_errors: u64,
    pub stop_received: bool,
    pub disk_writes: u64,
    pub write_failures: u64,
    pub last_write_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters() {
        let stats = RunStatistics::new();
        stats.record_sample();
        stats.record_sample();
        stats.record_hud();
        stats.record_write(12);
        stats.record_write(5);
        stats.record_write_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.samples_received, 2);
        assert_eq!(snap.hud_received, 1);
        assert_eq!(snap.disk_writes, 2);
        assert_eq!(snap.last_write_size, 5);
        assert_eq!(snap.write_failures, 1);
        assert!(!snap.stop_received);
    }

    #[test]
    fn test_stop_flag_visible_across_threads() {
        let stats = Arc::new(RunStatistics::new());
        let writer = stats.clone();
        thread::spawn(move || writer.mark_stop_received())
            .join()
            .unwrap();
        assert!(stats.stop_received());
    }
}
