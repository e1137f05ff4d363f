use crate::buffer::SampleBuffer;
use crate::stats::RunStatistics;
use crate::storage::append_records;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing was pending
    Idle,
    /// This many records reached the data file
    Written(usize),
    /// The append failed and this many records went back into the buffer
    Restored(usize),
}

/// Periodically drains the sample buffer into the data file
pub struct PersistenceStage {
    buffer: Arc<SampleBuffer>,
    stats: Arc<RunStatistics>,
    path: PathBuf,
    interval: Duration,
}

impl PersistenceStage {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        stats: Arc<RunStatistics>,
        path: PathBuf,
        interval: Duration,
    ) -> Self {
        PersistenceStage {
            buffer,
            stats,
            path,
            interval,
        }
    }

    /// One drain-and-append cycle. On failure nothing is lost: the drained records
    /// are restored ahead of anything that arrived meanwhile.
    pub fn persist_pending(&self) -> WriteOutcome {
        let drained = self.buffer.flush();
        if drained.is_empty() {
            return WriteOutcome::Idle;
        }

        let count = drained.len();
        match append_records(&self.path, &drained) {
            Ok(()) => {
                self.buffer.increment_written(count);
                self.stats.record_write(count);
                WriteOutcome::Written(count)
            }
            Err(e) => {
                warn!(
                    "[DISK] Write of {} samples to {} failed: {} (kept in buffer)",
                    count,
                    self.path.display(),
                    e
                );
                self.stats.record_write_failure();
                self.buffer.restore(drained);
                WriteOutcome::Restored(count)
            }
        }
    }

    /// [`persist_pending`](Self::persist_pending) on the blocking pool, off the
    /// async workers
    async fn persist_blocking(self: &Arc<Self>) -> WriteOutcome {
        let stage = self.clone();
        match task::spawn_blocking(move || stage.persist_pending()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[DISK] Write task failed: {}", e);
                WriteOutcome::Idle
            }
        }
    }

    /// Write loop. Wakes every `interval` until `stop` is cancelled, then performs
    /// exactly one final flush and returns its outcome.
    pub async fn run(self, stop: CancellationToken) -> WriteOutcome {
        info!(
            "[DISK] Persistence started ({} ms interval)",
            self.interval.as_millis()
        );
        let stage = Arc::new(self);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = sleep(stage.interval) => {
                    stage.persist_blocking().await;
                }
            }
        }

        let outcome = stage.persist_blocking().await;
        match outcome {
            WriteOutcome::Written(count) => info!("[DISK] Final flush: {} samples", count),
            WriteOutcome::Restored(count) => {
                error!("[DISK] Final flush failed, {} samples not saved", count)
            }
            WriteOutcome::Idle => {}
        }
        info!(
            "[DISK] Persistence stopped ({} samples on disk)",
            stage.buffer.total_written()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::write_header_if_missing;
    use std::fs;
    use tempfile::tempdir;

    fn stage(path: PathBuf, interval: Duration) -> (PersistenceStage, Arc<SampleBuffer>, Arc<RunStatistics>) {
        let buffer = Arc::new(SampleBuffer::new());
        let stats = Arc::new(RunStatistics::new());
        (
            PersistenceStage::new(buffer.clone(), stats.clone(), path, interval),
            buffer,
            stats,
        )
    }

    #[test]
    fn test_successful_write_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_data.txt");
        write_header_if_missing(&path).unwrap();
        let (stage, buffer, stats) = stage(path.clone(), Duration::from_millis(100));

        assert_eq!(stage.persist_pending(), WriteOutcome::Idle);

        buffer.add("1\t0\t0\t0\t0\t0".to_string());
        buffer.add("2\t0\t0\t0\t0\t0".to_string());
        assert_eq!(stage.persist_pending(), WriteOutcome::Written(2));

        assert_eq!(buffer.total_written(), 2);
        assert!(buffer.is_empty());
        assert_eq!(stats.disk_writes(), 1);
        assert_eq!(stats.snapshot().last_write_size, 2);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("1\t0\t0\t0\t0\t0\n2\t0\t0\t0\t0\t0\n"));
    }

    #[test]
    fn test_failed_write_restores_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unmounted").join("flight_data.txt");
        let (stage, buffer, stats) = stage(path, Duration::from_millis(100));

        buffer.add("a".to_string());
        buffer.add("b".to_string());
        assert_eq!(stage.persist_pending(), WriteOutcome::Restored(2));

        assert_eq!(buffer.total_written(), 0);
        assert_eq!(stats.snapshot().write_failures, 1);
        assert_eq!(buffer.flush(), vec!["a", "b"]);
    }

    #[test]
    fn test_recovers_after_medium_returns() {
        let dir = tempdir().unwrap();
        let media = dir.path().join("media");
        let path = media.join("flight_data.txt");
        let (stage, buffer, _stats) = stage(path.clone(), Duration::from_millis(100));

        buffer.add("a".to_string());
        assert_eq!(stage.persist_pending(), WriteOutcome::Restored(1));
        buffer.add("b".to_string());

        fs::create_dir(&media).unwrap();
        assert_eq!(stage.persist_pending(), WriteOutcome::Written(2));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        assert_eq!(buffer.total_written(), 2);
    }

    #[tokio::test]
    async fn test_final_flush_failure_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unmounted").join("flight_data.txt");
        let (stage, buffer, stats) = stage(path, Duration::from_secs(60));
        let stop = CancellationToken::new();

        buffer.add("a".to_string());
        buffer.add("b".to_string());
        stop.cancel();

        assert_eq!(stage.run(stop).await, WriteOutcome::Restored(2));
        assert_eq!(stats.snapshot().write_failures, 1);
        assert_eq!(buffer.flush(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_periodic_writes_and_final_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_data.txt");
        let (stage, buffer, stats) = stage(path.clone(), Duration::from_millis(20));
        let stop = CancellationToken::new();

        let handle = tokio::spawn(stage.run(stop.clone()));

        buffer.add("1".to_string());
        sleep(Duration::from_millis(80)).await;
        assert!(stats.disk_writes() >= 1);
        assert_eq!(buffer.total_written(), 1);

        buffer.add("2".to_string());
        buffer.add("3".to_string());
        stop.cancel();
        let outcome = handle.await.unwrap();

        // Either the periodic cycle or the final flush picked up the residue
        assert!(matches!(outcome, WriteOutcome::Written(_) | WriteOutcome::Idle));
        assert_eq!(buffer.total_written(), 3);
        assert!(buffer.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2\n3\n");
    }

    #[tokio::test]
    async fn test_final_flush_runs_once_after_stop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_data.txt");
        let (stage, buffer, stats) = stage(path.clone(), Duration::from_secs(3600));
        let stop = CancellationToken::new();

        buffer.add("only".to_string());
        stop.cancel();
        let outcome = stage.run(stop).await;

        assert_eq!(outcome, WriteOutcome::Written(1));
        assert_eq!(stats.disk_writes(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "only\n");
    }
}
