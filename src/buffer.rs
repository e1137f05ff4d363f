use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

struct Inner {
    pending: VecDeque<String>,
    total_written: u64,
}

/// Thread-safe FIFO of formatted flight records waiting to reach the data file.
///
/// One lock guards both the queue and the durable-write counter, and it is never
/// held across I/O. There is no upper bound: a slow storage medium makes the
/// queue grow instead of dropping samples.
pub struct SampleBuffer {
    inner: Mutex<Inner>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        SampleBuffer {
            inner: Mutex::new(Inner {
                pending: VecDeque::with_capacity(500),
                total_written: 0,
            }),
        }
    }

    // Poisoning is ignored: every critical section leaves the queue consistent
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record at the tail
    pub fn add(&self, record: String) {
        self.lock().pending.push_back(record);
    }

    /// Take every pending record in insertion order, leaving the buffer empty
    pub fn flush(&self) -> Vec<String> {
        self.lock().pending.drain(..).collect()
    }

    /// Put drained records back at the head, in their original order, so that
    /// anything added since the drain stays behind them.
    pub fn restore(&self, records: Vec<String>) {
        let mut inner = self.lock();
        for record in records.into_iter().rev() {
            inner.pending.push_front(record);
        }
    }

    /// Most recent record still resident, without removing it
    pub fn peek_last(&self) -> Option<String> {
        self.lock().pending.back().cloned()
    }

    pub fn size(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Record `count` samples as durably appended. Only call after a successful write.
    pub fn increment_written(&self, count: usize) {
        self.lock().total_written += count as u64;
    }

    pub fn total_written(&self) -> u64 {
        self.lock().total_written
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
