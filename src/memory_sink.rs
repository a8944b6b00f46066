use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Sink that keeps everything it is given in memory.
///
/// Failures can be injected with [`set_failing`](Self::set_failing) or
/// [`fail_next_batches`](Self::fail_next_batches), which makes it the
/// default test double for the buffer and the emitter.
#[derive(Default)]
pub struct MemorySink {
    singles: Mutex<Vec<LogRecord>>,
    batches: Mutex<Vec<Vec<LogRecord>>>,
    failing: AtomicBool,
    failing_batches: AtomicUsize,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `n` batch writes fail.
    pub fn fail_next_batches(&self, n: usize) {
        self.failing_batches.store(n, Ordering::SeqCst);
    }

    /// Records accepted through `write_one`.
    pub fn singles(&self) -> Vec<LogRecord> {
        self.singles.lock().clone()
    }

    /// Batches accepted through `write_batch`, in arrival order.
    pub fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().clone()
    }

    /// Every persisted record, singles first, then batches in order.
    pub fn records(&self) -> Vec<LogRecord> {
        let mut all = self.singles();
        for batch in self.batches.lock().iter() {
            all.extend(batch.iter().cloned());
        }
        all
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_batch_failure(&self) -> bool {
        self.failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("memory sink is failing".to_string()));
        }
        self.singles.lock().push(record.clone());
        Ok(())
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) || self.take_batch_failure() {
            return Err(SinkError::Rejected("memory sink is failing".to_string()));
        }
        self.batches.lock().push(records.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
