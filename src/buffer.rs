use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinError;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Largest accepted capacity. Larger values are clamped to it.
pub const MAX_CAPACITY: usize = 100_000;

/// Clamp a configured capacity into `1..=MAX_CAPACITY`.
pub fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(1, MAX_CAPACITY)
}

/// Result of one flush, as interpreted by the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The sink persisted every record of the batch.
    Completed { written: usize },
    /// The sink returned an error. The oldest `dropped` records of the batch
    /// were discarded and `retained` were put back for the next flush.
    Degraded { dropped: usize, retained: usize },
    /// The sink task panicked, or the flush was cancelled before it could
    /// finish (for example because its runtime shut down). Same degrade
    /// policy as [`FlushOutcome::Degraded`].
    Failed { dropped: usize, retained: usize },
}

/// Counters describing what the buffer did with the records it accepted.
///
/// `dropped` is the number of records lost to the degrade policy; nothing
/// else in the buffer discards data.
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Records accepted by [`BatchBuffer::add`].
    pub enqueued: AtomicU64,
    /// Flushes started.
    pub flushes: AtomicU64,
    /// Records the sink reported as persisted.
    pub written: AtomicU64,
    /// Records discarded after failed batch writes.
    pub dropped: AtomicU64,
    /// Flushes that ended in `Degraded` or `Failed`.
    pub failed_flushes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
struct FlushStatus {
    running: bool,
    last: Option<FlushOutcome>,
}

/// In-memory holding area for records pending a batch write.
///
/// At most one flush is in flight at a time. While it runs, the buffer
/// reports itself as neither full nor empty so callers do not pile up a
/// second flush behind it. Records added during a flush are kept and go out
/// with the next one.
///
/// The exclusion primitive is only held for a push or a snapshot swap,
/// never across sink I/O, so producers never wait on the backend.
pub struct BatchBuffer {
    records: Mutex<Vec<LogRecord>>,
    capacity: AtomicUsize,
    flushing: AtomicBool,
    status: watch::Sender<FlushStatus>,
    runtime: Handle,
    stats: BufferStats,
}

impl BatchBuffer {
    /// Create an empty buffer whose flushes run on `runtime`.
    ///
    /// `capacity` is clamped with [`clamp_capacity`].
    pub fn new(capacity: usize, runtime: Handle) -> Self {
        let capacity = clamp_capacity(capacity);
        let (status, _) = watch::channel(FlushStatus::default());
        BatchBuffer {
            records: Mutex::new(Vec::with_capacity(capacity.saturating_mul(2))),
            capacity: AtomicUsize::new(capacity),
            flushing: AtomicBool::new(false),
            status,
            runtime,
            stats: BufferStats::default(),
        }
    }

    /// Append a record to the tail. Never fails.
    pub fn add(&self, record: LogRecord) {
        self.records.lock().push(record);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// `true` when no flush is running and the pending count reached the
    /// configured capacity.
    pub fn is_full(&self) -> bool {
        !self.is_flushing() && self.records.lock().len() >= self.capacity()
    }

    /// `true` while a flush is running or when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.is_flushing() || self.records.lock().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Number of records currently pending (excluding an in-flight batch).
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Change the flush threshold and reserve room for `2n` records, so a
    /// burst arriving during a flush of `n` records does not reallocate.
    ///
    /// `capacity` is clamped with [`clamp_capacity`].
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = clamp_capacity(capacity);
        self.capacity.store(capacity, Ordering::Relaxed);

        let mut records = self.records.lock();
        let wanted = capacity.saturating_mul(2);
        if records.capacity() < wanted {
            let additional = wanted.saturating_sub(records.len());
            records.reserve(additional);
        }
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Copy of the pending records, oldest first.
    pub fn pending(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Hand everything currently pending to `sink` on a background task.
    ///
    /// **Returns**
    /// - `true` if a flush was started.
    /// - `false` if one is already in flight or nothing is pending; no
    ///   state changes in that case.
    ///
    /// The caller never waits for the write; use
    /// [`wait_idle`](Self::wait_idle) to join it. If the runtime has shut
    /// down the task never runs, and the batch is degraded on the spot as a
    /// [`FlushOutcome::Failed`] flush.
    pub fn flush(self: &Arc<Self>, sink: Arc<dyn LogSink>) -> bool {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let spare = Vec::with_capacity(self.capacity().saturating_mul(2));
        let batch = {
            let mut records = self.records.lock();
            if records.is_empty() {
                self.flushing.store(false, Ordering::Release);
                return false;
            }
            std::mem::replace(&mut *records, spare)
        };

        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        self.status.send_modify(|status| status.running = true);
        tracing::debug!(sink = sink.name(), records = batch.len(), "starting log buffer flush");

        // Built before the spawn so that a future dropped unpolled still
        // settles the batch and clears the flag.
        let mut task = FlushTask {
            buffer: Arc::clone(self),
            batch: Some(Arc::new(batch)),
            outcome: None,
        };
        self.runtime.spawn(async move { task.run(sink).await });
        true
    }

    /// Wait until no flush is in flight and return the outcome of the most
    /// recent one, or `None` if no flush has finished yet.
    ///
    /// Any number of callers may wait at the same time; all of them are
    /// released when the flush settles.
    pub async fn wait_idle(&self) -> Option<FlushOutcome> {
        let mut status = self.status.subscribe();
        status
            .wait_for(|status| !status.running)
            .await
            .ok()
            .and_then(|status| status.last)
    }

    fn settle(
        &self,
        sink_name: &str,
        batch: Vec<LogRecord>,
        result: Result<Result<(), SinkError>, JoinError>,
    ) -> FlushOutcome {
        let total = batch.len();
        match result {
            Ok(Ok(())) => {
                self.stats.written.fetch_add(total as u64, Ordering::Relaxed);
                tracing::debug!(sink = sink_name, written = total, "log buffer flush completed");
                FlushOutcome::Completed { written: total }
            }
            Ok(Err(e)) => {
                let (dropped, retained) = self.degrade(batch);
                tracing::warn!(
                    sink = sink_name,
                    error = %e,
                    dropped,
                    retained,
                    "batch write failed, discarded oldest half of pending log records"
                );
                FlushOutcome::Degraded { dropped, retained }
            }
            Err(e) => {
                let (dropped, retained) = self.degrade(batch);
                tracing::error!(
                    sink = sink_name,
                    error = %e,
                    dropped,
                    retained,
                    "batch write task aborted, discarded oldest half of pending log records"
                );
                FlushOutcome::Failed { dropped, retained }
            }
        }
    }

    /// Drop the oldest half of a failed batch and put the rest back in front
    /// of whatever was added while the flush ran.
    fn degrade(&self, mut batch: Vec<LogRecord>) -> (usize, usize) {
        let dropped = batch.len() / 2;
        batch.drain(..dropped);
        let retained = batch.len();

        {
            let mut records = self.records.lock();
            batch.append(&mut records);
            *records = batch;
        }

        self.stats.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
        (dropped, retained)
    }

    /// Publish the outcome, then clear the flag. In that order, so a waiter
    /// never observes the idle state of a flush that a newer one replaced.
    fn finish(&self, outcome: Option<FlushOutcome>) {
        self.status.send_modify(|status| {
            status.running = false;
            if outcome.is_some() {
                status.last = outcome;
            }
        });
        self.flushing.store(false, Ordering::Release);
    }
}

/// One in-flight flush. Owns the snapshot until the sink has answered;
/// dropping it, polled or not, settles whatever is still held and clears the
/// in-progress flag.
struct FlushTask {
    buffer: Arc<BatchBuffer>,
    batch: Option<Arc<Vec<LogRecord>>>,
    outcome: Option<FlushOutcome>,
}

impl FlushTask {
    async fn run(&mut self, sink: Arc<dyn LogSink>) {
        let Some(batch) = self.batch.clone() else {
            return;
        };
        let sink_name = sink.name().to_string();

        // The write runs on its own task so a panicking sink cannot take
        // the snapshot or the in-progress flag down with it.
        let write = self
            .buffer
            .runtime
            .spawn(async move { sink.write_batch(&batch).await });
        let result = write.await;

        let batch = self.batch.take().map(into_records).unwrap_or_default();
        self.outcome = Some(self.buffer.settle(&sink_name, batch, result));
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            let (dropped, retained) = self.buffer.degrade(into_records(batch));
            tracing::error!(
                dropped,
                retained,
                "log buffer flush was cancelled, discarded oldest half of pending log records"
            );
            self.outcome = Some(FlushOutcome::Failed { dropped, retained });
        }
        self.buffer.finish(self.outcome);
    }
}

fn into_records(batch: Arc<Vec<LogRecord>>) -> Vec<LogRecord> {
    Arc::try_unwrap(batch).unwrap_or_else(|shared| (*shared).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_sink::MemorySink;
    use crate::record::LogLevel;

    fn record(n: usize) -> LogRecord {
        LogRecord::new(n as i32, LogLevel::Information, "test", format!("record {n}"))
    }

    fn buffer(capacity: usize) -> Arc<BatchBuffer> {
        Arc::new(BatchBuffer::new(capacity, Handle::current()))
    }

    #[tokio::test]
    async fn add_keeps_every_record_in_order() {
        let buffer = buffer(10);
        for n in 0..25 {
            buffer.add(record(n));
        }
        assert_eq!(buffer.len(), 25);
        let ids: Vec<i32> = buffer.pending().iter().map(|r| r.event_id()).collect();
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
        assert_eq!(buffer.stats().enqueued.load(Ordering::Relaxed), 25);
    }

    #[tokio::test]
    async fn full_exactly_at_capacity() {
        let buffer = buffer(1);
        buffer.set_capacity(4);
        for n in 0..3 {
            buffer.add(record(n));
        }
        assert!(!buffer.is_full());
        buffer.add(record(3));
        assert!(buffer.is_full());
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let buffer = buffer(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.set_capacity(0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[tokio::test]
    async fn set_capacity_reserves_room_for_two_batches() {
        let buffer = buffer(2);
        buffer.set_capacity(50);
        assert!(buffer.records.lock().capacity() >= 100);
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_is_a_noop() {
        let buffer = buffer(3);
        let sink = Arc::new(MemorySink::new());
        assert!(buffer.is_empty());
        assert!(!buffer.flush(sink.clone()));
        assert!(!buffer.is_flushing());
        assert_eq!(buffer.wait_idle().await, None);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn odd_sized_failure_keeps_newest_records() {
        let buffer = buffer(5);
        let sink = Arc::new(MemorySink::new());
        sink.fail_next_batches(1);
        for n in 0..5 {
            buffer.add(record(n));
        }
        assert!(buffer.flush(sink.clone()));
        assert_eq!(
            buffer.wait_idle().await,
            Some(FlushOutcome::Degraded { dropped: 2, retained: 3 })
        );
        let ids: Vec<i32> = buffer.pending().iter().map(|r| r.event_id()).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(buffer.stats().dropped.load(Ordering::Relaxed), 2);
        assert_eq!(buffer.stats().failed_flushes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn single_record_failure_drops_nothing() {
        let buffer = buffer(1);
        let sink = Arc::new(MemorySink::new());
        sink.set_failing(true);
        buffer.add(record(0));
        assert!(buffer.flush(sink));
        assert_eq!(
            buffer.wait_idle().await,
            Some(FlushOutcome::Degraded { dropped: 0, retained: 1 })
        );
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn oversized_capacity_is_clamped() {
        let buffer = buffer(usize::MAX);
        assert_eq!(buffer.capacity(), MAX_CAPACITY);
        buffer.set_capacity(usize::MAX / 2 + 1);
        assert_eq!(buffer.capacity(), MAX_CAPACITY);
        assert!(buffer.records.lock().capacity() >= MAX_CAPACITY * 2);
    }
}
