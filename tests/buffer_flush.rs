mod common;

use common::{ids, record, GatedSink, PanickingSink};
use db_log_buffer::buffer::{BatchBuffer, FlushOutcome};
use db_log_buffer::memory_sink::MemorySink;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;

fn buffer(capacity: usize) -> Arc<BatchBuffer> {
    Arc::new(BatchBuffer::new(capacity, Handle::current()))
}

#[tokio::test]
async fn successful_flush_empties_buffer() {
    let buffer = buffer(3);
    let sink = Arc::new(MemorySink::new());

    for n in 0..3 {
        buffer.add(record(n));
    }
    assert!(buffer.is_full());
    assert!(buffer.flush(sink.clone()));

    assert_eq!(buffer.wait_idle().await, Some(FlushOutcome::Completed { written: 3 }));
    assert_eq!(buffer.len(), 0);
    assert!(!buffer.is_flushing());
    assert!(buffer.is_empty());

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(ids(&batches[0]), vec![0, 1, 2]);
}

#[tokio::test]
async fn failed_flush_keeps_newest_half() {
    let buffer = buffer(3);
    let sink = Arc::new(MemorySink::new());
    sink.fail_next_batches(1);

    for n in 0..3 {
        buffer.add(record(n));
    }
    assert!(buffer.flush(sink.clone()));

    assert_eq!(
        buffer.wait_idle().await,
        Some(FlushOutcome::Degraded { dropped: 1, retained: 2 })
    );
    assert!(!buffer.is_flushing());
    assert_eq!(ids(&buffer.pending()), vec![1, 2]);
    assert!(sink.batches().is_empty());

    // The retained records go out with the next flush.
    assert!(buffer.flush(sink.clone()));
    assert_eq!(buffer.wait_idle().await, Some(FlushOutcome::Completed { written: 2 }));
    assert_eq!(ids(&sink.records()), vec![1, 2]);
}

#[tokio::test]
async fn buffer_is_never_full_while_flushing() {
    let buffer = buffer(3);
    let sink = Arc::new(GatedSink::new());

    for n in 0..3 {
        buffer.add(record(n));
    }
    assert!(buffer.flush(sink.clone()));
    sink.started().await;

    assert!(buffer.is_flushing());
    for n in 3..6 {
        buffer.add(record(n));
    }
    assert_eq!(buffer.len(), 3);
    assert!(!buffer.is_full());
    assert!(buffer.is_empty());

    sink.open();
    assert_eq!(buffer.wait_idle().await, Some(FlushOutcome::Completed { written: 3 }));
    assert!(buffer.is_full());
    assert_eq!(ids(&buffer.pending()), vec![3, 4, 5]);
}

#[tokio::test]
async fn second_flush_while_in_flight_is_a_noop() {
    let buffer = buffer(2);
    let sink = Arc::new(GatedSink::new());

    buffer.add(record(0));
    buffer.add(record(1));
    assert!(buffer.flush(sink.clone()));
    sink.started().await;

    buffer.add(record(2));
    let flushes = buffer.stats().flushes.load(Ordering::Relaxed);
    assert!(!buffer.flush(sink.clone()));
    assert_eq!(buffer.stats().flushes.load(Ordering::Relaxed), flushes);
    assert_eq!(ids(&buffer.pending()), vec![2]);

    sink.open();
    buffer.wait_idle().await;
    assert_eq!(sink.inner.batches().len(), 1);
}

#[tokio::test]
async fn records_added_during_failed_flush_queue_behind_retained_ones() {
    let buffer = buffer(4);
    let sink = Arc::new(GatedSink::new());
    sink.inner.fail_next_batches(1);

    for n in 0..4 {
        buffer.add(record(n));
    }
    assert!(buffer.flush(sink.clone()));
    sink.started().await;
    buffer.add(record(4));
    buffer.add(record(5));

    sink.open();
    assert_eq!(
        buffer.wait_idle().await,
        Some(FlushOutcome::Degraded { dropped: 2, retained: 2 })
    );
    assert_eq!(ids(&buffer.pending()), vec![2, 3, 4, 5]);
}

#[tokio::test]
async fn panicking_sink_degrades_and_clears_flag() {
    let buffer = buffer(3);
    for n in 0..3 {
        buffer.add(record(n));
    }
    assert!(buffer.flush(Arc::new(PanickingSink)));

    assert_eq!(
        buffer.wait_idle().await,
        Some(FlushOutcome::Failed { dropped: 1, retained: 2 })
    );
    assert!(!buffer.is_flushing());
    assert_eq!(ids(&buffer.pending()), vec![1, 2]);
}

#[tokio::test]
async fn dropped_records_are_counted() {
    let buffer = buffer(10);
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);

    for n in 0..10 {
        buffer.add(record(n));
    }
    // 10 -> 5 -> 3 -> 2 -> 1
    for _ in 0..4 {
        assert!(buffer.flush(sink.clone()));
        buffer.wait_idle().await;
    }
    let stats = buffer.stats();
    assert_eq!(buffer.len(), 1);
    assert_eq!(stats.dropped.load(Ordering::Relaxed), 9);
    assert_eq!(stats.failed_flushes.load(Ordering::Relaxed), 4);
    assert_eq!(stats.written.load(Ordering::Relaxed), 0);
    assert_eq!(ids(&buffer.pending()), vec![9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing() {
    let buffer = buffer(50);
    let sink = Arc::new(MemorySink::new());

    let mut tasks = Vec::new();
    for p in 0..8 {
        let buffer = buffer.clone();
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..1_000 {
                buffer.add(record(p * 1_000 + i));
                if buffer.is_full() {
                    buffer.flush(sink.clone());
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    buffer.wait_idle().await;
    if buffer.flush(sink.clone()) {
        buffer.wait_idle().await;
    }

    let mut persisted = ids(&sink.records());
    persisted.sort_unstable();
    assert_eq!(persisted, (0..8_000).collect::<Vec<_>>());
    assert_eq!(buffer.stats().written.load(Ordering::Relaxed), 8_000);
    assert_eq!(buffer.stats().enqueued.load(Ordering::Relaxed), 8_000);
}

#[test]
fn flush_on_a_stopped_runtime_degrades_and_clears_flag() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    let buffer = Arc::new(BatchBuffer::new(2, handle));
    let sink = Arc::new(MemorySink::new());
    buffer.add(record(0));
    buffer.add(record(1));

    assert!(buffer.flush(sink.clone()));
    assert!(!buffer.is_flushing());
    assert_eq!(ids(&buffer.pending()), vec![1]);
    assert_eq!(buffer.stats().dropped.load(Ordering::Relaxed), 1);
    assert_eq!(buffer.stats().failed_flushes.load(Ordering::Relaxed), 1);

    // Growth stays bounded: the buffer keeps reporting full.
    buffer.add(record(2));
    assert!(buffer.is_full());
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn every_waiter_sees_the_in_flight_flush() {
    let buffer = buffer(2);
    let sink = Arc::new(GatedSink::new());
    buffer.add(record(0));
    buffer.add(record(1));
    assert!(buffer.flush(sink.clone()));
    sink.started().await;

    let first = tokio::spawn({
        let buffer = buffer.clone();
        async move { buffer.wait_idle().await }
    });
    let second = tokio::spawn({
        let buffer = buffer.clone();
        async move { buffer.wait_idle().await }
    });
    tokio::task::yield_now().await;
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    sink.open();
    let done = Some(FlushOutcome::Completed { written: 2 });
    assert_eq!(first.await.unwrap(), done);
    assert_eq!(second.await.unwrap(), done);
    assert!(!buffer.is_flushing());
}
