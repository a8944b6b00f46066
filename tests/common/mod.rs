#![allow(dead_code)]

use async_trait::async_trait;
use db_log_buffer::memory_sink::MemorySink;
use db_log_buffer::record::{LogLevel, LogRecord};
use db_log_buffer::sink::{LogSink, SinkError};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub fn record(n: i32) -> LogRecord {
    LogRecord::new(n, LogLevel::Information, "test", format!("record {n}"))
}

pub fn ids(records: &[LogRecord]) -> Vec<i32> {
    records.iter().map(|r| r.event_id()).collect()
}

/// Memory sink whose batch writes block until `open` is called, so a test
/// can observe the buffer while a flush is in flight.
pub struct GatedSink {
    pub inner: MemorySink,
    gate: Semaphore,
    started: Notify,
}

impl GatedSink {
    pub fn new() -> Self {
        Self {
            inner: MemorySink::new(),
            gate: Semaphore::new(0),
            started: Notify::new(),
        }
    }

    /// Wait until a batch write has started.
    pub async fn started(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.started.notified())
            .await
            .expect("batch write never started");
    }

    /// Let one blocked batch write proceed.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl LogSink for GatedSink {
    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.inner.write_one(record).await
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| SinkError::Other(Box::new(e)))?;
        permit.forget();
        self.inner.write_batch(records).await
    }
}

/// Sink whose batch write panics.
pub struct PanickingSink;

#[async_trait]
impl LogSink for PanickingSink {
    async fn write_one(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_batch(&self, _records: &[LogRecord]) -> Result<(), SinkError> {
        panic!("backend driver bug");
    }
}
