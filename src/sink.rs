use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Failure reported by a [`LogSink`].
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend rejected the write: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

/// Durable destination for [`LogRecord`]s.
///
/// A sink offers two write paths. [`write_one`](LogSink::write_one) is
/// awaited by the caller and its error is returned to whoever logged the
/// record. [`write_batch`](LogSink::write_batch) is driven by a
/// [`BatchBuffer`](crate::buffer::BatchBuffer) flush on a background task;
/// its error is never surfaced to producers, the buffer degrades instead.
///
/// Sinks never see the buffer itself. They only report whether the whole
/// batch was persisted, and the buffer decides what to keep.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Short label used in diagnostics.
    fn name(&self) -> &str {
        "sink"
    }

    /// Persist exactly one record.
    ///
    /// **Returns**
    /// - `Ok(())` once the backend acknowledged the record.
    /// - `Err(..)` on connection failures, constraint violations and the
    ///   like. There is no retry on this path.
    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Persist a batch of records in one operation.
    ///
    /// Backends with a bulk API should override this and make the write
    /// all-or-nothing. Any `Err` is treated as "nothing from this batch was
    /// persisted".
    ///
    /// The default implementation is for backends without a bulk path: it
    /// writes the records one by one and stops at the first failure.
    async fn write_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        for record in records {
            self.write_one(record).await?;
        }
        Ok(())
    }

    /// Release connections and other transport resources.
    ///
    /// Called once during [`DbLogger::shutdown`](crate::logger::DbLogger::shutdown)
    /// after the final flush. Default implementation is a no-op.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
