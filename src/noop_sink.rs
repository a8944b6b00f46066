use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;

/// A sink that accepts and discards every record.
///
/// Useful for measuring the overhead of the buffer itself without any
/// external I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn write_one(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_batch(&self, _records: &[LogRecord]) -> Result<(), SinkError> {
        Ok(())
    }
}
