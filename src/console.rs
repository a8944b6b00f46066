use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use std::io::Write;

/// Sink that prints every record as one JSON line on stdout.
///
/// There is no bulk path; batches go through the default
/// [`LogSink::write_batch`], one line at a time.
#[derive(Clone, Default)]
pub struct ConsoleSink;

#[async_trait]
impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }
}
