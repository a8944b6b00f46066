use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use db_log_buffer::{
    config::LoggerSettings,
    init::{init_tracing_with_config, LayerConfig},
    record::LogRecord,
    sink::{LogSink, SinkError},
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    fn name(&self) -> &str {
        "my-custom-db"
    }

    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        // Here you would call your own client library for the target DB.
        // For the sake of example we just print the record.
        println!("[my-custom-db] {:?}", record);
        Ok(())
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        println!("[my-custom-db] bulk insert of {} records", records.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);
    let config = LayerConfig {
        settings: LoggerSettings::batched(4),
        enable_stdout: true,
    };
    let logger = init_tracing_with_config(sink, config)?;

    info!("custom backend example started");
    for attempt in 0..6 {
        error!(db = "my-custom-db", attempt, "simulated error sent via custom backend");
    }

    logger.shutdown().await;
    Ok(())
}
