use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use db_log_buffer::config::LoggerSettings;
use db_log_buffer::init::{init_tracing_with_config, LayerConfig};
use db_log_buffer::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());
    let config = LayerConfig {
        settings: LoggerSettings::batched(100),
        enable_stdout: false,
    };
    let logger = init_tracing_with_config(sink, config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.shutdown().await;
    let stats = logger.buffer().stats();
    println!("flushes: {}, dropped: {}",
        stats.flushes.load(std::sync::atomic::Ordering::Relaxed),
        stats.dropped.load(std::sync::atomic::Ordering::Relaxed),
    );
    Ok(())
}
