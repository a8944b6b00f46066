use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use db_log_buffer::config::LoggerSettings;
use db_log_buffer::logger::DbLogger;
use db_log_buffer::memory_sink::MemorySink;
use db_log_buffer::record::{LogLevel, LogRecord};

/// Several producer tasks hammer one buffer while the sink fails every
/// tenth batch, then the run reports how many records made it.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(MemorySink::new());
    let logger = DbLogger::new(sink.clone(), LoggerSettings::batched(1_000))?;

    let producers: i32 = 8;
    let per_producer: usize = 25_000;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for p in 0..producers {
        let logger = logger.clone();
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..per_producer {
                if i % 10_000 == 0 {
                    sink.fail_next_batches(1);
                }
                let record = LogRecord::new(p, LogLevel::Warning, "load.custom", format!("record {i}"));
                logger.submit(record);
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    let elapsed = start.elapsed();
    let outcome = logger.shutdown().await;
    let stats = logger.buffer().stats();
    let total = producers as usize * per_producer;

    println!("custom config: {} records from {} producers in {:?} (~{:.0} rec/s)",
        total,
        producers,
        elapsed,
        total as f64 / elapsed.as_secs_f64()
    );
    println!("last flush: {:?}", outcome);
    println!("persisted: {}, dropped: {}, failed flushes: {}",
        sink.records().len(),
        stats.dropped.load(Ordering::Relaxed),
        stats.failed_flushes.load(Ordering::Relaxed),
    );
    Ok(())
}
