use db_log_buffer::backend::sink_from_dsn;
use db_log_buffer::env::{env_or, LOG_SINK_DSN_ENV};
use db_log_buffer::init::{init_tracing_with_config, LayerConfig};
use tracing::{error, info, info_span};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // e.g. LOG_SINK_DSN=clickhouse://default:@127.0.0.1:8123/default/logs
    let dsn = env_or(LOG_SINK_DSN_ENV, "clickhouse://127.0.0.1:8123/default/logs");
    let sink = sink_from_dsn(&dsn)?;

    // LOG_SINK_BATCHING / LOG_SINK_BATCH_CAPACITY / LOG_SINK_LEVELS apply here.
    let logger = init_tracing_with_config(sink, LayerConfig::from_env())?;

    let span = info_span!("checkout");
    let _enter = span.enter();

    info!("service started");
    error!(event_id = 1001, event_name = "OrderFailed", order_id = 123, "order failed");

    if let Some(outcome) = logger.shutdown().await {
        println!("final flush: {:?}", outcome);
    }
    Ok(())
}
