use db_log_buffer::config::LoggerSettings;
use db_log_buffer::console::ConsoleSink;
use db_log_buffer::logger::DbLogger;
use db_log_buffer::record::{EventId, LogLevel};
use db_log_buffer::scope::push_scope;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = LoggerSettings::batched(3);
    settings.include_scopes = true;
    let logger = DbLogger::new(Arc::new(ConsoleSink), settings)?;
    let orders = logger.logger("shop.orders");

    let _request = push_scope("request 7f3a");
    for n in 0..7 {
        orders
            .log(LogLevel::Information, EventId::named(n, "OrderPlaced"), format!("order {n} placed"))
            .await?;
    }

    // The seventh record is still pending until shutdown.
    logger.shutdown().await;
    Ok(())
}
