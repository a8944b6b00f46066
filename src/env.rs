//! Environment variable names used by this crate for convenient
//! configuration from services.
//!
//! These are purely helpers; the buffer and the sinks never read the
//! environment themselves.

/// Enables batching (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
pub const LOG_SINK_BATCHING_ENV: &str = "LOG_SINK_BATCHING";

/// Number of pending records that triggers a flush.
pub const LOG_SINK_BATCH_CAPACITY_ENV: &str = "LOG_SINK_BATCH_CAPACITY";

/// Attach the scope stack to every record.
pub const LOG_SINK_INCLUDE_SCOPES_ENV: &str = "LOG_SINK_INCLUDE_SCOPES";

/// Minimum levels, e.g. `Default=Information,my_app.db=Warning`.
pub const LOG_SINK_LEVELS_ENV: &str = "LOG_SINK_LEVELS";

/// Backend DSN, see [`parse_dsn`](crate::backend::parse_dsn).
pub const LOG_SINK_DSN_ENV: &str = "LOG_SINK_DSN";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
