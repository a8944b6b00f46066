pub mod record;
pub mod sink;
pub mod buffer;
pub mod logger;
pub mod layer;
pub mod config;
pub mod filter;
pub mod scope;
pub mod env;
pub mod backend;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

#[cfg(feature = "console")]
pub mod console;

pub mod init;
pub mod memory_sink;
pub mod noop_sink;
