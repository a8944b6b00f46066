use crate::config::LoggerSettings;
use crate::layer::DbLogLayer;
use crate::logger::{DbLogger, InitError};
use crate::sink::LogSink;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the installed logging stack.
///
/// **Fields**
/// - `settings`: batching, capacity, scopes and level table for the
///   [`DbLogger`] behind the layer.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is added
///   next to [`DbLogLayer`] so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub settings: LoggerSettings,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            settings: LoggerSettings::default(),
            enable_stdout: true,
        }
    }
}

impl LayerConfig {
    /// Settings read from the `LOG_SINK_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            settings: LoggerSettings::from_env(),
            ..Self::default()
        }
    }
}

/// Install a global `tracing` subscriber that persists events through
/// `sink`.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that receives the records.
/// - `config`: [`LayerConfig`] controlling batching and console output.
///
/// **Returns**
/// - the [`DbLogger`] behind the layer; call
///   [`DbLogger::shutdown`] before exit so pending records are flushed.
/// - `Err(..)` if no tokio runtime is running or a global subscriber was
///   already installed.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<DbLogger, InitError> {
    let logger = DbLogger::new(sink, config.settings)?;
    let layer = DbLogLayer::new(logger.clone());

    // The two subscriber shapes have different types, so build each one
    // in its own branch.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(logger)
}

/// Install the subscriber with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<DbLogger, InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
