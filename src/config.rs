use crate::buffer::{clamp_capacity, DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::env::{
    LOG_SINK_BATCHING_ENV, LOG_SINK_BATCH_CAPACITY_ENV, LOG_SINK_INCLUDE_SCOPES_ENV,
    LOG_SINK_LEVELS_ENV,
};
use crate::filter::LevelTable;

/// Settings consumed by [`DbLogger`](crate::logger::DbLogger).
///
/// **Fields**
/// - `batching`: when `false` every record is written synchronously via
///   [`LogSink::write_one`](crate::sink::LogSink::write_one).
/// - `batch_capacity`: pending record count that triggers a flush, within
///   `1..=MAX_CAPACITY`.
/// - `include_scopes`: attach the scope stack to each record.
/// - `levels`: minimum severity per category prefix.
///
/// Bad values never fail; they fall back to the defaults below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerSettings {
    pub batching: bool,
    pub batch_capacity: usize,
    pub include_scopes: bool,
    pub levels: LevelTable,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            batching: false,
            batch_capacity: DEFAULT_CAPACITY,
            include_scopes: false,
            levels: LevelTable::default(),
        }
    }
}

impl LoggerSettings {
    /// Batching on with the given capacity, everything else default.
    pub fn batched(capacity: usize) -> Self {
        Self {
            batching: true,
            batch_capacity: clamp_capacity(capacity),
            ..Self::default()
        }
    }

    /// Build settings from a key lookup (see [`crate::env`] for the keys).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let batching = lookup(LOG_SINK_BATCHING_ENV)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let batch_capacity = match lookup(LOG_SINK_BATCH_CAPACITY_ENV) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > MAX_CAPACITY => {
                    tracing::warn!(value = n, max = MAX_CAPACITY, "batch capacity too large, clamping");
                    MAX_CAPACITY
                }
                Ok(n) => clamp_capacity(n),
                Err(_) => {
                    tracing::warn!(value = %raw, default = DEFAULT_CAPACITY, "invalid batch capacity, using default");
                    DEFAULT_CAPACITY
                }
            },
            None => DEFAULT_CAPACITY,
        };

        let include_scopes = lookup(LOG_SINK_INCLUDE_SCOPES_ENV)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let levels = lookup(LOG_SINK_LEVELS_ENV)
            .map(|list| LevelTable::parse(&list))
            .filter(|table| !table.is_empty())
            .unwrap_or_default();

        Self {
            batching,
            batch_capacity,
            include_scopes,
            levels,
        }
    }

    /// Build settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
