use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Severity of a [`LogRecord`], ordered from least to most severe.
///
/// `None` sorts above every real level; configuring it as a minimum
/// disables a category entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Critical => "Critical",
            LogLevel::None => "None",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" | "fatal" => Ok(LogLevel::Critical),
            "none" | "off" => Ok(LogLevel::None),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Numeric event identifier with an optional name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventId {
    pub id: i32,
    pub name: Option<String>,
}

impl EventId {
    pub fn new(id: i32) -> Self {
        EventId { id, name: None }
    }

    pub fn named(id: i32, name: impl Into<String>) -> Self {
        EventId { id, name: Some(name.into()) }
    }
}

impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        EventId::new(id)
    }
}

/// One structured log event waiting to be persisted.
///
/// The timestamp is captured when the record is constructed and cannot be
/// changed afterwards. Optional parts (scope, exception) are attached with
/// the consuming `with_*` builders before the record is handed to a
/// [`DbLogger`](crate::logger::DbLogger).
///
/// Serialized field names match the persisted column names
/// (`EventId`, `EventName`, `LogLevel`, `Category`, `LogTime`, `Scope`,
/// `Message`, `Exception`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord {
    event_id: i32,
    event_name: Option<String>,
    #[serde(rename = "LogLevel")]
    level: LogLevel,
    category: String,
    #[serde(rename = "LogTime")]
    timestamp: DateTime<Utc>,
    scope: Option<String>,
    message: String,
    exception: Option<String>,
}

impl LogRecord {
    pub fn new(
        event: impl Into<EventId>,
        level: LogLevel,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let event = event.into();
        LogRecord {
            event_id: event.id,
            event_name: event.name,
            level,
            category: category.into(),
            timestamp: Utc::now(),
            scope: None,
            message: message.into(),
            exception: None,
        }
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Capture an error and its `source()` chain as the exception text.
    pub fn with_error(self, error: &(dyn Error + 'static)) -> Self {
        let detail = render_error(error);
        self.with_exception(detail)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }
}

pub(crate) fn render_error(error: &(dyn Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    #[error("insert failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Critical < LogLevel::None);
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Information));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" Critical ".parse::<LogLevel>(), Ok(LogLevel::Critical));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn error_chain_is_rendered() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let record = LogRecord::new(7, LogLevel::Error, "app.db", "write").with_error(&err);
        assert_eq!(record.exception(), Some("insert failed\ncaused by: disk full"));
    }

    #[test]
    fn serializes_with_column_names() {
        let record = LogRecord::new(EventId::named(3, "Started"), LogLevel::Warning, "app", "hi");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["EventId"], 3);
        assert_eq!(value["EventName"], "Started");
        assert_eq!(value["LogLevel"], "Warning");
        assert_eq!(value["Category"], "app");
        assert_eq!(value["Message"], "hi");
        assert!(value["Scope"].is_null());
        assert!(value["LogTime"].is_string());
    }
}
