use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Configuration for [`ClickHouseSink`].
///
/// The sink talks to ClickHouse over HTTP using the `JSONEachRow` format.
/// The target table is expected to have the columns `EventId`,
/// `EventName`, `LogLevel`, `Category`, `LogTime`, `Scope`, `Message` and
/// `Exception`, e.g.
///
/// ```sql
/// CREATE TABLE logs (
///   EventId   Nullable(Int32),
///   EventName Nullable(String),
///   LogLevel  LowCardinality(String),
///   Category  Nullable(String),
///   LogTime   DateTime64(3, 'UTC'),
///   Scope     Nullable(String),
///   Message   String,
///   Exception Nullable(String)
/// ) ENGINE = MergeTree ORDER BY LogTime;
/// ```
#[derive(Clone, Debug)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8123".to_string(),
            database: "default".to_string(),
            table: "logs".to_string(),
            user: None,
            password: None,
        }
    }
}

/// ClickHouse implementation of [`LogSink`] using the HTTP interface.
///
/// A batch goes out as one `INSERT` request, which ClickHouse ingests as a
/// single block: either the whole batch lands or the request fails.
#[derive(Clone)]
pub struct ClickHouseSink {
    client: Client,
    config: ClickHouseConfig,
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Transport(e.to_string())
    }
}

impl ClickHouseSink {
    /// Construct a new sink instance using the provided configuration.
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    fn auth_query(&self) -> String {
        let mut query = String::new();
        if let Some(user) = &self.config.user {
            query.push_str(&format!("&user={}", urlencoding::encode(user)));
        }
        if let Some(password) = &self.config.password {
            query.push_str(&format!("&password={}", urlencoding::encode(password)));
        }
        query
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/?database={}&query=INSERT%20INTO%20{}%20FORMAT%20JSONEachRow{}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.database),
            urlencoding::encode(&self.config.table),
            self.auth_query()
        )
    }

    fn map_record(record: &LogRecord) -> ClickHouseRow<'_> {
        ClickHouseRow {
            event_id: record.event_id(),
            event_name: record.event_name(),
            log_level: record.level().as_str(),
            category: record.category(),
            log_time: record.timestamp().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            scope: record.scope(),
            message: record.message(),
            exception: record.exception(),
        }
    }

    async fn insert(&self, body: String) -> Result<(), SinkError> {
        let resp = self.client.post(self.endpoint()).body(body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(SinkError::Status { status, body })
        }
    }

    /// Validate that the target ClickHouse table exists. This is optional
    /// and is not called automatically.
    ///
    /// **Returns**
    /// - `Ok(())` if the `DESCRIBE TABLE` query succeeded.
    /// - `Err(..)` if ClickHouse responded with a non-success status.
    pub async fn validate_schema(&self) -> Result<(), SinkError> {
        let query = format!(
            "query={}{}",
            urlencoding::encode(&format!(
                "DESCRIBE TABLE {}.{} FORMAT JSON",
                self.config.database, self.config.table
            )),
            self.auth_query()
        );

        let url = format!("{}/?{}", self.config.url.trim_end_matches('/'), query);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(SinkError::Status { status, body });
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ClickHouseRow<'a> {
    event_id: i32,
    event_name: Option<&'a str>,
    log_level: &'a str,
    category: &'a str,
    log_time: String,
    scope: Option<&'a str>,
    message: &'a str,
    exception: Option<&'a str>,
}

/// One `JSONEachRow` line per record.
fn encode_rows(records: &[LogRecord]) -> Result<String, SinkError> {
    let mut body = String::new();
    for record in records {
        body.push_str(&serde_json::to_string(&ClickHouseSink::map_record(record))?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl LogSink for ClickHouseSink {
    fn name(&self) -> &str {
        "clickhouse"
    }

    async fn write_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        let body = encode_rows(std::slice::from_ref(record))?;
        self.insert(body).await
    }

    async fn write_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let body = encode_rows(records)?;
        self.insert(body).await
    }
}
