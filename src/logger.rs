use crate::buffer::{BatchBuffer, FlushOutcome};
use crate::config::LoggerSettings;
use crate::record::{EventId, LogLevel, LogRecord};
use crate::scope::current_scope;
use crate::sink::{LogSink, SinkError};
use parking_lot::RwLock;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Error returned when the logger or the global subscriber cannot be set up.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("no tokio runtime is running on this thread")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

struct Inner {
    sink: Arc<dyn LogSink>,
    buffer: Arc<BatchBuffer>,
    settings: RwLock<Arc<LoggerSettings>>,
    runtime: Handle,
    sync_failures: AtomicU64,
}

/// Owner of a [`BatchBuffer`] and the sink behind it.
///
/// For every record it either writes synchronously through the sink or
/// appends to the buffer and starts a flush once the buffer is full,
/// depending on [`LoggerSettings::batching`]. Cloning is cheap; all clones
/// share the same buffer.
#[derive(Clone)]
pub struct DbLogger {
    inner: Arc<Inner>,
}

impl DbLogger {
    /// Create a logger whose flushes run on the current tokio runtime.
    pub fn new(sink: Arc<dyn LogSink>, settings: LoggerSettings) -> Result<Self, InitError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(runtime, sink, settings))
    }

    /// Create a logger whose flushes run on `runtime`.
    pub fn with_runtime(runtime: Handle, sink: Arc<dyn LogSink>, settings: LoggerSettings) -> Self {
        let buffer = Arc::new(BatchBuffer::new(settings.batch_capacity, runtime.clone()));
        DbLogger {
            inner: Arc::new(Inner {
                sink,
                buffer,
                settings: RwLock::new(Arc::new(settings)),
                runtime,
                sync_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Logger bound to one category.
    pub fn logger(&self, category: impl Into<String>) -> CategoryLogger {
        CategoryLogger {
            category: category.into(),
            owner: self.clone(),
        }
    }

    pub fn settings(&self) -> Arc<LoggerSettings> {
        self.inner.settings.read().clone()
    }

    pub fn buffer(&self) -> &Arc<BatchBuffer> {
        &self.inner.buffer
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.inner.sink
    }

    /// Synchronous writes issued by [`submit`](Self::submit) that failed.
    pub fn sync_failures(&self) -> u64 {
        self.inner.sync_failures.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self, category: &str, level: LogLevel) -> bool {
        self.inner.settings.read().levels.is_enabled(category, level)
    }

    /// Route one already-filtered record.
    ///
    /// With batching off the record goes straight to
    /// [`LogSink::write_one`] and its error is returned. With batching on
    /// this only appends (and maybe starts a flush) and always succeeds.
    pub async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
        if self.settings().batching {
            self.enqueue(record);
            Ok(())
        } else {
            self.inner.sink.write_one(&record).await
        }
    }

    /// Route one record without waiting.
    ///
    /// For callers that cannot await, such as a `tracing` layer. When
    /// batching is off the synchronous write runs on a spawned task and a
    /// failure is counted in [`sync_failures`](Self::sync_failures).
    pub fn submit(&self, record: LogRecord) {
        if self.settings().batching {
            self.enqueue(record);
            return;
        }

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            if let Err(e) = inner.sink.write_one(&record).await {
                inner.sync_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(sink = inner.sink.name(), error = %e, "failed to write log record");
            }
        });
    }

    fn enqueue(&self, record: LogRecord) {
        let buffer = &self.inner.buffer;
        buffer.add(record);
        if buffer.is_full() {
            buffer.flush(Arc::clone(&self.inner.sink));
        }
    }

    /// Apply new settings.
    ///
    /// Pending records are flushed under the old settings, then the buffer
    /// capacity is updated. Level filters take effect immediately because
    /// every check reads the current settings.
    pub fn reload(&self, settings: LoggerSettings) {
        let capacity = settings.batch_capacity;
        *self.inner.settings.write() = Arc::new(settings);

        let buffer = &self.inner.buffer;
        if !buffer.is_empty() {
            buffer.flush(Arc::clone(&self.inner.sink));
        }
        buffer.set_capacity(capacity);
        tracing::debug!(capacity, "log settings reloaded");
    }

    /// Apply every settings change published on `updates`.
    ///
    /// The task ends when the sender is dropped.
    pub fn watch_settings(&self, mut updates: watch::Receiver<LoggerSettings>) -> JoinHandle<()> {
        let owner = self.clone();
        self.inner.runtime.spawn(async move {
            while updates.changed().await.is_ok() {
                let settings = updates.borrow_and_update().clone();
                owner.reload(settings);
            }
        })
    }

    /// Flush whatever is pending, wait for it and close the sink.
    ///
    /// **Returns**
    /// - the outcome of the last flush that ran, or `None` if nothing was
    ///   flushed.
    pub async fn shutdown(&self) -> Option<FlushOutcome> {
        let buffer = &self.inner.buffer;
        let mut outcome = buffer.wait_idle().await;

        if !buffer.is_empty() && buffer.flush(Arc::clone(&self.inner.sink)) {
            outcome = buffer.wait_idle().await;
        }

        let pending = buffer.len();
        if pending > 0 {
            tracing::warn!(pending, "log records still pending at shutdown");
        }

        if let Err(e) = self.inner.sink.close().await {
            tracing::warn!(sink = self.inner.sink.name(), error = %e, "failed to close log sink");
        }
        outcome
    }
}

/// Logger bound to a single category.
///
/// Applies the level filter and attaches the scope before handing the
/// record to its [`DbLogger`].
#[derive(Clone)]
pub struct CategoryLogger {
    category: String,
    owner: DbLogger,
}

impl CategoryLogger {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.owner.is_enabled(&self.category, level)
    }

    pub async fn log(
        &self,
        level: LogLevel,
        event: impl Into<EventId>,
        message: impl Into<String>,
    ) -> Result<(), SinkError> {
        match self.build(level, event, message) {
            Some(record) => self.owner.emit(record).await,
            None => Ok(()),
        }
    }

    pub async fn log_error(
        &self,
        level: LogLevel,
        event: impl Into<EventId>,
        message: impl Into<String>,
        error: &(dyn Error + Send + Sync + 'static),
    ) -> Result<(), SinkError> {
        match self.build(level, event, message) {
            Some(record) => self.owner.emit(record.with_error(error)).await,
            None => Ok(()),
        }
    }

    fn build(
        &self,
        level: LogLevel,
        event: impl Into<EventId>,
        message: impl Into<String>,
    ) -> Option<LogRecord> {
        let settings = self.owner.settings();
        if !settings.levels.is_enabled(&self.category, level) {
            return None;
        }

        let scope = if settings.include_scopes { current_scope() } else { None };
        Some(LogRecord::new(event, level, self.category.clone(), message).with_scope(scope))
    }
}
