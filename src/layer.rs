use crate::filter::category_from_target;
use crate::logger::DbLogger;
use crate::record::{render_error, EventId, LogLevel, LogRecord};
use crate::scope::{current_scope, render_scope};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets starting with this prefix are this crate's own diagnostics and
/// are never fed back into the buffer.
const OWN_TARGET: &str = "db_log_buffer";

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to a [`DbLogger`].
///
/// The event target becomes the record category (`a::b` → `a.b`) and is
/// checked against the logger's level table. Recognized fields:
/// - `message`: record message.
/// - `event_id` / `event_name`: record event identifier.
/// - `error` / `exception`: captured error detail.
///
/// Any other field is appended to the message as ` key=value`. When scopes
/// are enabled the names of the enclosing spans (innermost first) form the
/// scope text; outside of any span the thread-local scope stack is used.
pub struct DbLogLayer {
    logger: DbLogger,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Rejected by the level table.
    pub filtered_events: Arc<AtomicU64>,
    /// Handed to the logger.
    pub submitted_events: Arc<AtomicU64>,
}

impl DbLogLayer {
    pub fn new(logger: DbLogger) -> Self {
        Self {
            logger,
            total_events: Arc::new(AtomicU64::new(0)),
            filtered_events: Arc::new(AtomicU64::new(0)),
            submitted_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn logger(&self) -> &DbLogger {
        &self.logger
    }
}

impl<S> Layer<S> for DbLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let category = category_from_target(meta.target());
        let level = LogLevel::from(*meta.level());
        let settings = self.logger.settings();
        if !settings.levels.is_enabled(&category, level) {
            self.filtered_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let scope = if settings.include_scopes {
            let spans: Option<Vec<&str>> = ctx
                .event_scope(event)
                .map(|scope| scope.map(|span| span.name()).collect());
            match spans {
                Some(names) if !names.is_empty() => render_scope(names),
                _ => current_scope(),
            }
        } else {
            None
        };

        let event_id = visitor.event_id();
        let exception = visitor.exception.take();
        let mut record = LogRecord::new(event_id, level, category, visitor.into_message())
            .with_scope(scope);
        if let Some(exception) = exception {
            record = record.with_exception(exception);
        }

        self.submitted_events.fetch_add(1, Ordering::Relaxed);
        self.logger.submit(record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    extra: String,
    event_id: Option<i32>,
    event_name: Option<String>,
    exception: Option<String>,
}

impl FieldVisitor {
    fn event_id(&self) -> EventId {
        EventId {
            id: self.event_id.unwrap_or(0),
            name: self.event_name.clone(),
        }
    }

    fn into_message(self) -> String {
        let mut message = self.message;
        message.push_str(&self.extra);
        message
    }

    fn push_extra(&mut self, field: &Field, value: &dyn std::fmt::Display) {
        let _ = write!(self.extra, " {}={}", field.name(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "event_name" => self.event_name = Some(value.to_string()),
            "error" | "exception" => self.exception = Some(value.to_string()),
            _ => self.push_extra(field, &value),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "event_id" => self.event_id = i32::try_from(value).ok(),
            _ => self.push_extra(field, &value),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "event_id" => self.event_id = i32::try_from(value).ok(),
            _ => self.push_extra(field, &value),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_extra(field, &value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let detail = render_error(value);
        match field.name() {
            "error" | "exception" => self.exception = Some(detail),
            _ => self.push_extra(field, &detail),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = rendered,
            "event_name" => self.event_name = Some(rendered),
            "error" | "exception" => self.exception = Some(rendered),
            _ => self.push_extra(field, &rendered),
        }
    }
}
