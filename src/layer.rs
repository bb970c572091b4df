use crate::formatter::EcsFormatter;
use crate::record::{Context, ContextValue, Level, LogRecord};
use crate::sink::LogSink;
use crate::types::ErrorContext;
use chrono::Utc;
use std::error::Error;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Attempts made for one batch before its remaining lines are dropped.
const MAX_SEND_ATTEMPTS: u32 = 5;

/// `tracing_subscriber` layer that turns events into ECS JSON lines and
/// forwards them to an asynchronous [`LogSink`] via a bounded channel and
/// background task.
///
/// Events are formatted on the emitting thread; only the finished line
/// crosses the channel. Sink I/O is fully decoupled from application threads.
pub struct EcsLayer {
    formatter: EcsFormatter,
    max_level: tracing::Level,
    sender: mpsc::Sender<String>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or the event could not be formatted.
    pub dropped_events: Arc<AtomicU64>,
}

impl EcsLayer {
    /// Create a new layer and spawn a background task that pulls lines from
    /// a bounded channel and sends them to the provided [`LogSink`].
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. The task ends
    /// once the layer is dropped and the remaining lines are written.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        sink: Arc<dyn LogSink>,
        formatter: EcsFormatter,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<String>(buffer);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                if let Err(e) =
                                    send_batch(&*sink, &mut batch, backoff, max_backoff).await
                                {
                                    eprintln!("error sending log batch: {}", e);
                                }
                            }
                        }
                        None => {
                            if let Err(e) =
                                send_batch(&*sink, &mut batch, backoff, max_backoff).await
                            {
                                eprintln!("error flushing final log batch: {}", e);
                            }
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            if let Err(e) =
                                send_batch(&*sink, &mut batch, backoff, max_backoff).await
                            {
                                eprintln!("error flushing log batch: {}", e);
                            }
                        }
                    }
                }
            }
        });

        (
            Self {
                formatter,
                max_level: tracing::Level::INFO,
                sender: tx,
                total_events: Arc::new(AtomicU64::new(0)),
                enqueued_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    /// Capture events up to and including `level` in verbosity.
    pub fn with_max_level(mut self, level: tracing::Level) -> Self {
        self.max_level = level;
        self
    }

    fn record_for(&self, event: &Event<'_>) -> LogRecord {
        let meta = event.metadata();
        let mut visitor = FieldVisitor {
            context: Context::new(),
            message: None,
            location: meta.file().zip(meta.line()),
        };
        event.record(&mut visitor);

        let mut extra = Context::new();
        if let Some(file) = meta.file() {
            extra.insert("file".to_string(), file.into());
        }
        if let Some(line) = meta.line() {
            extra.insert("line".to_string(), line.into());
        }

        let level = map_level(meta.level());
        LogRecord {
            level: level.code(),
            level_name: level.name().to_string(),
            channel: meta.target().to_string(),
            datetime: Utc::now().fixed_offset(),
            message: visitor.message,
            context: visitor.context,
            extra,
        }
    }
}

/// Send every line of `batch`, retrying with exponential backoff.
/// Lines already accepted by the sink are not sent again.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<String>,
    mut backoff: Duration,
    max_backoff: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut attempts = 0;
    loop {
        let mut sent = 0;
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        for line in batch.iter() {
            if let Err(e) = sink.send(line).await {
                last_err = Some(e);
                break;
            }
            sent += 1;
        }
        batch.drain(..sent);

        let Some(err) = last_err else {
            return Ok(());
        };

        attempts += 1;
        if attempts >= MAX_SEND_ATTEMPTS {
            let lost = batch.len();
            batch.clear();
            return Err(format!(
                "giving up after {} attempts, {} lines lost: {}",
                attempts, lost, err
            )
            .into());
        }

        eprintln!("log sink send failed, retrying in {:?}", backoff);
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}

fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

impl<S> Layer<S> for EcsLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *event.metadata().level() > self.max_level {
            return;
        }

        let record = self.record_for(event);
        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to format log event: {}", e);
                return;
            }
        };

        match self.sender.try_send(line) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log line");
            }
        }
    }
}

use tracing::field::{Field, Visit};

/// Collects event fields into a record context. The `message` field becomes
/// the record message and fields recorded as errors become [`ErrorContext`]s.
pub struct FieldVisitor {
    pub context: Context,
    pub message: Option<String>,
    pub location: Option<(&'static str, u32)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.context.insert(field.name().to_string(), value.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.context.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.context.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.context.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.context.insert(field.name().to_string(), value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        let kind = error_type_name(value);
        let error = ErrorContext::from_dyn(&kind, value, self.location);
        self.context.insert(field.name().to_string(), ContextValue::from(error));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.context.insert(field.name().to_string(), format!("{:?}", value).into());
        }
    }
}

/// Type name of a type-erased error. Common library errors are recognized
/// by downcasting; otherwise the leading identifier of the `Debug` output is
/// used, e.g. `ParseError` for a unit or tuple struct.
fn error_type_name(value: &(dyn Error + 'static)) -> String {
    macro_rules! known {
        ($($ty:ty => $name:literal),* $(,)?) => {
            $(
                if value.is::<$ty>() {
                    return $name.to_string();
                }
            )*
        };
    }

    known!(
        std::io::Error => "std::io::Error",
        std::fmt::Error => "std::fmt::Error",
        std::num::ParseIntError => "std::num::ParseIntError",
        std::num::ParseFloatError => "std::num::ParseFloatError",
        std::str::Utf8Error => "std::str::Utf8Error",
        std::string::FromUtf8Error => "std::string::FromUtf8Error",
        serde_json::Error => "serde_json::Error",
        chrono::ParseError => "chrono::ParseError",
    );

    let debug = format!("{:?}", value);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}
