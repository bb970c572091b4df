use crate::error::FormatError;
use crate::types::{ErrorContext, RaisedError, Service, Tracing, TypedContext, User};
use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Severity levels with their numeric codes, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Level {
    pub const ALL: [Level; 8] = [
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Alert,
        Level::Emergency,
    ];

    pub fn code(self) -> u16 {
        match self {
            Level::Debug => 100,
            Level::Info => 200,
            Level::Notice => 250,
            Level::Warning => 300,
            Level::Error => 400,
            Level::Critical => 500,
            Level::Alert => 550,
            Level::Emergency => 600,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Alert => "ALERT",
            Level::Emergency => "EMERGENCY",
        }
    }

    pub fn from_code(code: u16) -> Option<Level> {
        Level::ALL.into_iter().find(|level| level.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, string-keyed record context.
pub type Context = IndexMap<String, ContextValue>;

/// A value that can serialize itself to JSON on demand.
///
/// Implemented for every `serde::Serialize` type, so arbitrary application
/// structs can be embedded in a context without converting them up front.
pub trait ToJson: Send + Sync {
    fn to_json(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize + Send + Sync> ToJson for T {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A single value in a record's `context` or `extra` map.
#[derive(Clone)]
pub enum ContextValue {
    /// Plain JSON: scalars, or pre-built arrays and objects.
    Json(Value),
    /// Kept apart from [`ContextValue::Json`] because JSON cannot hold
    /// non-finite numbers.
    Float(f64),
    DateTime(DateTime<FixedOffset>),
    List(Vec<ContextValue>),
    Map(Context),
    Typed(TypedContext),
    /// An error that has not been wrapped in an [`ErrorContext`].
    Raised(RaisedError),
    Serializable(Arc<dyn ToJson>),
}

impl ContextValue {
    /// Attach a bare error; the call site is recorded as its origin.
    #[track_caller]
    pub fn error<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        ContextValue::Raised(RaisedError::new(err))
    }

    pub fn serializable<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        ContextValue::Serializable(Arc::new(value))
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ContextValue::Float(value) => f.debug_tuple("Float").field(value).finish(),
            ContextValue::DateTime(value) => f.debug_tuple("DateTime").field(value).finish(),
            ContextValue::List(values) => f.debug_tuple("List").field(values).finish(),
            ContextValue::Map(values) => f.debug_tuple("Map").field(values).finish(),
            ContextValue::Typed(value) => f.debug_tuple("Typed").field(value).finish(),
            ContextValue::Raised(value) => f.debug_tuple("Raised").field(value).finish(),
            ContextValue::Serializable(_) => f.write_str("Serializable(..)"),
        }
    }
}

macro_rules! json_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    ContextValue::Json(Value::from(value))
                }
            }
        )*
    };
}

json_from!(&str, String, bool, i32, i64, u32, u64);

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        ContextValue::Json(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<DateTime<FixedOffset>> for ContextValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        ContextValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for ContextValue {
    fn from(value: DateTime<Utc>) -> Self {
        ContextValue::DateTime(value.fixed_offset())
    }
}

impl From<Vec<ContextValue>> for ContextValue {
    fn from(values: Vec<ContextValue>) -> Self {
        ContextValue::List(values)
    }
}

impl From<Context> for ContextValue {
    fn from(values: Context) -> Self {
        ContextValue::Map(values)
    }
}

impl From<TypedContext> for ContextValue {
    fn from(value: TypedContext) -> Self {
        ContextValue::Typed(value)
    }
}

impl From<Tracing> for ContextValue {
    fn from(value: Tracing) -> Self {
        ContextValue::Typed(value.into())
    }
}

impl From<Service> for ContextValue {
    fn from(value: Service) -> Self {
        ContextValue::Typed(value.into())
    }
}

impl From<User> for ContextValue {
    fn from(value: User) -> Self {
        ContextValue::Typed(value.into())
    }
}

impl From<ErrorContext> for ContextValue {
    fn from(value: ErrorContext) -> Self {
        ContextValue::Typed(value.into())
    }
}

impl From<RaisedError> for ContextValue {
    fn from(value: RaisedError) -> Self {
        ContextValue::Raised(value)
    }
}

/// One structured logging event as handed to the formatter.
///
/// `context` holds the values passed with the log call and takes precedence
/// over `extra`, which carries values added by processors.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: u16,
    pub level_name: String,
    pub channel: String,
    pub datetime: DateTime<FixedOffset>,
    pub message: Option<String>,
    pub context: Context,
    pub extra: Context,
}

impl LogRecord {
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// Reject records whose mandatory text fields are blank.
    pub(crate) fn validate(&self) -> Result<(), FormatError> {
        if self.level_name.trim().is_empty() {
            return Err(FormatError::EmptyField("level_name"));
        }
        if self.channel.trim().is_empty() {
            return Err(FormatError::EmptyField("channel"));
        }
        Ok(())
    }
}

/// Builder for [`LogRecord`]. `level`, `channel` and `datetime` are mandatory.
#[derive(Debug, Default)]
pub struct LogRecordBuilder {
    level: Option<(u16, String)>,
    channel: Option<String>,
    datetime: Option<DateTime<FixedOffset>>,
    message: Option<String>,
    context: Context,
    extra: Context,
}

impl LogRecordBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some((level.code(), level.name().to_string()));
        self
    }

    /// Set a level outside the built-in table.
    pub fn custom_level(mut self, code: u16, name: impl Into<String>) -> Self {
        self.level = Some((code, name.into()));
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn datetime(mut self, datetime: impl Into<DateTime<FixedOffset>>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<LogRecord, FormatError> {
        let (level, level_name) = self.level.ok_or(FormatError::MissingField("level"))?;
        let channel = self.channel.ok_or(FormatError::MissingField("channel"))?;
        let datetime = self.datetime.ok_or(FormatError::MissingField("datetime"))?;

        let record = LogRecord {
            level,
            level_name,
            channel,
            datetime,
            message: self.message,
            context: self.context,
            extra: self.extra,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Accepts records handed over as JSON objects with the keys `datetime`
/// (RFC 3339), `level_name`, `channel` and optionally `level`, `message`,
/// `context` and `extra`.
impl TryFrom<Value> for LogRecord {
    type Error = FormatError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err(FormatError::InvalidField {
                field: "record",
                reason: "expected a JSON object".to_string(),
            });
        };

        let datetime = match fields.get("datetime") {
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw).map_err(|e| {
                FormatError::InvalidField {
                    field: "datetime",
                    reason: e.to_string(),
                }
            })?,
            Some(_) => {
                return Err(FormatError::InvalidField {
                    field: "datetime",
                    reason: "expected an RFC 3339 string".to_string(),
                })
            }
            None => return Err(FormatError::MissingField("datetime")),
        };

        let level_name = required_string(&fields, "level_name")?;
        let channel = required_string(&fields, "channel")?;

        let level = match fields.get("level") {
            Some(raw) => raw
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .ok_or_else(|| FormatError::InvalidField {
                    field: "level",
                    reason: "expected a numeric level code".to_string(),
                })?,
            None => Level::from_name(&level_name)
                .map(Level::code)
                .ok_or(FormatError::MissingField("level"))?,
        };

        let message = match fields.shift_remove("message") {
            Some(Value::String(message)) => Some(message),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        let record = LogRecord {
            level,
            level_name,
            channel,
            datetime,
            message,
            context: json_context(fields.shift_remove("context")),
            extra: json_context(fields.shift_remove("extra")),
        };
        record.validate()?;
        Ok(record)
    }
}

fn required_string(
    fields: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, FormatError> {
    match fields.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(FormatError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
        None => Err(FormatError::MissingField(field)),
    }
}

fn json_context(value: Option<Value>) -> Context {
    match value {
        Some(Value::Object(entries)) => entries
            .into_iter()
            .map(|(key, value)| (key, ContextValue::Json(value)))
            .collect(),
        _ => Context::new(),
    }
}
