//! Maps a [`LogRecord`] onto an Elastic Common Schema log document.
//!
//! The document is assembled by a fixed sequence of stages. Each stage takes
//! the partially built document together with whatever is left of the record
//! context and hands both back, so a key written by a later stage replaces the
//! one written earlier:
//!
//! 1. skeleton: `@timestamp`, level, `message`, `ecs.version`, `log.logger`
//! 2. typed contexts, in the order tracing, service, user, error; each one is
//!    removed from the context once merged
//! 3. `extra`, then `context`, flattened onto the top level
//! 4. static tags
//!
//! See <https://www.elastic.co/guide/en/ecs/1.2/ecs-log.html>.

use crate::error::FormatError;
use crate::normalizer::{NormalizedRecord, RecordNormalizer};
use crate::record::LogRecord;
use crate::sanitize::sanitize_labels;
use crate::types::{ERROR_MARKER, EXTRACTION_ORDER};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

/// ECS version advertised in every document.
pub const ECS_VERSION: &str = "1.2.0";

/// Context keys carrying source-location data.
const LOG_ORIGIN_KEYS: [&str; 4] = ["file", "line", "class", "function"];

/// Introspection keys that duplicate origin data and are never emitted.
const SKIPPED_KEYS: [&str; 1] = ["callType"];

/// Output document shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Flat `"log.level"` key, single-string stack traces, offset timestamps.
    #[default]
    Ecs,
    /// `level` nested inside `log`, stack traces as line arrays, UTC `Z`
    /// timestamps.
    Legacy,
}

impl Dialect {
    pub fn nested_level(self) -> bool {
        matches!(self, Dialect::Legacy)
    }

    pub fn stack_trace_as_lines(self) -> bool {
        matches!(self, Dialect::Legacy)
    }

    pub fn default_timestamp_format(self) -> TimestampFormat {
        match self {
            Dialect::Ecs => TimestampFormat::Offset,
            Dialect::Legacy => TimestampFormat::Utc,
        }
    }
}

impl FromStr for Dialect {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecs" => Ok(Dialect::Ecs),
            "legacy" => Ok(Dialect::Legacy),
            other => Err(FormatError::InvalidField {
                field: "dialect",
                reason: format!("unknown dialect `{}`", other),
            }),
        }
    }
}

/// Rendering of `@timestamp` and of date-times inside the context.
/// Both variants use microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Keep the record's own offset: `2013-11-28T12:34:56.987650-03:45`.
    #[default]
    Offset,
    /// Convert to UTC and use `Z`: `2013-11-28T16:19:56.987650Z`.
    Utc,
}

impl TimestampFormat {
    pub fn format(self, datetime: &DateTime<FixedOffset>) -> String {
        match self {
            TimestampFormat::Offset => datetime.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string(),
            TimestampFormat::Utc => datetime
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Formatter configuration, frozen once the formatter is built.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Emitted as `tags`, in this order.
    pub tags: Vec<String>,
    pub dialect: Dialect,
    pub timestamp_format: TimestampFormat,
    /// When `true`, the context keys `file`, `line`, `class` and `function`
    /// become `log.origin`; otherwise they are emitted like any other key.
    pub log_origin_from_context: bool,
    pub max_normalize_depth: usize,
    pub max_normalize_item_count: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self::for_dialect(Dialect::default())
    }
}

impl FormatterConfig {
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            tags: Vec::new(),
            dialect,
            timestamp_format: dialect.default_timestamp_format(),
            log_origin_from_context: true,
            max_normalize_depth: 9,
            max_normalize_item_count: 1000,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log_origin_from_context(mut self, enabled: bool) -> Self {
        self.log_origin_from_context = enabled;
        self
    }

    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

/// Turns [`LogRecord`]s into newline-terminated ECS JSON lines.
///
/// The formatter holds no mutable state and can be shared between threads.
#[derive(Debug, Clone)]
pub struct EcsFormatter {
    config: FormatterConfig,
    normalizer: RecordNormalizer,
    tags: Vec<Value>,
}

impl Default for EcsFormatter {
    fn default() -> Self {
        Self::new(FormatterConfig::default())
    }
}

impl EcsFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        let normalizer = RecordNormalizer::new(&config);
        let tags = config.tags.iter().cloned().map(Value::String).collect();
        Self {
            config,
            normalizer,
            tags,
        }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Format `record` as a single JSON line terminated by `\n`.
    ///
    /// **Errors**
    /// - [`FormatError::EmptyField`] when `channel` or `level_name` is blank.
    /// - [`FormatError::Serialize`] if the document cannot be encoded.
    pub fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let document = self.to_document(record)?;
        let mut line = serde_json::to_string(&Value::Object(document))?;
        line.push('\n');
        Ok(line)
    }

    /// Build the ECS document for `record` without encoding it.
    pub fn to_document(&self, record: &LogRecord) -> Result<Map<String, Value>, FormatError> {
        record.validate()?;

        let normalized = self.normalizer.normalize_record(record);
        let out = self.skeleton(&normalized);
        let NormalizedRecord { context, extra, .. } = normalized;

        let (out, context) = EXTRACTION_ORDER
            .iter()
            .fold((out, context), |(out, context), marker| {
                extract_typed(out, context, marker)
            });

        let out = self.flatten(out, extra);
        let out = self.flatten(out, context);
        Ok(self.attach_tags(out))
    }

    fn skeleton(&self, record: &NormalizedRecord) -> Map<String, Value> {
        let nested_level = self.config.dialect.nested_level();
        let mut out = Map::new();

        out.insert("@timestamp".to_string(), Value::String(record.datetime.clone()));
        if !nested_level {
            out.insert("log.level".to_string(), Value::String(record.level_name.clone()));
        }
        if let Some(message) = &record.message {
            out.insert("message".to_string(), Value::String(message.clone()));
        }
        out.insert("ecs.version".to_string(), Value::String(ECS_VERSION.to_string()));

        let mut log = Map::new();
        if nested_level {
            log.insert("level".to_string(), Value::String(record.level_name.clone()));
        }
        log.insert("logger".to_string(), Value::String(record.channel.clone()));
        out.insert("log".to_string(), Value::Object(log));

        out
    }

    /// Copy the entries of `entries` onto the top level of `out`.
    ///
    /// `labels` is merged with sanitized keys, origin keys are collected into
    /// `log.origin` and introspection duplicates are dropped.
    fn flatten(
        &self,
        mut out: Map<String, Value>,
        entries: Map<String, Value>,
    ) -> Map<String, Value> {
        let mut origin_fields = Map::new();

        for (key, value) in entries {
            if key == "labels" {
                merge_labels(&mut out, value);
                continue;
            }
            if self.config.log_origin_from_context && LOG_ORIGIN_KEYS.contains(&key.as_str()) {
                origin_fields.insert(key, value);
                continue;
            }
            if SKIPPED_KEYS.contains(&key.as_str()) {
                continue;
            }
            out.insert(key, value);
        }

        if let Some(origin) = log_origin(&origin_fields) {
            if let Some(log) = log_fields(&mut out) {
                log.insert("origin".to_string(), Value::Object(origin));
            }
        }

        out
    }

    fn attach_tags(&self, mut out: Map<String, Value>) -> Map<String, Value> {
        if !self.tags.is_empty() {
            out.insert("tags".to_string(), Value::Array(self.tags.clone()));
        }
        out
    }
}

/// Merge every context entry carrying `marker` into `out` and drop it from
/// the context.
fn extract_typed(
    mut out: Map<String, Value>,
    mut context: Map<String, Value>,
    marker: &str,
) -> (Map<String, Value>, Map<String, Value>) {
    let keys: Vec<String> = context
        .iter()
        .filter(|(_, value)| is_marked(value, marker))
        .map(|(key, _)| key.clone())
        .collect();

    for key in keys {
        let document = match context.shift_remove(&key) {
            Some(Value::Object(mut wrapper)) => match wrapper.shift_remove(marker) {
                Some(Value::Object(document)) => document,
                _ => continue,
            },
            _ => continue,
        };

        if marker == ERROR_MARKER {
            merge_error(&mut out, document);
        } else {
            out.extend(document);
        }
    }

    (out, context)
}

fn is_marked(value: &Value, marker: &str) -> bool {
    matches!(value, Value::Object(fields) if fields.len() == 1 && fields.contains_key(marker))
}

/// Errors also contribute `log.origin`, merged into the existing `log` map,
/// and provide the message when the record had none.
fn merge_error(out: &mut Map<String, Value>, document: Map<String, Value>) {
    for (key, value) in document {
        match value {
            Value::Object(fields) if key == "log" => {
                if let Some(log) = log_fields(out) {
                    log.extend(fields);
                }
            }
            value => {
                out.insert(key, value);
            }
        }
    }

    if !out.contains_key("message") {
        let message = out
            .get("error")
            .and_then(|error| error.get("message"))
            .cloned();
        if let Some(message) = message {
            out.insert("message".to_string(), message);
        }
    }
}

fn merge_labels(out: &mut Map<String, Value>, labels: Value) {
    let Value::Object(labels) = labels else {
        tracing::debug!("dropping `labels` context entry that is not a mapping");
        return;
    };

    let labels = sanitize_labels(labels);
    if labels.is_empty() {
        return;
    }

    out.insert("labels".to_string(), Value::Object(labels));
}

/// Build `log.origin` from raw origin fields. Values of the wrong type are
/// skipped; `None` when nothing usable remains.
fn log_origin(fields: &Map<String, Value>) -> Option<Map<String, Value>> {
    if fields.is_empty() {
        return None;
    }

    let mut file = Map::new();
    if let Some(Value::String(name)) = fields.get("file") {
        file.insert("name".to_string(), Value::String(name.clone()));
    }
    if let Some(line) = fields.get("line").filter(|line| line.is_i64() || line.is_u64()) {
        file.insert("line".to_string(), line.clone());
    }

    let function = match (fields.get("class"), fields.get("function")) {
        (Some(Value::String(class)), Some(Value::String(function))) => {
            Some(format!("{}::{}", class, function))
        }
        (_, Some(Value::String(function))) => Some(function.clone()),
        _ => None,
    };

    let mut origin = Map::new();
    if !file.is_empty() {
        origin.insert("file".to_string(), Value::Object(file));
    }
    if let Some(function) = function {
        origin.insert("function".to_string(), Value::String(function));
    }

    if origin.is_empty() {
        tracing::debug!("origin fields present but none usable");
        None
    } else {
        Some(origin)
    }
}

/// The document's `log` map, replacing a non-object value if a context
/// entry overwrote it.
fn log_fields(out: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    let log = out
        .entry("log")
        .or_insert_with(|| Value::Object(Map::new()));
    if !log.is_object() {
        *log = Value::Object(Map::new());
    }
    log.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Context, ContextValue, Level};
    use crate::types::{ErrorContext, Service, Tracing, User};
    use chrono::TimeZone;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("the value must not be negative")]
    struct InvalidArgument;

    fn base_record() -> crate::record::LogRecordBuilder {
        LogRecord::builder()
            .level(Level::Info)
            .channel("ecs")
            .datetime(Utc.timestamp_opt(0, 0).unwrap())
            .message("hello world")
    }

    fn decode(line: &str) -> Value {
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        serde_json::from_str(line).unwrap()
    }

    fn keys(value: &Value) -> Vec<String> {
        value
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn minimal_record_emits_only_the_skeleton() {
        let line = EcsFormatter::default().format(&base_record().build().unwrap()).unwrap();
        let doc = decode(&line);

        assert_eq!(keys(&doc), ["@timestamp", "log.level", "message", "ecs.version", "log"]);
        assert_eq!(keys(&doc["log"]), ["logger"]);
        assert_eq!(doc["@timestamp"], json!("1970-01-01T00:00:00.000000+00:00"));
        assert_eq!(doc["log.level"], json!("INFO"));
        assert_eq!(doc["message"], json!("hello world"));
        assert_eq!(doc["ecs.version"], json!(ECS_VERSION));
        assert_eq!(doc["log"]["logger"], json!("ecs"));
    }

    #[test]
    fn keeps_record_offset_in_timestamp() {
        let datetime = DateTime::parse_from_rfc3339("2013-11-28T12:34:56.98765-03:45").unwrap();
        let record = base_record().datetime(datetime).build().unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["@timestamp"], json!("2013-11-28T12:34:56.987650-03:45"));

        let utc = EcsFormatter::new(
            FormatterConfig::default().with_timestamp_format(TimestampFormat::Utc),
        );
        let doc = utc.to_document(&record).unwrap();
        assert_eq!(doc["@timestamp"], json!("2013-11-28T16:19:56.987650Z"));
    }

    #[test]
    fn message_is_optional() {
        let record = LogRecord::builder()
            .level(Level::Debug)
            .channel("ecs")
            .datetime(Utc.timestamp_opt(0, 0).unwrap())
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(keys(&Value::Object(doc)), ["@timestamp", "log.level", "ecs.version", "log"]);
    }

    #[test]
    fn legacy_dialect_nests_level() {
        let formatter = EcsFormatter::new(FormatterConfig::for_dialect(Dialect::Legacy));
        let doc = Value::Object(formatter.to_document(&base_record().build().unwrap()).unwrap());

        assert_eq!(keys(&doc), ["@timestamp", "message", "ecs.version", "log"]);
        assert_eq!(doc["log"], json!({ "level": "INFO", "logger": "ecs" }));
        assert_eq!(doc["@timestamp"], json!("1970-01-01T00:00:00.000000Z"));
    }

    #[test]
    fn tracing_context_is_lifted() {
        let record = base_record()
            .context("tracing", Tracing::new("trace-1").with_transaction_id("tx-1"))
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["trace"], json!({ "id": "trace-1" }));
        assert_eq!(doc["transaction"], json!({ "id": "tx-1" }));
        assert!(!doc.contains_key("tracing"));
        assert!(!doc.contains_key("labels"));
    }

    #[test]
    fn tracing_without_transaction_has_no_transaction_key() {
        let record = base_record().context("tracing", Tracing::new("trace-1")).build().unwrap();
        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert!(doc.contains_key("trace"));
        assert!(!doc.contains_key("transaction"));
    }

    #[test]
    fn service_and_user_contexts_are_lifted_under_any_key() {
        let record = base_record()
            .context("svc", Service::new().with_id(512).with_name("funky-service-01"))
            .context("who", User::new().with_id(7).with_hash("abc"))
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["service"], json!({ "id": 512, "name": "funky-service-01" }));
        assert_eq!(doc["user"], json!({ "id": 7, "hash": "abc" }));
        assert!(!doc.contains_key("svc"));
        assert!(!doc.contains_key("who"));
    }

    #[test]
    fn raw_and_wrapped_errors_fill_error_fields() {
        let raw = base_record()
            .context("error", ContextValue::error(InvalidArgument))
            .build()
            .unwrap();
        let wrapped = base_record()
            .context("error", ErrorContext::new(&InvalidArgument).with_code(22))
            .build()
            .unwrap();

        for (record, code) in [(raw, 0), (wrapped, 22)] {
            let doc = Value::Object(EcsFormatter::default().to_document(&record).unwrap());

            assert_eq!(keys(&doc["error"]), ["type", "message", "code", "stack_trace"]);
            assert!(doc["error"]["type"].as_str().unwrap().ends_with("InvalidArgument"));
            assert_eq!(doc["error"]["message"], json!("the value must not be negative"));
            assert_eq!(doc["error"]["code"], json!(code));
            assert!(doc["error"]["stack_trace"].is_string());

            assert_eq!(doc["log.level"], json!("INFO"));
            assert_eq!(doc["log"]["logger"], json!("ecs"));
            assert_eq!(doc["log"]["origin"]["file"]["name"], json!(file!()));
            assert!(doc.get("labels").is_none());
        }
    }

    #[test]
    fn error_message_fills_missing_record_message() {
        let record = LogRecord::builder()
            .level(Level::Error)
            .channel("ecs")
            .datetime(Utc.timestamp_opt(0, 0).unwrap())
            .context("error", ErrorContext::from_parts("Timeout", "upstream timed out"))
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["message"], json!("upstream timed out"));
        assert!(doc["log"].get("origin").is_none());
    }

    #[test]
    fn legacy_dialect_emits_stack_trace_lines() {
        let record = base_record()
            .context("error", ContextValue::error(InvalidArgument))
            .build()
            .unwrap();
        let formatter = EcsFormatter::new(FormatterConfig::for_dialect(Dialect::Legacy));

        let doc = formatter.to_document(&record).unwrap();
        assert!(doc["error"]["stack_trace"].is_array());
        assert_eq!(doc["log"]["level"], json!("INFO"));
        assert!(doc["log"]["origin"]["file"]["line"].is_u64());
    }

    #[test]
    fn context_shadows_extra() {
        let record = base_record()
            .extra("env", "staging")
            .extra("host", "web-1")
            .context("env", "production")
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["env"], json!("production"));
        assert_eq!(doc["host"], json!("web-1"));
    }

    #[test]
    fn label_keys_are_sanitized() {
        let mut labels = Context::new();
        labels.insert("sim ple".to_string(), 1.into());
        labels.insert(" lpad".to_string(), 2.into());
        labels.insert("a.b*c\\d".to_string(), 3.into());

        let record = base_record()
            .context("labels", labels)
            .context("top_level_a.b", "kept as is")
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["labels"], json!({ "sim_ple": 1, "lpad": 2, "a_b_c_d": 3 }));
        assert_eq!(doc["top_level_a.b"], json!("kept as is"));
    }

    #[test]
    fn context_labels_replace_extra_labels() {
        let record = base_record()
            .extra("labels", json!({ "from_extra": 1, "shared": "extra" }))
            .context("labels", json!({ "from_context": 2, "shared": "context" }))
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["labels"], json!({ "from_context": 2, "shared": "context" }));
        assert!(doc["labels"].get("from_extra").is_none());

        let record = base_record()
            .extra("labels", json!({ "from_extra": 1 }))
            .context("labels", json!({}))
            .build()
            .unwrap();
        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["labels"], json!({ "from_extra": 1 }));
    }

    #[test]
    fn typed_values_outside_top_level_context_carry_no_marker() {
        let mut request = Context::new();
        request.insert("err".to_string(), ContextValue::error(InvalidArgument));
        let mut labels = Context::new();
        labels.insert("cause".to_string(), ContextValue::error(InvalidArgument));

        let record = base_record()
            .context("request", request)
            .context("labels", labels)
            .extra("tracing", Tracing::new("t-1"))
            .extra("failure", ContextValue::error(InvalidArgument))
            .build()
            .unwrap();

        let line = EcsFormatter::default().format(&record).unwrap();
        assert!(!line.contains("@ecs"), "marker leaked: {}", line);

        let doc = decode(&line);
        assert_eq!(doc["tracing"], json!({ "trace": { "id": "t-1" } }));
        assert!(doc.get("trace").is_none());
        assert!(doc.get("error").is_none());
        for error in [&doc["request"]["err"], &doc["labels"]["cause"], &doc["failure"]] {
            assert_eq!(keys(error), ["type", "message", "code", "stack_trace"]);
            assert_eq!(error["message"], json!("the value must not be negative"));
        }
    }

    #[test]
    fn empty_labels_are_omitted() {
        let record = base_record().context("labels", Context::new()).build().unwrap();
        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert!(!doc.contains_key("labels"));
    }

    #[test]
    fn origin_keys_become_log_origin() {
        let record = base_record()
            .extra("file", "/srv/app/handler.rs")
            .extra("line", 42)
            .extra("class", "app::handler")
            .extra("function", "handle")
            .extra("callType", "::")
            .build()
            .unwrap();

        let doc = Value::Object(EcsFormatter::default().to_document(&record).unwrap());
        assert_eq!(keys(&doc), ["@timestamp", "log.level", "message", "ecs.version", "log"]);
        assert_eq!(
            doc["log"],
            json!({
                "logger": "ecs",
                "origin": {
                    "file": { "name": "/srv/app/handler.rs", "line": 42 },
                    "function": "app::handler::handle"
                }
            })
        );
    }

    #[test]
    fn malformed_origin_fields_are_skipped() {
        let record = base_record()
            .context("file", 12)
            .context("line", "not a number")
            .context("class", 3)
            .context("function", "run")
            .build()
            .unwrap();

        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert_eq!(doc["log"]["origin"], json!({ "function": "run" }));

        let record = base_record().context("line", 1.5).build().unwrap();
        let doc = EcsFormatter::default().to_document(&record).unwrap();
        assert!(doc["log"].get("origin").is_none());
    }

    #[test]
    fn origin_keys_stay_plain_when_disabled() {
        let record = base_record()
            .context("file", "main.rs")
            .context("line", 3)
            .context("class", "app")
            .context("function", "main")
            .build()
            .unwrap();

        let formatter =
            EcsFormatter::new(FormatterConfig::default().with_log_origin_from_context(false));
        let doc = Value::Object(formatter.to_document(&record).unwrap());

        assert_eq!(
            keys(&doc),
            [
                "@timestamp",
                "log.level",
                "message",
                "ecs.version",
                "log",
                "file",
                "line",
                "class",
                "function"
            ]
        );
        assert!(doc["log"].get("origin").is_none());
    }

    #[test]
    fn tags_are_appended_in_order() {
        let formatter = EcsFormatter::new(FormatterConfig::default().with_tags(["one", "two"]));
        let doc = formatter.to_document(&base_record().build().unwrap()).unwrap();
        assert_eq!(doc["tags"], json!(["one", "two"]));
        assert_eq!(doc.keys().last().map(String::as_str), Some("tags"));
    }

    #[test]
    fn output_is_deterministic() {
        let record = base_record()
            .context("tracing", Tracing::new("t").with_transaction_id("x"))
            .context("error", ContextValue::error(InvalidArgument))
            .context("zeta", 1)
            .context("alpha", json!({ "b": 1, "a": 2 }))
            .extra("file", "lib.rs")
            .build()
            .unwrap();
        let formatter = EcsFormatter::new(FormatterConfig::default().with_tags(["t1"]));

        let first = formatter.format(&record).unwrap();
        for _ in 0..10 {
            assert_eq!(formatter.format(&record).unwrap(), first);
        }
    }

    #[test]
    fn blank_channel_fails() {
        let mut record = base_record().build().unwrap();
        record.channel = String::new();

        let err = EcsFormatter::default().format(&record).unwrap_err();
        assert!(matches!(err, FormatError::EmptyField("channel")));
    }

    #[test]
    fn dialect_parses_from_str() {
        assert_eq!("ECS".parse::<Dialect>().unwrap(), Dialect::Ecs);
        assert_eq!(" legacy ".parse::<Dialect>().unwrap(), Dialect::Legacy);
        assert!("v2".parse::<Dialect>().is_err());
    }
}
