use crate::formatter::{Dialect, FormatterConfig, TimestampFormat};
use crate::record::{Context, ContextValue, LogRecord};
use crate::types::TypedContext;
use serde_json::{Map, Value};

/// Key of the placeholder entry appended to truncated mappings.
pub const TRUNCATED_KEY: &str = "...";

/// A [`LogRecord`] reduced to JSON-safe values.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub level: u16,
    pub level_name: String,
    pub channel: String,
    pub datetime: String,
    pub message: Option<String>,
    pub context: Map<String, Value>,
    pub extra: Map<String, Value>,
}

/// Reduces record contents to plain JSON, bounded in depth and width.
///
/// Typed contexts and bare errors placed directly in the record context
/// become `{marker: sub-document}` objects so the formatter can recognize
/// them afterwards. Anywhere else they take their plain ECS shape, errors as
/// a flat `{type, message, code, stack_trace}` object. Normalization never
/// fails: anything that cannot be represented is replaced by a placeholder
/// string.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    max_depth: usize,
    max_item_count: usize,
    timestamp_format: TimestampFormat,
    dialect: Dialect,
}

impl RecordNormalizer {
    pub fn new(config: &FormatterConfig) -> Self {
        Self {
            // The record itself sits at depth 0 and its maps at depth 1.
            max_depth: config.max_normalize_depth.max(1),
            max_item_count: config.max_normalize_item_count.max(1),
            timestamp_format: config.timestamp_format,
            dialect: config.dialect,
        }
    }

    pub fn normalize_record(&self, record: &LogRecord) -> NormalizedRecord {
        NormalizedRecord {
            level: record.level,
            level_name: record.level_name.clone(),
            channel: record.channel.clone(),
            datetime: self.timestamp_format.format(&record.datetime),
            message: record.message.clone(),
            context: self.normalize_entries(&record.context, 1, true),
            extra: self.normalize_context(&record.extra, 1),
        }
    }

    /// Normalize a single value found at `depth`.
    pub fn normalize(&self, value: &ContextValue, depth: usize) -> Value {
        if depth > self.max_depth {
            return self.depth_placeholder();
        }

        match value {
            ContextValue::Json(value) => self.normalize_json(value, depth),
            ContextValue::Float(value) => normalize_float(*value),
            ContextValue::DateTime(value) => Value::String(self.timestamp_format.format(value)),
            ContextValue::List(values) => {
                let mut out = Vec::with_capacity(values.len().min(self.max_item_count + 1));
                for (index, value) in values.iter().enumerate() {
                    if index >= self.max_item_count {
                        out.push(Value::String(self.width_placeholder(values.len())));
                        break;
                    }
                    out.push(self.normalize(value, depth + 1));
                }
                Value::Array(out)
            }
            ContextValue::Map(values) => Value::Object(self.normalize_context(values, depth)),
            ContextValue::Typed(typed) => typed.to_nested_value(self.dialect),
            ContextValue::Raised(raised) => {
                TypedContext::Error(raised.to_error_context()).to_nested_value(self.dialect)
            }
            ContextValue::Serializable(value) => match value.to_json() {
                Ok(json) => self.normalize_json(&json, depth),
                Err(e) => {
                    tracing::debug!(error = %e, "context value failed to serialize");
                    Value::String(format!("[unserializable value: {}]", e))
                }
            },
        }
    }

    fn normalize_context(&self, values: &Context, depth: usize) -> Map<String, Value> {
        self.normalize_entries(values, depth, false)
    }

    /// With `mark_typed`, typed contexts among `values` keep their marker.
    fn normalize_entries(
        &self,
        values: &Context,
        depth: usize,
        mark_typed: bool,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (index, (key, value)) in values.iter().enumerate() {
            if index >= self.max_item_count {
                out.insert(
                    TRUNCATED_KEY.to_string(),
                    Value::String(self.width_placeholder(values.len())),
                );
                break;
            }
            let value = match value {
                ContextValue::Typed(typed) if mark_typed => typed.to_marked_value(self.dialect),
                ContextValue::Raised(raised) if mark_typed => {
                    TypedContext::Error(raised.to_error_context()).to_marked_value(self.dialect)
                }
                value => self.normalize(value, depth + 1),
            };
            out.insert(key.clone(), value);
        }
        out
    }

    fn normalize_json(&self, value: &Value, depth: usize) -> Value {
        if depth > self.max_depth {
            return self.depth_placeholder();
        }

        match value {
            Value::Array(values) => {
                let mut out = Vec::with_capacity(values.len().min(self.max_item_count + 1));
                for (index, value) in values.iter().enumerate() {
                    if index >= self.max_item_count {
                        out.push(Value::String(self.width_placeholder(values.len())));
                        break;
                    }
                    out.push(self.normalize_json(value, depth + 1));
                }
                Value::Array(out)
            }
            Value::Object(values) => {
                let mut out = Map::new();
                for (index, (key, value)) in values.iter().enumerate() {
                    if index >= self.max_item_count {
                        out.insert(
                            TRUNCATED_KEY.to_string(),
                            Value::String(self.width_placeholder(values.len())),
                        );
                        break;
                    }
                    out.insert(key.clone(), self.normalize_json(value, depth + 1));
                }
                Value::Object(out)
            }
            scalar => scalar.clone(),
        }
    }

    fn depth_placeholder(&self) -> Value {
        tracing::trace!(max_depth = self.max_depth, "normalization depth exceeded");
        Value::String(format!(
            "Over {} levels deep, aborting normalization",
            self.max_depth
        ))
    }

    fn width_placeholder(&self, total: usize) -> String {
        tracing::trace!(
            max_items = self.max_item_count,
            total,
            "normalization item count exceeded"
        );
        format!(
            "Over {} items ({} total), aborting normalization",
            self.max_item_count, total
        )
    }
}

fn normalize_float(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value.is_infinite() {
        Value::String(if value > 0.0 { "INF" } else { "-INF" }.to_string())
    } else {
        Value::from(value)
    }
}
