//! Environment variable names used by this crate for convenient
//! configuration of the formatter from services.
//!
//! These are purely helpers; [`FormatterConfig`] itself never reads the
//! environment.

use crate::error::ConfigError;
use crate::formatter::{Dialect, FormatterConfig, TimestampFormat};

/// Comma-separated list of static tags, e.g. `api,eu-west-1`.
pub const ECS_LOG_TAGS_ENV: &str = "ECS_LOG_TAGS";

/// Document dialect: `ecs` (default) or `legacy`.
pub const ECS_LOG_DIALECT_ENV: &str = "ECS_LOG_DIALECT";

/// Timestamp rendering: `offset` or `utc`. Defaults to the dialect's choice.
pub const ECS_LOG_TIMESTAMP_ENV: &str = "ECS_LOG_TIMESTAMP";

/// Whether `file`/`line`/`class`/`function` context keys become `log.origin`.
pub const ECS_LOG_ORIGIN_FROM_CONTEXT_ENV: &str = "ECS_LOG_ORIGIN_FROM_CONTEXT";

/// Build a [`FormatterConfig`] from the `ECS_LOG_*` variables.
///
/// Unset variables keep their defaults; set but unparsable values are
/// reported instead of being ignored.
pub fn formatter_config_from_env() -> Result<FormatterConfig, ConfigError> {
    formatter_config_from(|key| std::env::var(key).ok())
}

/// Same as [`formatter_config_from_env`] with an injectable lookup.
pub fn formatter_config_from<F>(lookup: F) -> Result<FormatterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let dialect = match lookup(ECS_LOG_DIALECT_ENV) {
        Some(raw) => raw.parse::<Dialect>().map_err(|_| ConfigError::InvalidValue {
            key: ECS_LOG_DIALECT_ENV,
            value: raw,
        })?,
        None => Dialect::default(),
    };

    let mut config = FormatterConfig::for_dialect(dialect);

    if let Some(raw) = lookup(ECS_LOG_TAGS_ENV) {
        config.tags = raw
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(raw) = lookup(ECS_LOG_TIMESTAMP_ENV) {
        config.timestamp_format = match raw.trim().to_ascii_lowercase().as_str() {
            "offset" => TimestampFormat::Offset,
            "utc" => TimestampFormat::Utc,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ECS_LOG_TIMESTAMP_ENV,
                    value: raw,
                })
            }
        };
    }

    if let Some(raw) = lookup(ECS_LOG_ORIGIN_FROM_CONTEXT_ENV) {
        config.log_origin_from_context = parse_bool(&raw).ok_or(ConfigError::InvalidValue {
            key: ECS_LOG_ORIGIN_FROM_CONTEXT_ENV,
            value: raw,
        })?;
    }

    Ok(config)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
