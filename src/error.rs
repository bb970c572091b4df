/// Error type returned when a [`LogRecord`](crate::record::LogRecord) cannot be
/// turned into an ECS document.
///
/// Only caller-contract violations end up here. Malformed optional data is
/// dropped silently by the formatter and never fails the call.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("log record is missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("log record field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("log record field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to serialize ECS document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error type returned when configuration values cannot be parsed.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
}

/// Error type returned when installing the global subscriber.
#[cfg(feature = "layer")]
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
