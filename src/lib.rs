pub mod error;
pub mod record;
pub mod sanitize;
pub mod types;
pub mod normalizer;
pub mod formatter;
pub mod env;

#[cfg(feature = "layer")]
pub mod sink;
#[cfg(feature = "layer")]
pub mod memory_sink;
#[cfg(feature = "layer")]
pub mod layer;
#[cfg(feature = "layer")]
pub mod init;

pub use error::FormatError;
pub use formatter::{Dialect, EcsFormatter, FormatterConfig, TimestampFormat, ECS_VERSION};
pub use record::{Context, ContextValue, Level, LogRecord};
pub use types::{ErrorContext, Service, Tracing, TypedContext, User};
