use crate::error::InitError;
use crate::formatter::{EcsFormatter, FormatterConfig};
use crate::layer::EcsLayer;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the ECS logging layer.
///
/// Controls the size of the internal buffer, the batch size used when
/// sending to the sink, how often a partial batch is flushed, which levels
/// are captured, whether events are also printed to the console through a
/// `fmt` layer, and the formatter settings.
///
/// **Fields**
/// - `channel_buffer`: maximum number of lines queued before new ones are
///   dropped.
/// - `batch_size`: number of lines sent to the sink per batch.
/// - `flush_interval`: maximum interval between flushes, even when the
///   batch is not full.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`EcsLayer`].
/// - `max_level`: most verbose level that is captured.
/// - `formatter`: [`FormatterConfig`] used to build the documents.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub enable_stdout: bool,
    pub max_level: tracing::Level,
    pub formatter: FormatterConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            enable_stdout: false,
            max_level: tracing::Level::INFO,
            formatter: FormatterConfig::default(),
        }
    }
}

/// Build an [`EcsLayer`] from a [`LayerConfig`] without installing it.
///
/// Use this to compose the layer with other layers of your own.
pub fn build_layer(sink: Arc<dyn LogSink>, config: LayerConfig) -> (EcsLayer, JoinHandle<()>) {
    let (layer, handle) = EcsLayer::new(
        sink,
        EcsFormatter::new(config.formatter),
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
    );
    (layer.with_max_level(config.max_level), handle)
}

/// Install a global `tracing` subscriber that writes ECS lines to `sink`.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive the formatted
///   lines.
/// - `config`: [`LayerConfig`] controlling buffering, batching and
///   formatting.
///
/// **Returns**
/// - the handle of the background task draining the channel.
/// - [`InitError::AlreadyInstalled`] if a global subscriber was already set.
pub fn init_ecs_logging_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let enable_stdout = config.enable_stdout;
    let (layer, handle) = build_layer(sink, config);

    // The two subscriber stacks have different types, so each branch
    // installs its own.
    if enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Install the ECS subscriber with [`LayerConfig::default`].
pub fn init_ecs_logging(sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, InitError> {
    init_ecs_logging_with_config(sink, LayerConfig::default())
}
