use std::sync::Arc;
use tracing::{error, info};

use tracing_ecs_formatter::env::formatter_config_from_env;
use tracing_ecs_formatter::init::{init_ecs_logging_with_config, LayerConfig};
use tracing_ecs_formatter::sink::StdoutSink;
use tracing_ecs_formatter::{
    ContextValue, EcsFormatter, Level, LogRecord, Service, Tracing, User,
};

#[derive(Debug, thiserror::Error)]
#[error("payment provider rejected the card")]
struct CardDeclined;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let formatter_config = formatter_config_from_env()?;

    // Formatting a record by hand, without the tracing layer.
    let formatter = EcsFormatter::new(formatter_config.clone());
    let record = LogRecord::builder()
        .level(Level::Error)
        .channel("checkout")
        .datetime(chrono::Utc::now())
        .message("order could not be paid")
        .context(
            "tracing",
            Tracing::new("0af7651916cd43dd8448eb211c80319c")
                .with_transaction_id("b7ad6b7169203331"),
        )
        .context("service", Service::new().with_name("checkout").with_version("1.4.2"))
        .context("user", User::new().with_id(1001).with_email("ada@example.com"))
        .context("error", ContextValue::error(CardDeclined))
        .context("labels", serde_json::json!({ "order.id": "A-17", "payment method": "card" }))
        .build()?;
    print!("{}", formatter.format(&record)?);

    // Routing `tracing` events through the ECS layer.
    let config = LayerConfig {
        formatter: formatter_config,
        ..LayerConfig::default()
    };
    let _handle = init_ecs_logging_with_config(Arc::new(StdoutSink::new()), config)?;

    info!(cart_items = 3, "starting checkout");
    error!(reason = "invalid card", "checkout failed");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    Ok(())
}
