use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_ecs_formatter::init::{build_layer, LayerConfig};
use tracing_ecs_formatter::memory_sink::MemorySink;
use tracing_ecs_formatter::FormatterConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn decode(line: &str) -> Value {
    assert!(line.ends_with('\n'), "line must be newline-terminated: {:?}", line);
    serde_json::from_str(line).expect("valid JSON line")
}

#[tokio::test]
async fn events_are_written_as_ecs_lines() {
    let sink = MemorySink::new();
    let config = LayerConfig {
        formatter: FormatterConfig::default().with_tags(["integration"]),
        ..LayerConfig::default()
    };
    let (layer, handle) = build_layer(Arc::new(sink.clone()), config);
    let total = Arc::clone(&layer.total_events);
    let enqueued = Arc::clone(&layer.enqueued_events);
    let dropped = Arc::clone(&layer.dropped_events);

    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(user_id = 42, "user logged in");
        tracing::debug!("too verbose to be captured");
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        tracing::error!(error = &err as &(dyn std::error::Error + 'static), "startup failed");
    });

    // Dropping the subscriber closes the channel; the task drains and exits.
    handle.await.expect("background task");

    assert_eq!(total.load(Ordering::Relaxed), 3);
    assert_eq!(enqueued.load(Ordering::Relaxed), 2);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);

    let lines = sink.lines().await;
    assert_eq!(lines.len(), 2);

    let info = decode(&lines[0]);
    let keys: Vec<&str> = info.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["@timestamp", "log.level", "message", "ecs.version", "log", "user_id", "tags"]
    );
    assert_eq!(info["log.level"], json!("INFO"));
    assert_eq!(info["message"], json!("user logged in"));
    assert_eq!(info["log"]["logger"], json!(module_path!()));
    assert_eq!(info["log"]["origin"]["file"]["name"], json!(file!()));
    assert!(info["log"]["origin"]["file"]["line"].is_u64());
    assert_eq!(info["user_id"], json!(42));
    assert_eq!(info["tags"], json!(["integration"]));

    let error = decode(&lines[1]);
    assert_eq!(error["log.level"], json!("ERROR"));
    assert_eq!(error["message"], json!("startup failed"));
    assert_eq!(error["error"]["type"], json!("std::io::Error"));
    assert_eq!(error["error"]["message"], json!("config missing"));
    assert_eq!(error["error"]["code"], json!(0));
    assert!(error["error"]["stack_trace"].as_str().unwrap().contains("config missing"));
    assert!(error.get("labels").is_none());
    assert!(!lines[1].contains("@ecs"));
}

#[tokio::test]
async fn max_level_controls_capture() {
    let sink = MemorySink::new();
    let config = LayerConfig {
        max_level: tracing::Level::DEBUG,
        ..LayerConfig::default()
    };
    let (layer, handle) = build_layer(Arc::new(sink.clone()), config);

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::debug!(attempt = 1u64, "retrying");
        tracing::trace!("still too verbose");
    });
    handle.await.expect("background task");

    let lines = sink.lines().await;
    assert_eq!(lines.len(), 1);
    let doc = decode(&lines[0]);
    assert_eq!(doc["log.level"], json!("DEBUG"));
    assert_eq!(doc["attempt"], json!(1));
}
