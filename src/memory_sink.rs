use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A sink that keeps every line in memory.
///
/// Useful for tests and for inspecting the produced documents without any
/// external I/O. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines received so far.
    pub async fn lines(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }
}
