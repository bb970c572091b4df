use async_trait::async_trait;
use std::error::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Asynchronous destination for formatted ECS lines produced by the layer.
///
/// Implementations are responsible for transporting lines to a concrete
/// destination (stdout, a file, a log shipper). The layer calls `send` from a
/// background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single newline-terminated ECS JSON line.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` if the destination failed. The layer treats this as a
    ///   transient failure and retries the batch with backoff.
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines, if the sink buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Writes every line to the process's standard output.
#[derive(Default)]
pub struct StdoutSink {
    stdout: Mutex<Option<tokio::io::Stdout>>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogSink for StdoutSink {
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut guard = self.stdout.lock().await;
        let stdout = guard.get_or_insert_with(tokio::io::stdout);
        stdout.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(stdout) = self.stdout.lock().await.as_mut() {
            stdout.flush().await?;
        }
        Ok(())
    }
}
