use crate::AuditRecorder;
use crate::error::DbError;
use async_trait::async_trait;
use events::AuditEvent;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends every audit event as one JSON line to a file.
///
/// Each write is flushed and `sync_data`'d before `record` returns, so a
/// recorded event survives a crash of the process.
pub struct JsonlAuditLog {
    file: Mutex<File>,
}

impl JsonlAuditLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        tracing::info!(path = %path.display(), "Audit log opened");
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditRecorder for JsonlAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), DbError> {
        let mut line = event.to_json_line()?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

/// Keeps the audit trail in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every event recorded so far, in order.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), DbError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
