//! Append-only destinations for completion records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::CompletionRecord;
use crate::error_handling::SinkError;

#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn append(&self, record: &CompletionRecord) -> Result<(), SinkError>;
}

/// Appends one line per record to a file, creating it on first write.
///
/// Writes from concurrent workers are serialized so lines never interleave.
pub struct FileCompletionSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCompletionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCompletionSink {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl CompletionSink for FileCompletionSink {
    async fn append(&self, record: &CompletionRecord) -> Result<(), SinkError> {
        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(record.to_log_line().as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }
}
