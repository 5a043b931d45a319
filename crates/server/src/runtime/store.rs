//! Durable append-only persistence for ingested records (§3, §6.5).
//!
//! One newline-delimited JSON file per app under `server.data_path/logs/`.
//! Kept deliberately simple — a single append per write-batch — so that the
//! failure behavior `app_processor` depends on (an `Err` means "this batch
//! did not make it to disk") is exactly what plain `std::fs` gives us.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use logsentry_core::model::PersistedLog;
use logsentry_core::{Error, Result};
use uuid::Uuid;

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn write_batch(&self, app_id: Uuid, logs: &[PersistedLog]) -> Result<()>;
}

pub struct FileLogStore {
    root: PathBuf,
}

impl FileLogStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn write_batch(&self, app_id: Uuid, logs: &[PersistedLog]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for log in logs {
            serde_json::to_writer(&mut buf, log)?;
            buf.push(b'\n');
        }

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&root)?;
            let path = root.join(format!("{app_id}.jsonl"));
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            file.write_all(&buf)
        })
        .await
        .map_err(|e| Error::StoreWriteFailed(e.to_string()))?
        .map_err(|e| Error::StoreWriteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use logsentry_core::model::Level;

    fn sample(app_id: Uuid) -> PersistedLog {
        PersistedLog {
            id: Uuid::new_v4(),
            app_id,
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level: Level::Info,
            service: "svc".into(),
            message: "hello".into(),
            attributes: Default::default(),
            fingerprint: "fp".into(),
            classification: None,
        }
    }

    #[tokio::test]
    async fn write_batch_appends_ndjson_lines() {
        let dir = tempfile_dir();
        let store = FileLogStore::new(dir.clone());
        let app_id = Uuid::new_v4();
        store.write_batch(app_id, &[sample(app_id), sample(app_id)]).await.unwrap();

        let contents = std::fs::read_to_string(dir.join(format!("{app_id}.jsonl"))).unwrap();
        assert_eq!(contents.lines().count(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let dir = tempfile_dir();
        let store = FileLogStore::new(dir.clone());
        store.write_batch(Uuid::new_v4(), &[]).await.unwrap();
        assert!(!dir.exists());
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("logsentry-store-test-{}", Uuid::new_v4()));
        dir
    }
}
