//! File-backed run store.
//!
//! Stores each run record as `{run_id}/status.json` under
//! `~/.provision-rs/runs/`.

use crate::error::ProvisionError;
use crate::store::{RunRecord, RunStore};
use async_trait::async_trait;
use std::path::PathBuf;

/// File-backed implementation of [`RunStore`].
///
/// Each run is stored as `{runs_dir}/{run_id}/status.json`.
pub struct FileRunStore {
    runs_dir: PathBuf,
}

impl FileRunStore {
    /// Create a store using the default directory (`~/.provision-rs/runs`).
    pub async fn new_default() -> Result<Self, ProvisionError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ProvisionError::Storage("could not determine home directory".into()))?;
        let runs_dir = home.join(".provision-rs").join("runs");
        Self::new(runs_dir).await
    }

    /// Create a store at a custom directory path.
    pub async fn new(runs_dir: PathBuf) -> Result<Self, ProvisionError> {
        tokio::fs::create_dir_all(&runs_dir)
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to create runs dir: {}", e)))?;

        Ok(Self { runs_dir })
    }

    fn record_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id).join("status.json")
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id)
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&mut self, record: &RunRecord) -> Result<(), ProvisionError> {
        let dir = self.run_dir(&record.run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to create run dir: {}", e)))?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ProvisionError::Storage(format!("failed to serialize record: {}", e)))?;

        let path = self.record_path(&record.run_id);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to write record: {}", e)))?;

        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<RunRecord>, ProvisionError> {
        let path = self.record_path(run_id);

        if tokio::fs::metadata(&path).await.is_err() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to read record: {}", e)))?;

        let record = serde_json::from_str(&content)
            .map_err(|e| ProvisionError::Storage(format!("failed to parse record: {}", e)))?;

        Ok(Some(record))
    }

    async fn list(&self) -> Result<Vec<RunRecord>, ProvisionError> {
        let mut records = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.runs_dir)
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to read runs dir: {}", e)))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProvisionError::Storage(format!("failed to read dir entry: {}", e)))?
        {
            let status_path = entry.path().join("status.json");
            if let Ok(content) = tokio::fs::read_to_string(&status_path).await {
                if let Ok(record) = serde_json::from_str::<RunRecord>(&content) {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    async fn delete(&mut self, run_id: &str) -> Result<(), ProvisionError> {
        let dir = self.run_dir(run_id);
        if tokio::fs::metadata(&dir).await.is_ok() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| ProvisionError::Storage(format!("failed to delete record: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;
    use crate::state::{Phase, RunState};

    fn make_record(run_id: &str) -> RunRecord {
        let config = DeployConfig::new("westeurope", "contoso", "oid", "admin");
        let mut state = RunState::new(run_id, config);
        state.transition(Phase::Complete);
        RunRecord::from_state(&state)
    }

    #[tokio::test]
    async fn test_file_run_store_lifecycle() {
        let temp_dir =
            std::env::temp_dir().join(format!("provision-rs-test-{}", rand::random::<u32>()));
        let mut store = FileRunStore::new(temp_dir.clone()).await.unwrap();

        let record = make_record("run-1");

        // Save
        store.save(&record).await.unwrap();

        // Load
        let loaded = store.load("run-1").await.unwrap();
        assert!(loaded.is_some());
        assert_eq!(loaded.unwrap().run_id, "run-1");

        // List
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);

        // Load non-existent
        assert!(store.load("run-404").await.unwrap().is_none());

        // Delete
        store.delete("run-1").await.unwrap();
        assert!(store.load("run-1").await.unwrap().is_none());

        // Delete idempotent
        store.delete("run-1").await.unwrap();

        // Cleanup
        let _ = tokio::fs::remove_dir_all(temp_dir).await;
    }

    #[tokio::test]
    async fn test_file_run_store_overwrite() {
        let temp_dir =
            std::env::temp_dir().join(format!("provision-rs-test-{}", rand::random::<u32>()));
        let mut store = FileRunStore::new(temp_dir.clone()).await.unwrap();

        let mut record = make_record("run-1");
        store.save(&record).await.unwrap();

        record.state.provider_run_id = Some("backend-77".into());
        store.save(&record).await.unwrap();

        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.state.provider_run_id.as_deref(), Some("backend-77"));

        let _ = tokio::fs::remove_dir_all(temp_dir).await;
    }

    #[tokio::test]
    async fn test_file_run_store_list_ignores_bad_files() {
        let temp_dir =
            std::env::temp_dir().join(format!("provision-rs-test-{}", rand::random::<u32>()));
        let mut store = FileRunStore::new(temp_dir.clone()).await.unwrap();

        store.save(&make_record("run-good")).await.unwrap();

        let bad_dir = temp_dir.join("run-bad");
        tokio::fs::create_dir_all(&bad_dir).await.unwrap();
        tokio::fs::write(bad_dir.join("status.json"), "not valid json")
            .await
            .unwrap();

        let empty_dir = temp_dir.join("run-empty");
        tokio::fs::create_dir_all(&empty_dir).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].run_id, "run-good");

        let _ = tokio::fs::remove_dir_all(temp_dir).await;
    }

    #[tokio::test]
    async fn test_file_run_store_persist_across_instances() {
        let temp_dir =
            std::env::temp_dir().join(format!("provision-rs-test-{}", rand::random::<u32>()));

        {
            let mut store = FileRunStore::new(temp_dir.clone()).await.unwrap();
            store.save(&make_record("run-555")).await.unwrap();
        }

        let store2 = FileRunStore::new(temp_dir.clone()).await.unwrap();
        let loaded = store2.load("run-555").await.unwrap();
        assert!(loaded.is_some());

        let _ = tokio::fs::remove_dir_all(temp_dir).await;
    }
}
