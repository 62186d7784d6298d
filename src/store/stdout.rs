//! Stdout-based store fallback.
//!
//! When the `file-storage` feature is disabled, this implementation outputs
//! records as JSON to stdout for interoperability with external tools and
//! pipelines. Read operations always return `None` / empty (no persistence
//! across runs).

use crate::error::ProvisionError;
use crate::store::{RunRecord, RunStore};
use async_trait::async_trait;

/// Store that outputs JSON to stdout.
///
/// Write operations serialize to JSON and print to stdout. Read operations
/// return `None` — there is no persistence.
///
/// Useful for:
/// - Piping run status to other tools (`deploy | jq`)
/// - Environments without filesystem access
/// - Debugging all state transitions
#[derive(Default)]
pub struct StdoutRunStore;

impl StdoutRunStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RunStore for StdoutRunStore {
    async fn save(&mut self, record: &RunRecord) -> Result<(), ProvisionError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| ProvisionError::Storage(format!("failed to serialize record: {}", e)))?;
        println!("{}", json);
        Ok(())
    }

    async fn load(&self, _run_id: &str) -> Result<Option<RunRecord>, ProvisionError> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<RunRecord>, ProvisionError> {
        Ok(Vec::new())
    }

    async fn delete(&mut self, _run_id: &str) -> Result<(), ProvisionError> {
        Ok(())
    }
}
