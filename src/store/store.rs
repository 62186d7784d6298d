//! [`RunStore`] trait definition.

use crate::error::ProvisionError;
use crate::store::RunRecord;
use async_trait::async_trait;

/// Trait for persisting run records indexed by run id.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save a run record. Overwrites any existing record for this run id.
    async fn save(&mut self, record: &RunRecord) -> Result<(), ProvisionError>;

    /// Load a run record by run id. Returns `None` if not found.
    async fn load(&self, run_id: &str) -> Result<Option<RunRecord>, ProvisionError>;

    /// List all stored run records.
    async fn list(&self) -> Result<Vec<RunRecord>, ProvisionError>;

    /// Delete a run record by run id. Idempotent.
    async fn delete(&mut self, run_id: &str) -> Result<(), ProvisionError>;
}
