//! The One Trait: ProvisionBackend
//!
//! The single abstraction point for every external dependency. The
//! orchestrator is pure logic — it doesn't know about cloud SDKs, SQL
//! drivers, or state directories. That's YOUR problem when you implement
//! this trait.

use crate::credentials::CredentialToken;
use crate::error::ProvisionError;
use crate::graph::ResourceGraph;
use crate::pipeline::DatabaseRole;
use crate::poll::Probe;
use crate::outputs::DeploymentOutputs;
use crate::state::RunState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

/// Terminal status of a Phase-1 submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Succeeded,
    Failed,
}

/// Per-node diagnostic returned on a failed submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDiagnostic {
    pub node: String,
    pub message: String,
}

/// Result of submitting a resource graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// The backend's identifier for this provisioning run.
    pub run_id: String,
    pub status: SubmissionStatus,
    /// Named outputs; empty unless `status` is `Succeeded`.
    pub outputs: DeploymentOutputs,
    /// Populated on failure.
    pub diagnostics: Vec<NodeDiagnostic>,
}

impl Submission {
    pub fn is_success(&self) -> bool {
        self.status == SubmissionStatus::Succeeded
    }

    /// One-line summary of the failure diagnostics.
    pub fn diagnostic_summary(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| format!("{}: {}", d.node, d.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The single trait consumers implement to use the orchestrator.
///
/// Abstracts:
/// - Graph submission (the provisioning engine orders creation itself
///   using the declared dependency edges)
/// - Data-store readiness probing
/// - Administrative mutations (firewall, principals, roles, SQL batches)
/// - Application configuration
/// - Run state persistence
pub trait ProvisionBackend: Send + Sync {
    // ═══════════════════════════════════════════════════════════════
    // PHASE 1 — PROVISIONING
    // ═══════════════════════════════════════════════════════════════

    /// Submit the graph as one atomic operation and block until the
    /// backend reports a terminal status.
    fn submit_graph(
        &self,
        graph: &ResourceGraph,
    ) -> impl Future<Output = Result<Submission, ProvisionError>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // READINESS
    // ═══════════════════════════════════════════════════════════════

    /// Lightweight serviceability check against the data store — e.g. a
    /// connection attempt. `Err` means a terminal fault, not "not yet".
    fn probe_database(
        &self,
        server: &str,
    ) -> impl Future<Output = Result<Probe, ProvisionError>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // ADMINISTRATIVE MUTATIONS (need a scoped token)
    // ═══════════════════════════════════════════════════════════════

    /// Create or overwrite a named firewall rule on the data store.
    fn create_firewall_rule(
        &self,
        token: &CredentialToken,
        server: &str,
        rule_name: &str,
        start: &str,
        end: &str,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Drop-and-recreate the external-provider principal. Must leave the
    /// same end state whether or not the principal already existed.
    fn ensure_identity_principal(
        &self,
        token: &CredentialToken,
        server: &str,
        database: &str,
        principal: &str,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Grant database roles to a principal. Re-granting is a no-op.
    fn grant_database_roles(
        &self,
        token: &CredentialToken,
        server: &str,
        database: &str,
        principal: &str,
        roles: &[DatabaseRole],
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Execute one SQL batch (schema DDL or procedure definition). The
    /// batch itself carries the idempotency guards.
    fn apply_sql_batch(
        &self,
        token: &CredentialToken,
        server: &str,
        database: &str,
        batch: &str,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Apply settings to the running application service.
    fn apply_app_settings(
        &self,
        token: &CredentialToken,
        app: &str,
        settings: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // STATE PERSISTENCE
    // ═══════════════════════════════════════════════════════════════

    /// Load run state by run id.
    fn load_state(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Option<RunState>, ProvisionError>> + Send;

    /// Save run state.
    fn save_state(
        &self,
        run_id: &str,
        state: &RunState,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}
