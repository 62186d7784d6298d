//! provision-rs
//!
//! Standalone, trait-based two-phase provisioning orchestrator.
//!
//! # Design
//!
//! Phase 1 submits a dependency-ordered resource graph to a provisioning
//! backend and captures the named outputs. Phase 2 runs an ordered list of
//! idempotent configuration steps against the live resources — firewall
//! rules, identity bindings, schema objects, application settings — with
//! readiness polling, scoped short-lived credentials, transient-only
//! retries, and resumable persisted state.
//!
//! This library provides the orchestration logic without coupling to any
//! specific cloud, SQL driver, or storage implementation. You implement the
//! [`ProvisionBackend`] and [`CredentialProvider`] traits with your
//! infrastructure, and the engine handles the rest.
//!
//! # Usage
//!
//! ```ignore
//! use provision_rs::{
//!     DeployConfig, DeploymentOrchestrator, OrchestratorConfig, Progress, RunState,
//! };
//!
//! // Implement ProvisionBackend and CredentialProvider for your stack
//! let backend = MyBackend::new();
//! let credentials = MyCredentials::new();
//!
//! let config = DeployConfig::new("westeurope", "contoso", admin_oid, admin_login)
//!     .with_gen_ai(true);
//! let mut state = RunState::new("run-1", config);
//!
//! let orchestrator =
//!     DeploymentOrchestrator::new(&backend, &credentials, OrchestratorConfig::default());
//! match orchestrator.run_to_completion(&mut state).await? {
//!     Progress::Complete => println!("{:?}", state.report()),
//!     Progress::Failed(reason) => eprintln!("failed: {}", reason),
//!     _ => {}
//! }
//! ```

pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod outputs;
pub mod pipeline;
pub mod poll;
pub mod state;
pub mod store;

// Re-export the main types at crate root for convenience
pub use backend::{NodeDiagnostic, ProvisionBackend, Submission, SubmissionStatus};
pub use config::DeployConfig;
pub use credentials::{audiences, CredentialProvider, CredentialToken};
pub use error::ProvisionError;
pub use graph::{build_graph, ResourceGraph, ResourceKind, ResourceNode};
pub use orchestrator::{DeploymentOrchestrator, OrchestratorConfig, Progress};
pub use outputs::{keys, DeploymentOutputs};
pub use pipeline::{
    default_steps, ConfigStep, DatabaseRole, StepAction, StepResult, StepStatus,
};
pub use poll::{wait_ready, CancelToken, PollConfig, Probe};
pub use state::{Phase, RunReport, RunState, RunStatus};
pub use store::{RunRecord, RunStore, StdoutRunStore};

#[cfg(feature = "file-storage")]
pub use store::FileRunStore;
