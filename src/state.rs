//! Run state — the complete snapshot of one deployment run.
//!
//! Serializable and restorable. The orchestrator persists it through the
//! backend after every transition, so a crashed or aborted run resumes
//! from its last recorded step instead of starting over.

use crate::config::DeployConfig;
use crate::error::ProvisionError;
use crate::outputs::DeploymentOutputs;
use crate::pipeline::StepResult;
use serde::{Deserialize, Serialize};

/// Where the run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Starting point: validate configuration.
    Init,
    /// Submit the resource graph to the provisioning backend.
    Provision,
    /// Execute post-deployment steps, next one at this index.
    Configure { next: usize },
    /// Done successfully.
    Complete,
    /// Failed. `failed_step` is `None` for a Phase-1 failure.
    Failed {
        reason: String,
        failed_step: Option<String>,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Provision => "provision",
            Phase::Configure { .. } => "configure",
            Phase::Complete => "complete",
            Phase::Failed { .. } => "failed",
        }
    }
}

/// Overall run status for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InProgress,
    Succeeded,
    Phase1Failed,
    Phase2Failed { step: String },
}

/// Completion report: everything a caller or an operator needs to act on
/// the run without digging through logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub outputs: DeploymentOutputs,
    pub step_results: Vec<StepResult>,
}

/// Full run state — serializable, restorable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique identifier of this run.
    pub run_id: String,
    pub phase: Phase,
    /// The configuration this run was started with. The resource graph is
    /// a pure function of it, so it is not stored separately.
    pub config: DeployConfig,
    /// Populated atomically on Phase-1 success, read-only afterwards.
    pub outputs: Option<DeploymentOutputs>,
    /// Ordered audit trail of executed steps.
    pub step_results: Vec<StepResult>,
    /// The backend's identifier for the Phase-1 submission.
    pub provider_run_id: Option<String>,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Unix timestamp of last update.
    pub updated_at: u64,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, config: DeployConfig) -> Self {
        let now = current_unix_time();
        Self {
            run_id: run_id.into(),
            phase: Phase::Init,
            config,
            outputs: None,
            step_results: Vec::new(),
            provider_run_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Complete | Phase::Failed { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Complete)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::Failed { .. })
    }

    /// Transition to a new phase.
    pub fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.updated_at = current_unix_time();
    }

    /// Fail the run. `failed_step` is `None` for Phase-1 failures.
    pub fn fail(&mut self, reason: impl Into<String>, failed_step: Option<String>) {
        self.phase = Phase::Failed {
            reason: reason.into(),
            failed_step,
        };
        self.updated_at = current_unix_time();
    }

    /// Record a step result.
    pub fn record_step(&mut self, result: StepResult) {
        self.step_results.push(result);
        self.updated_at = current_unix_time();
    }

    pub fn status(&self) -> RunStatus {
        match &self.phase {
            Phase::Complete => RunStatus::Succeeded,
            Phase::Failed { failed_step, .. } => match failed_step {
                Some(step) => RunStatus::Phase2Failed { step: step.clone() },
                None => RunStatus::Phase1Failed,
            },
            _ => RunStatus::InProgress,
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            status: self.status(),
            outputs: self.outputs.clone().unwrap_or_default(),
            step_results: self.step_results.clone(),
        }
    }

    /// Index of the first step that has not finished (succeeded or been
    /// skipped). Steps before it are never re-run on resume, though
    /// re-running them would be safe by the idempotency contract.
    pub fn first_unfinished_step(&self) -> usize {
        self.step_results
            .iter()
            .take_while(|r| r.succeeded() || r.skipped())
            .count()
    }

    /// Rewind a failed run so it can be driven again.
    ///
    /// A Phase-1 failure restarts at provisioning; a Phase-2 failure drops
    /// the failed step's result and continues from the first unfinished
    /// step. Calling this on a non-failed run is an error.
    pub fn prepare_resume(&mut self) -> Result<(), ProvisionError> {
        let failed_step = match &self.phase {
            Phase::Failed { failed_step, .. } => failed_step.clone(),
            other => {
                return Err(ProvisionError::InvalidState(format!(
                    "cannot resume a run in phase '{}'",
                    other.name()
                )))
            }
        };

        match failed_step {
            None => {
                self.outputs = None;
                self.step_results.clear();
                self.transition(Phase::Provision);
            }
            Some(_) => {
                let next = self.first_unfinished_step();
                self.step_results.truncate(next);
                self.transition(Phase::Configure { next });
            }
        }
        Ok(())
    }
}

fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
