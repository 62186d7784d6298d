//! Two-phase deployment orchestrator.
//!
//! The engine that drives a run. It's dumb — it validates, submits the
//! graph, then walks the configuration steps in order, calling the backend.
//! No storage, no tokens, no transport. Just logic.
//!
//! Phase 1 is one blocking submission; the provisioning backend orders
//! resource creation internally from the declared edges. Phase 2 is the
//! strictly sequential step pipeline. A failure in Phase 1 means Phase 2
//! never starts; a failure in Phase 2 halts remaining steps but keeps every
//! completed result so the run can resume.

use crate::backend::ProvisionBackend;
use crate::credentials::CredentialProvider;
use crate::error::ProvisionError;
use crate::graph::build_graph;
use crate::outputs::{keys, DeploymentOutputs};
use crate::pipeline::{default_steps, ConfigStep, StepAction, StepResult, StepStatus};
use crate::poll::{wait_ready, CancelToken, PollConfig};
use crate::state::{Phase, RunState};
use std::collections::BTreeMap;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Name of the firewall rule the pipeline manages. Overwriting the same
/// rule on re-runs is what makes the step idempotent.
const CLIENT_FIREWALL_RULE: &str = "allow-client";

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retries per step after the first attempt, transient errors only.
    pub max_step_retries: u32,
    /// Base delay between retries; grows linearly with the attempt count.
    pub retry_backoff: Duration,
    /// Readiness polling parameters.
    pub poll: PollConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_step_retries: 2,
            retry_backoff: Duration::from_secs(5),
            poll: PollConfig::default(),
        }
    }
}

/// Result of advancing one phase transition.
#[derive(Debug)]
pub enum Progress {
    /// Keep going, call advance() again.
    Continue,
    /// Done successfully.
    Complete,
    /// Failed; the run state carries the detail.
    Failed(String),
}

/// The deployment orchestrator.
///
/// Parameterized by the backend and credential provider — you provide the
/// implementations.
pub struct DeploymentOrchestrator<'a, B: ProvisionBackend, C: CredentialProvider> {
    backend: &'a B,
    credentials: &'a C,
    config: OrchestratorConfig,
    steps: Option<Vec<ConfigStep>>,
    cancel: CancelToken,
}

impl<'a, B: ProvisionBackend, C: CredentialProvider> DeploymentOrchestrator<'a, B, C> {
    pub fn new(backend: &'a B, credentials: &'a C, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            credentials,
            config,
            steps: None,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the default step list. Order is preserved as given.
    pub fn with_steps(mut self, steps: Vec<ConfigStep>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Token an operator can use to abort readiness waits early.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn steps_for(&self, state: &RunState) -> Vec<ConfigStep> {
        match &self.steps {
            Some(steps) => steps.clone(),
            None => default_steps(&state.config),
        }
    }

    /// Advance the run by one transition.
    ///
    /// Each call does ONE thing — validate, submit, or run a single step —
    /// then persists the state. Call in a loop until Complete or Failed.
    pub async fn advance(&self, state: &mut RunState) -> Result<Progress, ProvisionError> {
        let result = match &state.phase {
            Phase::Init => self.phase_init(state).await,
            Phase::Provision => self.phase_provision(state).await,
            Phase::Configure { next } => {
                let next = *next;
                self.phase_configure(state, next).await
            }
            Phase::Complete => return Ok(Progress::Complete),
            Phase::Failed { reason, .. } => return Ok(Progress::Failed(reason.clone())),
        };

        // Always save state after a transition (even on error, the state
        // might have changed).
        self.backend.save_state(&state.run_id, state).await?;

        result
    }

    /// Run until the run reaches a terminal phase.
    pub async fn run_to_completion(
        &self,
        state: &mut RunState,
    ) -> Result<Progress, ProvisionError> {
        loop {
            match self.advance(state).await? {
                Progress::Continue => continue,
                other => return Ok(other),
            }
        }
    }

    /// Rewind a failed run and drive it to completion again.
    ///
    /// Succeeded and skipped steps are not re-executed; the pipeline picks
    /// up at the first unfinished step.
    pub async fn resume(&self, state: &mut RunState) -> Result<Progress, ProvisionError> {
        state.prepare_resume()?;
        info!(run_id = %state.run_id, phase = state.phase.name(), "resuming run");
        self.run_to_completion(state).await
    }

    // ═══════════════════════════════════════════════════════════════
    // PHASE IMPLEMENTATIONS
    // ═══════════════════════════════════════════════════════════════

    async fn phase_init(&self, state: &mut RunState) -> Result<Progress, ProvisionError> {
        state.config.validate()?;
        state.transition(Phase::Provision);
        Ok(Progress::Continue)
    }

    async fn phase_provision(&self, state: &mut RunState) -> Result<Progress, ProvisionError> {
        // Build and validate before touching the backend: a cycle or a bad
        // name must surface here, not as an opaque mid-run diagnostic.
        let graph = build_graph(&state.config)?;
        info!(run_id = %state.run_id, nodes = graph.len(), "submitting resource graph");

        let submission = self.backend.submit_graph(&graph).await?;
        state.provider_run_id = Some(submission.run_id.clone());

        if !submission.is_success() {
            let detail = submission.diagnostic_summary();
            warn!(run_id = %state.run_id, %detail, "provisioning failed");
            state.fail(format!("provisioning failed: {}", detail), None);
            return Ok(Progress::Failed(detail));
        }

        info!(
            run_id = %state.run_id,
            outputs = submission.outputs.len(),
            "provisioning succeeded"
        );
        state.outputs = Some(submission.outputs);
        state.transition(Phase::Configure { next: 0 });
        Ok(Progress::Continue)
    }

    async fn phase_configure(
        &self,
        state: &mut RunState,
        next: usize,
    ) -> Result<Progress, ProvisionError> {
        let steps = self.steps_for(state);
        if next >= steps.len() {
            info!(run_id = %state.run_id, "all configuration steps finished");
            state.transition(Phase::Complete);
            return Ok(Progress::Complete);
        }

        let step = &steps[next];
        let outputs = state
            .outputs
            .clone()
            .ok_or_else(|| ProvisionError::InvalidState("outputs missing in Configure".into()))?;

        // A required output missing is a defect in the graph or the step
        // definition — the run fails rather than limping on.
        if let Some(key) = step.missing_required(&outputs) {
            let err = ProvisionError::MissingOutput(key.to_string());
            state.record_step(StepResult {
                step: step.name.clone(),
                status: StepStatus::Failed {
                    error: err.to_string(),
                },
                attempts: 0,
            });
            state.fail(err.to_string(), Some(step.name.clone()));
            return Ok(Progress::Failed(err.to_string()));
        }

        // An optional-module output missing just means the module was not
        // deployed; the step is skipped, not failed.
        let missing = step.missing_skippable(&outputs);
        if !missing.is_empty() {
            info!(run_id = %state.run_id, step = %step.name, ?missing, "step skipped");
            state.record_step(StepResult {
                step: step.name.clone(),
                status: StepStatus::Skipped { missing },
                attempts: 0,
            });
            state.transition(Phase::Configure { next: next + 1 });
            return Ok(Progress::Continue);
        }

        match self.run_step_with_retry(state, step, &outputs).await {
            Ok(attempts) => {
                debug!(run_id = %state.run_id, step = %step.name, attempts, "step succeeded");
                state.record_step(StepResult {
                    step: step.name.clone(),
                    status: StepStatus::Succeeded,
                    attempts,
                });
                state.transition(Phase::Configure { next: next + 1 });
                Ok(Progress::Continue)
            }
            Err((err, attempts)) => {
                warn!(run_id = %state.run_id, step = %step.name, %err, "step failed");
                state.record_step(StepResult {
                    step: step.name.clone(),
                    status: StepStatus::Failed {
                        error: err.to_string(),
                    },
                    attempts,
                });
                state.fail(err.to_string(), Some(step.name.clone()));
                Ok(Progress::Failed(err.to_string()))
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // STEP EXECUTION
    // ═══════════════════════════════════════════════════════════════

    /// Execute one step, retrying transient failures with linear backoff.
    /// Returns the attempt count on success, or the last error with it.
    async fn run_step_with_retry(
        &self,
        state: &RunState,
        step: &ConfigStep,
        outputs: &DeploymentOutputs,
    ) -> Result<u32, (ProvisionError, u32)> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.execute_action(step, outputs).await {
                Ok(()) => return Ok(attempts),
                Err(err) if err.is_transient() && attempts <= self.config.max_step_retries => {
                    warn!(
                        run_id = %state.run_id,
                        step = %step.name,
                        attempt = attempts,
                        %err,
                        "transient step failure, retrying"
                    );
                    sleep(self.config.retry_backoff * attempts).await;
                }
                Err(err) => return Err((err, attempts)),
            }
        }
    }

    /// Run a step's action against the backend. A fresh token is acquired
    /// per attempt; an acquisition denial fails the step without retry.
    async fn execute_action(
        &self,
        step: &ConfigStep,
        outputs: &DeploymentOutputs,
    ) -> Result<(), ProvisionError> {
        // Readiness is the one action that talks to no administrative
        // plane and needs no credential.
        if matches!(step.action, StepAction::AwaitDatabaseReady) {
            let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
            return wait_ready(
                server,
                || self.backend.probe_database(server),
                &self.config.poll,
                &self.cancel,
            )
            .await;
        }

        let audience = step.action.audience().ok_or_else(|| {
            ProvisionError::InvalidState(format!("step '{}' has no audience", step.name))
        })?;
        let token = self.credentials.acquire(audience).await?;

        match &step.action {
            StepAction::AllowClientFirewall { start, end } => {
                let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
                self.backend
                    .create_firewall_rule(&token, server, CLIENT_FIREWALL_RULE, start, end)
                    .await
            }
            StepAction::EnsureIdentityPrincipal => {
                let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
                let database = outputs.get_str(keys::SQL_DATABASE_NAME)?;
                let principal = outputs.get_str(keys::MANAGED_IDENTITY_NAME)?;
                self.backend
                    .ensure_identity_principal(&token, server, database, principal)
                    .await
            }
            StepAction::GrantDatabaseRoles { roles } => {
                let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
                let database = outputs.get_str(keys::SQL_DATABASE_NAME)?;
                let principal = outputs.get_str(keys::MANAGED_IDENTITY_NAME)?;
                self.backend
                    .grant_database_roles(&token, server, database, principal, roles)
                    .await
            }
            StepAction::ApplySchema { batch } => {
                let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
                let database = outputs.get_str(keys::SQL_DATABASE_NAME)?;
                self.backend
                    .apply_sql_batch(&token, server, database, batch)
                    .await
            }
            StepAction::CreateProcedures { batches } => {
                let server = outputs.get_str(keys::SQL_SERVER_NAME)?;
                let database = outputs.get_str(keys::SQL_DATABASE_NAME)?;
                for batch in batches {
                    self.backend
                        .apply_sql_batch(&token, server, database, batch)
                        .await?;
                }
                Ok(())
            }
            StepAction::ApplyAiAppSettings => {
                let app = outputs.get_str(keys::APP_SERVICE_NAME)?;
                let settings = ai_settings(outputs)?;
                self.backend
                    .apply_app_settings(&token, app, &settings)
                    .await
            }
            StepAction::AwaitDatabaseReady => Err(ProvisionError::InvalidState(
                "readiness step reached credentialed path".into(),
            )),
        }
    }
}

/// Settings written to the app service when the GenAI module is present.
/// The search endpoint rides along only when its module was also deployed.
fn ai_settings(
    outputs: &DeploymentOutputs,
) -> Result<BTreeMap<String, String>, ProvisionError> {
    let mut settings = BTreeMap::new();
    settings.insert(
        "OPENAI_ENDPOINT".to_string(),
        outputs.get_str(keys::OPENAI_ENDPOINT)?.to_string(),
    );
    settings.insert(
        "OPENAI_DEPLOYMENT".to_string(),
        outputs.get_str(keys::OPENAI_DEPLOYMENT_NAME)?.to_string(),
    );
    settings.insert(
        "IDENTITY_CLIENT_ID".to_string(),
        outputs.get_str(keys::MANAGED_IDENTITY_CLIENT_ID)?.to_string(),
    );
    if let Some(search) = outputs.get_optional_str(keys::SEARCH_ENDPOINT) {
        settings.insert("SEARCH_ENDPOINT".to_string(), search.to_string());
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_step_retries, 2);
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_ai_settings_without_search() {
        let mut outputs = DeploymentOutputs::new();
        outputs.insert(keys::OPENAI_ENDPOINT, json!("https://oai.example"));
        outputs.insert(keys::OPENAI_DEPLOYMENT_NAME, json!("gpt"));
        outputs.insert(keys::MANAGED_IDENTITY_CLIENT_ID, json!("client-1"));

        let settings = ai_settings(&outputs).unwrap();
        assert_eq!(settings["OPENAI_ENDPOINT"], "https://oai.example");
        assert_eq!(settings["OPENAI_DEPLOYMENT"], "gpt");
        assert_eq!(settings["IDENTITY_CLIENT_ID"], "client-1");
        assert!(!settings.contains_key("SEARCH_ENDPOINT"));
    }

    #[test]
    fn test_ai_settings_with_search() {
        let mut outputs = DeploymentOutputs::new();
        outputs.insert(keys::OPENAI_ENDPOINT, json!("https://oai.example"));
        outputs.insert(keys::OPENAI_DEPLOYMENT_NAME, json!("gpt"));
        outputs.insert(keys::MANAGED_IDENTITY_CLIENT_ID, json!("client-1"));
        outputs.insert(keys::SEARCH_ENDPOINT, json!("https://search.example"));

        let settings = ai_settings(&outputs).unwrap();
        assert_eq!(settings["SEARCH_ENDPOINT"], "https://search.example");
    }
}
