//! Post-deployment configuration steps.
//!
//! Phase-2 is a totally ordered list of idempotent steps. Each step names
//! the deployment outputs it consumes; a missing required output is a
//! defect, a missing skippable output (the owning optional module was not
//! deployed) marks the step skipped and the pipeline moves on.
//!
//! The ordering is load-bearing: firewall access before anything that
//! queries the data store, identity creation before role grants, schema
//! before procedures, AI app settings last.

use crate::credentials::audiences;
use crate::outputs::{keys, DeploymentOutputs};
use crate::config::DeployConfig;
use serde::{Deserialize, Serialize};

/// Database roles the pipeline grants to the managed identity principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseRole {
    Reader,
    Writer,
    Execute,
}

impl DatabaseRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseRole::Reader => "db_datareader",
            DatabaseRole::Writer => "db_datawriter",
            DatabaseRole::Execute => "execute",
        }
    }
}

/// What a step does when it runs.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Open the client address range on the data store's firewall.
    AllowClientFirewall { start: String, end: String },
    /// Poll the data store until it accepts connections.
    AwaitDatabaseReady,
    /// Drop-and-recreate the external-provider principal for the managed
    /// identity. Recreating an existing principal is a no-op in effect.
    EnsureIdentityPrincipal,
    /// Grant database roles to the principal. Re-granting is a no-op.
    GrantDatabaseRoles { roles: Vec<DatabaseRole> },
    /// Apply the schema definition batch. The batch must be written to be
    /// re-runnable (guarded DDL).
    ApplySchema { batch: String },
    /// Create or alter stored procedures. Must run after the schema.
    CreateProcedures { batches: Vec<String> },
    /// Write AI endpoint settings to the app service.
    ApplyAiAppSettings,
}

impl StepAction {
    /// Token audience this action authenticates against, if any.
    pub fn audience(&self) -> Option<&'static str> {
        match self {
            StepAction::AllowClientFirewall { .. } | StepAction::ApplyAiAppSettings => {
                Some(audiences::MANAGEMENT)
            }
            StepAction::EnsureIdentityPrincipal
            | StepAction::GrantDatabaseRoles { .. }
            | StepAction::ApplySchema { .. }
            | StepAction::CreateProcedures { .. } => Some(audiences::DATA_STORE),
            StepAction::AwaitDatabaseReady => None,
        }
    }
}

/// One ordered unit of post-deployment configuration.
#[derive(Debug, Clone)]
pub struct ConfigStep {
    pub name: String,
    /// Output keys this step cannot run without. Absence fails the run.
    pub requires: Vec<String>,
    /// Output keys owned by optional modules. Absence skips the step.
    pub skip_if_missing: Vec<String>,
    pub action: StepAction,
}

impl ConfigStep {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            skip_if_missing: Vec::new(),
            action,
        }
    }

    pub fn requires(mut self, key: &str) -> Self {
        self.requires.push(key.to_string());
        self
    }

    pub fn skip_if_missing(mut self, key: &str) -> Self {
        self.skip_if_missing.push(key.to_string());
        self
    }

    /// First required key absent from `outputs`, if any.
    pub fn missing_required(&self, outputs: &DeploymentOutputs) -> Option<&str> {
        self.requires
            .iter()
            .find(|k| !outputs.contains(k))
            .map(String::as_str)
    }

    /// Skippable keys absent from `outputs`.
    pub fn missing_skippable(&self, outputs: &DeploymentOutputs) -> Vec<String> {
        self.skip_if_missing
            .iter()
            .filter(|k| !outputs.contains(k))
            .cloned()
            .collect()
    }
}

/// Terminal status of one step execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Succeeded,
    /// An optional-module input was absent. Not a failure.
    Skipped { missing: Vec<String> },
    Failed { error: String },
}

/// Audit record of one step execution, retained for the run report and
/// for resumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub status: StepStatus,
    /// Total executions of the action, including retries.
    pub attempts: u32,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded)
    }

    pub fn skipped(&self) -> bool {
        matches!(self.status, StepStatus::Skipped { .. })
    }
}

/// Guarded DDL — safe to re-apply.
const DEFAULT_SCHEMA: &str = "\
IF OBJECT_ID('dbo.todo', 'U') IS NULL
CREATE TABLE dbo.todo (
    id INT IDENTITY PRIMARY KEY,
    title NVARCHAR(200) NOT NULL,
    completed BIT NOT NULL DEFAULT 0
);";

const DEFAULT_PROCEDURES: [&str; 2] = [
    "CREATE OR ALTER PROCEDURE dbo.list_todos AS SELECT id, title, completed FROM dbo.todo;",
    "CREATE OR ALTER PROCEDURE dbo.complete_todo @id INT AS \
     UPDATE dbo.todo SET completed = 1 WHERE id = @id;",
];

/// The default step list, in execution order.
pub fn default_steps(config: &DeployConfig) -> Vec<ConfigStep> {
    vec![
        ConfigStep::new(
            "allow_client_firewall",
            StepAction::AllowClientFirewall {
                start: config.client_ip_start.clone(),
                end: config.client_ip_end.clone(),
            },
        )
        .requires(keys::SQL_SERVER_NAME),
        ConfigStep::new("await_database_ready", StepAction::AwaitDatabaseReady)
            .requires(keys::SQL_SERVER_NAME),
        ConfigStep::new(
            "create_identity_principal",
            StepAction::EnsureIdentityPrincipal,
        )
        .requires(keys::SQL_SERVER_NAME)
        .requires(keys::SQL_DATABASE_NAME)
        .requires(keys::MANAGED_IDENTITY_NAME),
        ConfigStep::new(
            "grant_database_roles",
            StepAction::GrantDatabaseRoles {
                roles: vec![
                    DatabaseRole::Reader,
                    DatabaseRole::Writer,
                    DatabaseRole::Execute,
                ],
            },
        )
        .requires(keys::SQL_SERVER_NAME)
        .requires(keys::SQL_DATABASE_NAME)
        .requires(keys::MANAGED_IDENTITY_NAME),
        ConfigStep::new(
            "apply_schema",
            StepAction::ApplySchema {
                batch: DEFAULT_SCHEMA.to_string(),
            },
        )
        .requires(keys::SQL_SERVER_NAME)
        .requires(keys::SQL_DATABASE_NAME),
        ConfigStep::new(
            "create_stored_procedures",
            StepAction::CreateProcedures {
                batches: DEFAULT_PROCEDURES.iter().map(|s| s.to_string()).collect(),
            },
        )
        .requires(keys::SQL_SERVER_NAME)
        .requires(keys::SQL_DATABASE_NAME),
        ConfigStep::new("apply_ai_app_settings", StepAction::ApplyAiAppSettings)
            .requires(keys::APP_SERVICE_NAME)
            .requires(keys::MANAGED_IDENTITY_CLIENT_ID)
            .skip_if_missing(keys::OPENAI_ENDPOINT)
            .skip_if_missing(keys::OPENAI_DEPLOYMENT_NAME),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> DeployConfig {
        DeployConfig::new("westeurope", "contoso", "oid", "admin")
    }

    fn core_outputs() -> DeploymentOutputs {
        let mut o = DeploymentOutputs::new();
        o.insert(keys::SQL_SERVER_NAME, json!("srv1"));
        o.insert(keys::SQL_DATABASE_NAME, json!("db1"));
        o.insert(keys::MANAGED_IDENTITY_NAME, json!("id1"));
        o.insert(keys::MANAGED_IDENTITY_CLIENT_ID, json!("client-1"));
        o.insert(keys::APP_SERVICE_NAME, json!("app1"));
        o
    }

    #[test]
    fn test_default_step_order() {
        let steps = default_steps(&config());
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "allow_client_firewall",
                "await_database_ready",
                "create_identity_principal",
                "grant_database_roles",
                "apply_schema",
                "create_stored_procedures",
                "apply_ai_app_settings",
            ]
        );

        // Firewall and readiness strictly precede every query-issuing step;
        // schema strictly precedes procedures; app settings come last.
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("allow_client_firewall") < pos("create_identity_principal"));
        assert!(pos("await_database_ready") < pos("create_identity_principal"));
        assert!(pos("create_identity_principal") < pos("grant_database_roles"));
        assert!(pos("apply_schema") < pos("create_stored_procedures"));
        assert_eq!(pos("apply_ai_app_settings"), names.len() - 1);
    }

    #[test]
    fn test_firewall_range_from_config() {
        let cfg = config().with_client_range("10.0.0.1", "10.0.0.8");
        let steps = default_steps(&cfg);
        match &steps[0].action {
            StepAction::AllowClientFirewall { start, end } => {
                assert_eq!(start, "10.0.0.1");
                assert_eq!(end, "10.0.0.8");
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_ai_settings_step_skippable_without_gen_ai_outputs() {
        let steps = default_steps(&config());
        let ai = steps.last().unwrap();
        let outputs = core_outputs();

        assert!(ai.missing_required(&outputs).is_none());
        let missing = ai.missing_skippable(&outputs);
        assert_eq!(
            missing,
            vec![
                keys::OPENAI_ENDPOINT.to_string(),
                keys::OPENAI_DEPLOYMENT_NAME.to_string(),
            ]
        );
    }

    #[test]
    fn test_ai_settings_step_runs_with_gen_ai_outputs() {
        let steps = default_steps(&config());
        let ai = steps.last().unwrap();
        let mut outputs = core_outputs();
        outputs.insert(keys::OPENAI_ENDPOINT, json!("https://oai.example"));
        outputs.insert(keys::OPENAI_DEPLOYMENT_NAME, json!("gpt"));

        assert!(ai.missing_skippable(&outputs).is_empty());
    }

    #[test]
    fn test_missing_required_detected() {
        let steps = default_steps(&config());
        let principal = &steps[2];

        let mut outputs = DeploymentOutputs::new();
        outputs.insert(keys::SQL_SERVER_NAME, json!("srv1"));
        outputs.insert(keys::SQL_DATABASE_NAME, json!("db1"));
        assert_eq!(
            principal.missing_required(&outputs),
            Some(keys::MANAGED_IDENTITY_NAME)
        );

        assert!(principal.missing_required(&core_outputs()).is_none());
    }

    #[test]
    fn test_audiences() {
        let steps = default_steps(&config());
        assert_eq!(steps[0].action.audience(), Some(audiences::MANAGEMENT));
        assert_eq!(steps[1].action.audience(), None);
        assert_eq!(steps[2].action.audience(), Some(audiences::DATA_STORE));
        assert_eq!(
            steps.last().unwrap().action.audience(),
            Some(audiences::MANAGEMENT)
        );
    }

    #[test]
    fn test_database_role_names() {
        assert_eq!(DatabaseRole::Reader.as_str(), "db_datareader");
        assert_eq!(DatabaseRole::Writer.as_str(), "db_datawriter");
        assert_eq!(DatabaseRole::Execute.as_str(), "execute");
    }

    #[test]
    fn test_step_result_serialization() {
        let result = StepResult {
            step: "apply_schema".into(),
            status: StepStatus::Skipped {
                missing: vec!["openAIEndpoint".into()],
            },
            attempts: 0,
        };
        let json = serde_json::to_string(&result).unwrap();
        let restored: StepResult = serde_json::from_str(&json).unwrap();
        assert!(restored.skipped());
        assert_eq!(restored.step, "apply_schema");
    }
}
