//! Typed access to deployment outputs.
//!
//! Outputs exist only after Phase-1 succeeds and are read-only from then
//! on. Keys owned by optional modules are present only when the module was
//! included — consumers must branch on presence, never assume.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Output keys produced by the default graph.
pub mod keys {
    pub const SQL_SERVER_NAME: &str = "sqlServerName";
    pub const SQL_DATABASE_NAME: &str = "sqlDatabaseName";
    pub const MANAGED_IDENTITY_NAME: &str = "managedIdentityName";
    pub const MANAGED_IDENTITY_CLIENT_ID: &str = "managedIdentityClientId";
    pub const APP_SERVICE_NAME: &str = "appServiceName";

    // Present only when the GenAI module was deployed.
    pub const OPENAI_ENDPOINT: &str = "openAIEndpoint";
    pub const OPENAI_DEPLOYMENT_NAME: &str = "openAIDeploymentName";

    // Present only when the search module was deployed.
    pub const SEARCH_ENDPOINT: &str = "searchEndpoint";
}

/// Named outputs captured from a successful Phase-1 run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentOutputs(BTreeMap<String, Value>);

impl DeploymentOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Look up a key the caller requires.
    ///
    /// Absence is a `MissingOutput` error — a defect in the graph or the
    /// step definition, not something a retry fixes.
    pub fn get(&self, key: &str) -> Result<&Value, ProvisionError> {
        self.0
            .get(key)
            .ok_or_else(|| ProvisionError::MissingOutput(key.to_string()))
    }

    /// Look up a key the caller declared optional. Explicit present/absent.
    pub fn get_optional(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Required string-valued output.
    pub fn get_str(&self, key: &str) -> Result<&str, ProvisionError> {
        self.get(key)?.as_str().ok_or_else(|| {
            ProvisionError::MissingOutput(format!("{} is not a string", key))
        })
    }

    /// Optional string-valued output.
    pub fn get_optional_str(&self, key: &str) -> Option<&str> {
        self.get_optional(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for DeploymentOutputs {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
