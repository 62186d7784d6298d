//! Deployment configuration — the named parameters and feature flags
//! a run is built from.
//!
//! Validation happens here, before any resource is touched. The backend
//! rejecting a bad name twenty minutes into a run is the failure mode
//! this module exists to prevent.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};

/// Maximum length of a generated resource name accepted by the backend.
/// `base_name` plus the longest module suffix must fit.
const MAX_RESOURCE_NAME_LEN: usize = 24;

/// Longest suffix appended by [`DeployConfig::resource_name`].
const MAX_SUFFIX_LEN: usize = 7; // "-search"

/// Input parameters for one deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Target region for all resources.
    pub location: String,
    /// Prefix for every generated resource name. Lowercase alphanumeric.
    pub base_name: String,
    /// Object id of the administrator principal.
    pub admin_object_id: String,
    /// Login name of the administrator principal.
    pub admin_login: String,
    /// Deploy the GenAI module (OpenAI account + model deployment).
    pub deploy_gen_ai: bool,
    /// Deploy the search service module.
    pub deploy_search: bool,
    /// Client address range to open on the data store's firewall.
    pub client_ip_start: String,
    /// End of the client address range.
    pub client_ip_end: String,
}

impl DeployConfig {
    /// Create a config with both optional modules disabled and a
    /// single-address firewall range.
    pub fn new(
        location: impl Into<String>,
        base_name: impl Into<String>,
        admin_object_id: impl Into<String>,
        admin_login: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            base_name: base_name.into(),
            admin_object_id: admin_object_id.into(),
            admin_login: admin_login.into(),
            deploy_gen_ai: false,
            deploy_search: false,
            client_ip_start: "0.0.0.0".to_string(),
            client_ip_end: "0.0.0.0".to_string(),
        }
    }

    /// Enable the GenAI module.
    pub fn with_gen_ai(mut self, enabled: bool) -> Self {
        self.deploy_gen_ai = enabled;
        self
    }

    /// Enable the search module.
    pub fn with_search(mut self, enabled: bool) -> Self {
        self.deploy_search = enabled;
        self
    }

    /// Set the client firewall range.
    pub fn with_client_range(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.client_ip_start = start.into();
        self.client_ip_end = end.into();
        self
    }

    /// Generated name for a resource of this deployment.
    ///
    /// Names are `{base_name}-{suffix}`, which keeps them unique per
    /// deployment and valid for the backend as long as `validate` passed.
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.base_name, suffix)
    }

    /// Fail-fast validation of all parameters.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.location.trim().is_empty() {
            return Err(ProvisionError::Configuration(
                "location must not be empty".into(),
            ));
        }
        if self.admin_object_id.trim().is_empty() {
            return Err(ProvisionError::Configuration(
                "adminObjectId must not be empty".into(),
            ));
        }
        if self.admin_login.trim().is_empty() {
            return Err(ProvisionError::Configuration(
                "adminLogin must not be empty".into(),
            ));
        }

        if self.base_name.len() < 3 {
            return Err(ProvisionError::Configuration(format!(
                "baseName '{}' too short: must be at least 3 characters",
                self.base_name
            )));
        }
        if self.base_name.len() + MAX_SUFFIX_LEN > MAX_RESOURCE_NAME_LEN {
            return Err(ProvisionError::Configuration(format!(
                "baseName '{}' too long: generated names would exceed {} characters",
                self.base_name, MAX_RESOURCE_NAME_LEN
            )));
        }
        if !self
            .base_name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ProvisionError::Configuration(format!(
                "baseName '{}' invalid: only lowercase letters and digits allowed",
                self.base_name
            )));
        }
        if !self.base_name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
            return Err(ProvisionError::Configuration(format!(
                "baseName '{}' invalid: must start with a letter",
                self.base_name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DeployConfig {
        DeployConfig::new("westeurope", "contosoapp", "00000-1111", "admin@contoso")
    }

    #[test]
    fn test_valid_config_passes() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn test_builder_flags() {
        let config = valid_config().with_gen_ai(true).with_search(true);
        assert!(config.deploy_gen_ai);
        assert!(config.deploy_search);
    }

    #[test]
    fn test_resource_name() {
        let config = valid_config();
        assert_eq!(config.resource_name("sql"), "contosoapp-sql");
        assert_eq!(config.resource_name("id"), "contosoapp-id");
    }

    #[test]
    fn test_empty_location_rejected() {
        let mut config = valid_config();
        config.location = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn test_empty_admin_fields_rejected() {
        let mut config = valid_config();
        config.admin_object_id = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.admin_login = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uppercase_base_name_rejected() {
        let mut config = valid_config();
        config.base_name = "ContosoApp".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn test_base_name_length_bounds() {
        let mut config = valid_config();
        config.base_name = "ab".into();
        assert!(config.validate().is_err());

        config.base_name = "a".repeat(18);
        assert!(config.validate().is_err());

        config.base_name = "a".repeat(17);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_name_must_start_with_letter() {
        let mut config = valid_config();
        config.base_name = "1contoso".into();
        assert!(config.validate().is_err());
    }
}
