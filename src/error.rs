//! Error types for the provisioning orchestrator.
//!
//! No `anyhow` leakage. Explicit, typed errors.

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("resource not ready: {0}")]
    ReadinessTimeout(String),

    #[error("wait cancelled")]
    Cancelled,

    #[error("missing deployment output: {0}")]
    MissingOutput(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("invalid run state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ProvisionError {
    /// Whether a step that hit this error may be retried.
    ///
    /// Only network-shaped failures qualify. Authorization denials and
    /// malformed input fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProvisionError::Query(_) | ProvisionError::Throttled(_)
        )
    }
}
