//! Short-lived credential acquisition.
//!
//! Every administrative step authenticates with a token scoped to one
//! audience. Tokens are requested fresh per step, never logged, and never
//! persisted — the type is deliberately not serializable and its `Debug`
//! impl redacts the secret.

use crate::error::ProvisionError;
use std::fmt;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

/// Token audiences the default pipeline requests.
pub mod audiences {
    /// Data-store administrative plane (firewall, principals, schema).
    pub const DATA_STORE: &str = "https://database.local/";
    /// Service management plane (app settings).
    pub const MANAGEMENT: &str = "https://management.local/";
}

/// A scoped, short-lived access token.
#[derive(Clone)]
pub struct CredentialToken {
    audience: String,
    secret: String,
    /// Unix timestamp after which the token must not be used.
    expires_at: u64,
}

impl CredentialToken {
    pub fn new(
        audience: impl Into<String>,
        secret: impl Into<String>,
        expires_at: u64,
    ) -> Self {
        Self {
            audience: audience.into(),
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The token value. Callers pass this to the backend and nowhere else.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now >= self.expires_at
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialToken")
            .field("audience", &self.audience)
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues scoped tokens for administrative operations.
///
/// A denial surfaces as [`ProvisionError::Authentication`], which the step
/// retry policy treats as non-transient — repeated auth failures are not
/// something waiting fixes.
pub trait CredentialProvider: Send + Sync {
    fn acquire(
        &self,
        audience: &str,
    ) -> impl Future<Output = Result<CredentialToken, ProvisionError>> + Send;
}
