//! Opaque access token verification via permission introspection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::AuthorizationError;

/// Asks the authorization server which permissions a token's principal holds.
#[async_trait]
pub trait PermissionIntrospector: Send + Sync {
    /// Return the subset of `permissions` granted to the bearer of `token`.
    ///
    /// # Errors
    ///
    /// - `IntrospectionUnreachable` on network failure or timeout
    /// - `IntrospectionDenied` on a rejecting status or unreadable answer
    async fn granted_permissions(
        &self,
        token: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, AuthorizationError>;
}

/// Grants access when the token holds at least one required permission.
pub struct OpaqueTokenVerifier {
    introspector: Arc<dyn PermissionIntrospector>,
    required_permissions: Vec<String>,
}

impl OpaqueTokenVerifier {
    #[must_use]
    pub fn new(
        introspector: Arc<dyn PermissionIntrospector>,
        required_permissions: Vec<String>,
    ) -> Self {
        Self {
            introspector,
            required_permissions,
        }
    }

    /// Return the required permissions the token actually holds.
    ///
    /// Permissions the server reports but that were never asked for are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `IntrospectionDenied` if none of the required permissions is held
    /// - any error from the introspector
    pub async fn verify(&self, raw: &str) -> Result<Vec<String>, AuthorizationError> {
        if self.required_permissions.is_empty() {
            return Err(AuthorizationError::introspection_denied(
                "no required permissions configured",
            ));
        }

        let granted = self
            .introspector
            .granted_permissions(raw, &self.required_permissions)
            .await?;

        let held: Vec<String> = granted
            .into_iter()
            .filter(|p| self.required_permissions.contains(p))
            .collect();

        if held.is_empty() {
            return Err(AuthorizationError::introspection_denied(
                "token holds none of the required permissions",
            ));
        }

        debug!(permissions = ?held, "Access token verified");
        Ok(held)
    }

    /// Boolean form of [`Self::verify`]; every error is `false`.
    pub async fn is_authorized(&self, raw: &str) -> bool {
        match self.verify(raw).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, kind = e.kind(), "Access token rejected");
                false
            }
        }
    }
}
