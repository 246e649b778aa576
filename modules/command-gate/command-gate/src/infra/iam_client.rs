//! HTTP client for the resource manager `testIamPermissions` call.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::AuthorizationError;
use crate::domain::opaque_token::PermissionIntrospector;

#[derive(Serialize)]
struct TestPermissionsRequest<'a> {
    permissions: &'a [String],
}

#[derive(Deserialize)]
struct TestPermissionsResponse {
    #[serde(default)]
    permissions: Vec<String>,
}

/// Asks the resource manager which of the requested permissions the token's
/// principal holds on the configured project.
pub struct HttpPermissionIntrospector {
    client: reqwest::Client,
    endpoint: String,
    project_id: Option<String>,
}

impl HttpPermissionIntrospector {
    /// `endpoint` is the API base URL, without the `/v3/projects` path.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        project_id: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            project_id: project_id.filter(|p| !p.trim().is_empty()),
        }
    }

    fn url(&self, project_id: &str) -> String {
        format!(
            "{}/v3/projects/{project_id}:testIamPermissions",
            self.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PermissionIntrospector for HttpPermissionIntrospector {
    async fn granted_permissions(
        &self,
        token: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, AuthorizationError> {
        let Some(project_id) = self.project_id.as_deref() else {
            return Err(AuthorizationError::introspection_unreachable(
                "no project configured",
            ));
        };

        let response = self
            .client
            .post(self.url(project_id))
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .json(&TestPermissionsRequest { permissions })
            .send()
            .await
            .map_err(|e| {
                AuthorizationError::introspection_unreachable(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthorizationError::introspection_unreachable(format!(
                "endpoint returned status {status}"
            )));
        }
        if !status.is_success() {
            return Err(AuthorizationError::introspection_denied(format!(
                "endpoint returned status {status}"
            )));
        }

        let body: TestPermissionsResponse = response.json().await.map_err(|e| {
            AuthorizationError::introspection_denied(format!("unreadable response: {e}"))
        })?;
        debug!(
            granted = body.permissions.len(),
            project_id,
            "Permission introspection answered"
        );
        Ok(body.permissions)
    }
}
