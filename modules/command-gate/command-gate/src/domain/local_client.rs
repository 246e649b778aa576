//! Local (in-process) client for the command gate.

use std::sync::Arc;

use async_trait::async_trait;
use command_gate_sdk::{AuthorizationDecision, CommandGateClient, CommandGateError, RequestSource};

use super::Service;

/// Local client wrapping the service.
///
/// Handed to the HTTP middleware by [`crate::CommandGate`].
pub struct CommandGateLocalClient {
    svc: Arc<Service>,
}

impl CommandGateLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl CommandGateClient for CommandGateLocalClient {
    async fn authorize(
        &self,
        source: &dyn RequestSource,
    ) -> Result<AuthorizationDecision, CommandGateError> {
        Ok(self.svc.authorize(source).await)
    }
}
