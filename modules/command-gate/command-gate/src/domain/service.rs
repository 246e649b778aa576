//! Authorization orchestrator.
//!
//! Runs the trust checks in a fixed order and folds every failure into a
//! denied decision. Environment trust is tried first; only when it does not
//! vouch for the request is a credential looked at, and then exactly one
//! token path is taken depending on the credential's shape.

use std::sync::Arc;
use std::time::Duration;

use command_gate_sdk::{AuthorizationDecision, RequestSource, TrustContext};
use secrecy::ExposeSecret;
use tracing::debug;

use super::AuthorizationError;
use super::classifier::{TokenShape, classify};
use super::credential;
use super::environment::EnvironmentTrustEvaluator;
use super::key_set::KeySetCache;
use super::opaque_token::{OpaqueTokenVerifier, PermissionIntrospector};
use super::signed_token::SignedTokenVerifier;
use crate::config::CommandGateConfig;

/// Steps of a single decision, in the order they were visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Start,
    EnvCheck,
    ExtractCredential,
    Classify,
    VerifySigned,
    VerifyOpaque,
    Authorized,
    Denied,
}

/// Full record of one decision, for tests and debug logging.
#[derive(Debug, Clone)]
pub struct DecisionTrace {
    pub states: Vec<DecisionState>,
    pub decision: AuthorizationDecision,
    /// The failure that ended a denied decision.
    pub error: Option<AuthorizationError>,
}

impl DecisionTrace {
    #[must_use]
    pub fn visited(&self, state: DecisionState) -> bool {
        self.states.contains(&state)
    }
}

pub struct Service {
    environment: EnvironmentTrustEvaluator,
    signed: SignedTokenVerifier,
    opaque: OpaqueTokenVerifier,
    authorization_header: String,
    decision_timeout: Duration,
}

impl Service {
    #[must_use]
    pub fn new(
        cfg: &CommandGateConfig,
        keys: Arc<KeySetCache>,
        introspector: Arc<dyn PermissionIntrospector>,
    ) -> Self {
        Self {
            environment: EnvironmentTrustEvaluator::from_config(&cfg.environment),
            signed: SignedTokenVerifier::new(
                keys,
                cfg.effective_principals(),
                cfg.expected_audience.as_deref(),
                &cfg.expected_issuers,
            ),
            opaque: OpaqueTokenVerifier::new(introspector, cfg.required_permissions.clone()),
            authorization_header: cfg.authorization_header_name.clone(),
            decision_timeout: cfg.decision_timeout(),
        }
    }

    /// Snapshot the parts of `source` the decision looks at.
    #[must_use]
    pub fn capture(&self, source: &dyn RequestSource) -> TrustContext {
        credential::capture(
            source,
            &self.authorization_header,
            self.environment.signal_headers(),
        )
    }

    /// Decide on a live request.
    #[tracing::instrument(skip_all)]
    pub async fn authorize(&self, source: &dyn RequestSource) -> AuthorizationDecision {
        let ctx = self.capture(source);
        self.decide(&ctx).await
    }

    /// Decide on an already captured context.
    pub async fn decide(&self, ctx: &TrustContext) -> AuthorizationDecision {
        self.trace(ctx).await.decision
    }

    /// Decide and keep the record of how the decision was reached.
    pub async fn trace(&self, ctx: &TrustContext) -> DecisionTrace {
        let mut states = Vec::with_capacity(5);
        let outcome =
            tokio::time::timeout(self.decision_timeout, self.run(ctx, &mut states)).await;
        let result = outcome
            .unwrap_or_else(|_| Err(AuthorizationError::DecisionTimeout(self.decision_timeout)));

        match result {
            Ok(decision) => {
                states.push(DecisionState::Authorized);
                debug!(reason = ?decision.reason(), "Command request authorized");
                DecisionTrace {
                    states,
                    decision,
                    error: None,
                }
            }
            Err(e) => {
                states.push(DecisionState::Denied);
                debug!(kind = e.kind(), error = %e, "Command request denied");
                DecisionTrace {
                    states,
                    decision: AuthorizationDecision::deny(),
                    error: Some(e),
                }
            }
        }
    }

    async fn run(
        &self,
        ctx: &TrustContext,
        states: &mut Vec<DecisionState>,
    ) -> Result<AuthorizationDecision, AuthorizationError> {
        states.push(DecisionState::Start);

        states.push(DecisionState::EnvCheck);
        match self.environment.evaluate(ctx) {
            Ok(trigger) => {
                debug!(?trigger, "Hosting environment vouches for request");
                return Ok(AuthorizationDecision::trusted_environment());
            }
            Err(e) => debug!(kind = e.kind(), "No environment trust"),
        }

        states.push(DecisionState::ExtractCredential);
        let raw = ctx
            .credential()
            .map(ExposeSecret::expose_secret)
            .ok_or(AuthorizationError::CredentialMissing)?;

        states.push(DecisionState::Classify);
        match classify(raw) {
            TokenShape::Signed => {
                states.push(DecisionState::VerifySigned);
                self.signed.verify(raw).await?;
                Ok(AuthorizationDecision::valid_signed_token())
            }
            TokenShape::Opaque => {
                states.push(DecisionState::VerifyOpaque);
                self.opaque.verify(raw).await?;
                Ok(AuthorizationDecision::valid_opaque_token())
            }
        }
    }
}
