//! Domain models for the command gate module.

use std::collections::HashSet;

use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map, Value};

/// Reason code attached to every decision.
///
/// Intended for logs only. Callers must not vary their response by reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The hosting environment vouched for the trigger (cron or scheduler).
    TrustedEnvironment,
    /// A signed identity token for an allow-listed principal was presented.
    ValidSignedToken,
    /// An access token holding at least one required permission was presented.
    ValidOpaqueToken,
    /// Anything else.
    Denied,
}

/// The verdict for a single request.
///
/// `allowed` is true exactly when `reason` is not [`DecisionReason::Denied`];
/// the constructors are the only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    allowed: bool,
    reason: DecisionReason,
}

impl AuthorizationDecision {
    #[must_use]
    pub const fn trusted_environment() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::TrustedEnvironment,
        }
    }

    #[must_use]
    pub const fn valid_signed_token() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::ValidSignedToken,
        }
    }

    #[must_use]
    pub const fn valid_opaque_token() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::ValidOpaqueToken,
        }
    }

    #[must_use]
    pub const fn deny() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::Denied,
        }
    }

    #[must_use]
    pub const fn is_allowed(self) -> bool {
        self.allowed
    }

    #[must_use]
    pub const fn reason(self) -> DecisionReason {
        self.reason
    }
}

impl Default for AuthorizationDecision {
    fn default() -> Self {
        Self::deny()
    }
}

/// Claims extracted from a verified signed identity token.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims {
    principal_email: String,
    issued_at: Option<u64>,
    expires_at: u64,
    raw: Map<String, Value>,
}

impl IdentityClaims {
    #[must_use]
    pub fn new(
        principal_email: String,
        issued_at: Option<u64>,
        expires_at: u64,
        raw: Map<String, Value>,
    ) -> Self {
        Self {
            principal_email,
            issued_at,
            expires_at,
            raw,
        }
    }

    /// The `email` claim the token asserted.
    #[must_use]
    pub fn principal_email(&self) -> &str {
        &self.principal_email
    }

    /// `iat`, in unix seconds.
    #[must_use]
    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    /// `exp`, in unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Look up any claim from the decoded payload.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

/// Everything the gate needs to know about one request.
///
/// Built once per request by the transport adapter and dropped after the
/// decision. The credential is a `SecretString` so `Debug` redacts it.
#[derive(Debug, Clone, Default)]
pub struct TrustContext {
    hosting_environment_active: bool,
    source_address: Option<String>,
    header_presence: HashSet<String>,
    credential: Option<SecretString>,
}

impl TrustContext {
    #[must_use]
    pub fn builder() -> TrustContextBuilder {
        TrustContextBuilder::default()
    }

    #[must_use]
    pub fn hosting_environment_active(&self) -> bool {
        self.hosting_environment_active
    }

    #[must_use]
    pub fn source_address(&self) -> Option<&str> {
        self.source_address.as_deref()
    }

    /// Whether a header was present on the request. Names are matched
    /// case-insensitively.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header_presence.contains(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn credential(&self) -> Option<&SecretString> {
        self.credential.as_ref()
    }
}

#[derive(Default)]
pub struct TrustContextBuilder {
    hosting_environment_active: bool,
    source_address: Option<String>,
    header_presence: HashSet<String>,
    credential: Option<SecretString>,
}

impl TrustContextBuilder {
    #[must_use]
    pub fn hosting_environment_active(mut self, active: bool) -> Self {
        self.hosting_environment_active = active;
        self
    }

    #[must_use]
    pub fn source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str) -> Self {
        self.header_presence.insert(name.to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn credential(mut self, credential: impl Into<SecretString>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    #[must_use]
    pub fn build(self) -> TrustContext {
        TrustContext {
            hosting_environment_active: self.hosting_environment_active,
            source_address: self.source_address,
            header_presence: self.header_presence,
            credential: self.credential,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn default_decision_is_denied() {
        let decision = AuthorizationDecision::default();
        assert!(!decision.is_allowed());
        assert_eq!(decision.reason(), DecisionReason::Denied);
    }

    #[test]
    fn allowing_constructors_carry_their_reason() {
        assert_eq!(
            AuthorizationDecision::trusted_environment().reason(),
            DecisionReason::TrustedEnvironment
        );
        assert!(AuthorizationDecision::valid_signed_token().is_allowed());
        assert!(AuthorizationDecision::valid_opaque_token().is_allowed());
    }

    #[test]
    fn header_presence_is_case_insensitive() {
        let ctx = TrustContext::builder().header("X-AppEngine-Cron").build();
        assert!(ctx.has_header("x-appengine-cron"));
        assert!(ctx.has_header("X-APPENGINE-CRON"));
        assert!(!ctx.has_header("x-cloudscheduler"));
    }

    #[test]
    fn credential_is_redacted_in_debug() {
        let ctx = TrustContext::builder().credential("top-secret".to_owned()).build();
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("top-secret"));
        assert_eq!(
            ctx.credential().map(ExposeSecret::expose_secret),
            Some("top-secret")
        );
    }
}
