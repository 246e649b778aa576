//! Configuration for the command gate.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::domain::key_set::MAX_KEY_SET_TTL;

/// Prefix for environment overrides, e.g. `COMMAND_GATE__PROJECT_ID`.
pub const ENV_PREFIX: &str = "COMMAND_GATE__";

/// Conventional project variable, used when `project_id` is not configured.
pub const PROJECT_ENV_VAR: &str = "GOOGLE_CLOUD_PROJECT";

fn default_authorization_header_name() -> String {
    "Authorization".to_owned()
}

fn default_required_permissions() -> Vec<String> {
    vec![
        "cloudscheduler.jobs.run".to_owned(),
        "appengine.runtimes.actAsAdmin".to_owned(),
    ]
}

fn default_jwks_uri() -> String {
    "https://www.googleapis.com/oauth2/v3/certs".to_owned()
}

fn default_resource_manager_endpoint() -> String {
    "https://cloudresourcemanager.googleapis.com".to_owned()
}

/// Command gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandGateConfig {
    /// Header carrying the credential. `Authorization` enables bearer-scheme parsing.
    pub authorization_header_name: String,

    /// Emails allowed to call with a signed identity token.
    ///
    /// When empty and `project_id` is set, the project's App Engine default
    /// service account is allowed.
    pub authorized_principals: Vec<String>,

    /// Permissions queried during access token introspection. Holding any one suffices.
    pub required_permissions: Vec<String>,

    /// Cloud project whose IAM policy is introspected.
    pub project_id: Option<String>,

    /// Remote JSON Web Key Set used for signed tokens.
    pub jwks_uri: String,

    /// Base URL of the resource manager API.
    pub resource_manager_endpoint: String,

    /// If set, signed tokens must carry this `aud`.
    pub expected_audience: Option<String>,

    /// If non-empty, signed tokens must carry one of these `iss` values.
    pub expected_issuers: Vec<String>,

    /// Key set lifetime when the endpoint sends no `Cache-Control: max-age`.
    pub jwks_cache_ttl_secs: u64,

    /// Per-call timeout for outbound HTTP.
    pub http_timeout_ms: u64,

    /// Upper bound for a whole decision; exceeding it denies.
    pub decision_timeout_ms: u64,

    /// Trigger signals honoured inside the hosting environment.
    pub environment: EnvironmentTrustConfig,
}

impl Default for CommandGateConfig {
    fn default() -> Self {
        Self {
            authorization_header_name: default_authorization_header_name(),
            authorized_principals: Vec::new(),
            required_permissions: default_required_permissions(),
            project_id: None,
            jwks_uri: default_jwks_uri(),
            resource_manager_endpoint: default_resource_manager_endpoint(),
            expected_audience: None,
            expected_issuers: Vec::new(),
            jwks_cache_ttl_secs: 300,
            http_timeout_ms: 5_000,
            decision_timeout_ms: 10_000,
            environment: EnvironmentTrustConfig::default(),
        }
    }
}

impl CommandGateConfig {
    /// Load configuration from defaults, an optional YAML file and the environment.
    ///
    /// Later sources win: defaults, then the file, then `GOOGLE_CLOUD_PROJECT`
    /// (as `project_id`), then `COMMAND_GATE__*` variables (`__` separates
    /// nested keys).
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let cfg: Self = figment
            .merge(Env::raw().only(&[PROJECT_ENV_VAR]).map(|_| "project_id".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load command gate configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that could never authorize anything sensibly.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.authorization_header_name.trim().is_empty() {
            anyhow::bail!("authorization_header_name must not be empty");
        }
        if self.required_permissions.is_empty() {
            anyhow::bail!("required_permissions must list at least one permission");
        }
        if self.jwks_cache_ttl() > MAX_KEY_SET_TTL {
            anyhow::bail!(
                "jwks_cache_ttl_secs must not exceed {}",
                MAX_KEY_SET_TTL.as_secs()
            );
        }
        if self.decision_timeout_ms == 0 {
            anyhow::bail!("decision_timeout_ms must be greater than zero");
        }
        if self.environment.scheduler_headers.is_empty() {
            anyhow::bail!("environment.scheduler_headers must not be empty");
        }
        Ok(())
    }

    /// Principals allowed for signed tokens, after applying the project default.
    #[must_use]
    pub fn effective_principals(&self) -> HashSet<String> {
        if !self.authorized_principals.is_empty() {
            return self.authorized_principals.iter().cloned().collect();
        }
        self.project_id
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{p}@appspot.gserviceaccount.com"))
            .collect()
    }

    #[must_use]
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    #[must_use]
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

/// Header and address signals for platform triggers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentTrustConfig {
    /// Header set on cron-triggered requests.
    pub cron_header: String,

    /// Header carrying the caller address the platform reports.
    pub source_address_header: String,

    /// Addresses cron requests originate from.
    pub cron_source_addresses: Vec<String>,

    /// Headers that must all be present on scheduler-triggered requests.
    pub scheduler_headers: Vec<String>,

    /// Use the TCP peer address when `source_address_header` is absent.
    /// Off unless the service is reached without the platform front end.
    pub trust_peer_address: bool,
}

impl Default for EnvironmentTrustConfig {
    fn default() -> Self {
        Self {
            cron_header: "x-appengine-cron".to_owned(),
            source_address_header: "x-appengine-user-ip".to_owned(),
            cron_source_addresses: vec![
                "0.1.0.2".to_owned(),
                // gcloud older than 326.0.0
                "0.1.0.1".to_owned(),
            ],
            scheduler_headers: vec![
                "x-cloudscheduler".to_owned(),
                "x-google-internal-skipadmincheck".to_owned(),
            ],
            trust_peer_address: false,
        }
    }
}

/// Whether this process runs inside the managed hosting environment.
///
/// Read once at process start and passed down explicitly; verification
/// code never consults the environment itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostingEnvironment {
    active: bool,
}

impl HostingEnvironment {
    /// Variable the platform sets on every instance it runs.
    pub const SIGNAL_VAR: &'static str = "GAE_SERVICE";

    #[must_use]
    pub fn from_env() -> Self {
        let active = std::env::var(Self::SIGNAL_VAR).is_ok_and(|v| !v.trim().is_empty());
        Self { active }
    }

    #[must_use]
    pub const fn active() -> Self {
        Self { active: true }
    }

    #[must_use]
    pub const fn inactive() -> Self {
        Self { active: false }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        self.active
    }
}
