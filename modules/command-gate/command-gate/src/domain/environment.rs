//! Environment trust: platform triggers that need no token.
//!
//! The trigger headers are only meaningful inside the hosting environment,
//! where the platform strips them from external traffic. Outside it they are
//! spoofable, so nothing here is evaluated without the hosting signal.

use std::collections::HashSet;

use command_gate_sdk::TrustContext;
use tracing::debug;

use super::AuthorizationError;
use crate::config::EnvironmentTrustConfig;

/// Which platform trigger vouched for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedTrigger {
    /// Cron header plus an allow-listed source address.
    Cron,
    /// Both scheduler headers present. Weaker than `Cron`: no address check.
    Scheduler,
}

pub struct EnvironmentTrustEvaluator {
    cron_header: String,
    cron_source_addresses: HashSet<String>,
    scheduler_headers: Vec<String>,
}

impl EnvironmentTrustEvaluator {
    #[must_use]
    pub fn from_config(cfg: &EnvironmentTrustConfig) -> Self {
        Self {
            cron_header: cfg.cron_header.to_ascii_lowercase(),
            cron_source_addresses: cfg.cron_source_addresses.iter().cloned().collect(),
            scheduler_headers: cfg
                .scheduler_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Headers whose presence this evaluator inspects.
    pub fn signal_headers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cron_header.as_str())
            .chain(self.scheduler_headers.iter().map(String::as_str))
    }

    /// Decide whether the hosting environment vouches for the request.
    ///
    /// # Errors
    ///
    /// - `EnvironmentSignalAbsent` outside the hosting environment, whatever the headers say
    /// - `UntrustedTrigger` inside it when neither trigger shape matches
    pub fn evaluate(&self, ctx: &TrustContext) -> Result<TrustedTrigger, AuthorizationError> {
        if !ctx.hosting_environment_active() {
            return Err(AuthorizationError::EnvironmentSignalAbsent);
        }

        if ctx.has_header(&self.cron_header) {
            let address = ctx.source_address().map(str::trim);
            if address.is_some_and(|a| self.cron_source_addresses.contains(a)) {
                return Ok(TrustedTrigger::Cron);
            }
            debug!(
                source_address = address.unwrap_or("<none>"),
                "Cron header from an address outside the allow-list"
            );
        }

        if !self.scheduler_headers.is_empty()
            && self.scheduler_headers.iter().all(|h| ctx.has_header(h))
        {
            return Ok(TrustedTrigger::Scheduler);
        }

        Err(AuthorizationError::UntrustedTrigger)
    }

    /// Boolean form of [`Self::evaluate`].
    #[must_use]
    pub fn is_trusted(&self, ctx: &TrustContext) -> bool {
        self.evaluate(ctx).is_ok()
    }
}
