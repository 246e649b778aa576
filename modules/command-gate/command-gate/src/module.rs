//! Command gate wiring.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use command_gate_sdk::CommandGateClient;
use tracing::info;

use crate::api::rest::{CommandGateState, command_gate_middleware};
use crate::config::{CommandGateConfig, HostingEnvironment};
use crate::domain::key_set::{KeySetCache, KeySetFetcher};
use crate::domain::opaque_token::PermissionIntrospector;
use crate::domain::{CommandGateLocalClient, Service};
use crate::infra::{HttpKeySetFetcher, HttpPermissionIntrospector};

/// Command gate module.
///
/// Owns the key set cache and the orchestrator, and hands out the client and
/// the axum layer that consume them.
pub struct CommandGate {
    service: Arc<Service>,
    keys: Arc<KeySetCache>,
    client: Arc<dyn CommandGateClient>,
    state: CommandGateState,
}

impl CommandGate {
    /// Build the gate with HTTP clients for the key set and introspection
    /// endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    #[tracing::instrument(skip_all, fields(hosted = hosting.is_active()))]
    pub fn new(cfg: &CommandGateConfig, hosting: HostingEnvironment) -> anyhow::Result<Self> {
        cfg.validate()?;

        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .context("failed to build HTTP client for command gate")?;

        let fetcher = Arc::new(HttpKeySetFetcher::new(http.clone(), cfg.jwks_uri.clone()));
        let introspector = Arc::new(HttpPermissionIntrospector::new(
            http,
            cfg.resource_manager_endpoint.clone(),
            cfg.project_id.clone(),
        ));

        if cfg.project_id.is_none() {
            info!("No project configured; access tokens will be denied");
        }

        Ok(Self::with_components(cfg, hosting, fetcher, introspector))
    }

    /// Build the gate over caller-supplied remote collaborators.
    #[must_use]
    pub fn with_components(
        cfg: &CommandGateConfig,
        hosting: HostingEnvironment,
        fetcher: Arc<dyn KeySetFetcher>,
        introspector: Arc<dyn PermissionIntrospector>,
    ) -> Self {
        let keys = Arc::new(KeySetCache::new(fetcher, cfg.jwks_cache_ttl()));
        let service = Arc::new(Service::new(cfg, Arc::clone(&keys), introspector));
        let client: Arc<dyn CommandGateClient> =
            Arc::new(CommandGateLocalClient::new(Arc::clone(&service)));

        let state = CommandGateState {
            gate: Arc::clone(&client),
            hosting,
            source_address_header: Arc::from(cfg.environment.source_address_header.as_str()),
            trust_peer_address: cfg.environment.trust_peer_address,
        };

        info!(
            hosted = hosting.is_active(),
            authorization_header = %cfg.authorization_header_name,
            principals = cfg.effective_principals().len(),
            "Command gate initialized"
        );

        Self {
            service,
            keys,
            client,
            state,
        }
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn CommandGateClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn key_cache(&self) -> Arc<KeySetCache> {
        Arc::clone(&self.keys)
    }

    #[must_use]
    pub fn middleware_state(&self) -> CommandGateState {
        self.state.clone()
    }

    /// Put every route of `router` behind the gate.
    #[must_use]
    pub fn protect<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(
            self.middleware_state(),
            command_gate_middleware,
        ))
    }
}
