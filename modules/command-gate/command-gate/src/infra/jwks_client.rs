//! HTTP fetcher for the remote JSON Web Key Set.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use reqwest::header::{CACHE_CONTROL, HeaderMap};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::AuthorizationError;
use crate::domain::key_set::{FetchedKeySet, KeySetFetcher};

#[derive(Debug, Deserialize)]
struct JwkDocument {
    #[serde(default)]
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(rename = "use", default)]
    use_: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

impl Jwk {
    /// Key id and decoding key, if this entry can verify RS256 signatures.
    fn into_rs256_key(self) -> Option<(String, DecodingKey)> {
        if self.kty != "RSA" {
            debug!(kty = %self.kty, "Skipping non-RSA key");
            return None;
        }
        let kid = self.kid.filter(|kid| !kid.trim().is_empty())?;
        if self.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            debug!(kid = %kid, "Skipping key with non-RS256 alg");
            return None;
        }
        if self.use_.as_deref().is_some_and(|u| u != "sig") {
            debug!(kid = %kid, "Skipping non-signing key");
            return None;
        }
        let (Some(n), Some(e)) = (self.n, self.e) else {
            warn!(kid = %kid, "Skipping RSA key without modulus or exponent");
            return None;
        };
        match DecodingKey::from_rsa_components(&n, &e) {
            Ok(key) => Some((kid, key)),
            Err(err) => {
                warn!(kid = %kid, error = %err, "Skipping invalid RSA key");
                None
            }
        }
    }
}

/// Fetches the key set over HTTPS. One request per call, no retries.
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
    uri: String,
}

impl HttpKeySetFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, uri: impl Into<String>) -> Self {
        Self {
            client,
            uri: uri.into(),
        }
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self) -> Result<FetchedKeySet, AuthorizationError> {
        let response = self.client.get(&self.uri).send().await.map_err(|e| {
            AuthorizationError::key_set_unavailable(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthorizationError::key_set_unavailable(format!(
                "endpoint returned status {status}"
            )));
        }

        let max_age = max_age_from_headers(response.headers());
        let document: JwkDocument = response.json().await.map_err(|e| {
            AuthorizationError::key_set_unavailable(format!("invalid key set document: {e}"))
        })?;

        let keys: HashMap<String, DecodingKey> = document
            .keys
            .into_iter()
            .filter_map(Jwk::into_rs256_key)
            .collect();
        if keys.is_empty() {
            return Err(AuthorizationError::key_set_unavailable(
                "key set contains no usable RS256 key",
            ));
        }

        Ok(FetchedKeySet { keys, max_age })
    }
}

fn max_age_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_max_age)
        .map(Duration::from_secs)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}
