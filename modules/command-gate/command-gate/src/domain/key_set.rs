//! Verification key set and its cache.

use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use tracing::{debug, info};

use super::AuthorizationError;

/// Upper bound on how long a fetched key set is trusted, whatever the
/// endpoint advertises.
pub const MAX_KEY_SET_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Keys as returned by one fetch, before a lifetime is assigned.
pub struct FetchedKeySet {
    pub keys: HashMap<String, DecodingKey>,
    /// Lifetime advertised by the endpoint, if any.
    pub max_age: Option<Duration>,
}

impl fmt::Debug for FetchedKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("FetchedKeySet")
            .field("kids", &kids)
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Source of the remote JSON Web Key Set.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetch and decode the key set. No retries.
    ///
    /// # Errors
    ///
    /// `KeySetUnavailable` if the endpoint is unreachable, answers with a
    /// non-success status, or returns no usable key.
    async fn fetch(&self) -> Result<FetchedKeySet, AuthorizationError>;
}

/// Immutable, time-bounded mapping from key id to verification key.
pub struct KeySet {
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
    expires_at: Instant,
}

impl KeySet {
    /// Build a set that expires after `ttl`, capped at [`MAX_KEY_SET_TTL`].
    #[must_use]
    pub fn new<S: BuildHasher>(keys: HashMap<String, DecodingKey, S>, ttl: Duration) -> Self {
        let fetched_at = Instant::now();
        // An unrepresentable expiry leaves the set already expired.
        let expires_at = fetched_at
            .checked_add(ttl.min(MAX_KEY_SET_TTL))
            .unwrap_or(fetched_at);
        Self {
            keys: keys.into_iter().map(|(kid, k)| (kid, Arc::new(k))).collect(),
            fetched_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys.get(kid).cloned()
    }

    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("KeySet")
            .field("kids", &kids)
            .field("fetched_at", &self.fetched_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Whether [`KeySetCache::current`] had to go to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Cached,
    Fetched,
}

/// Shared key set cache.
///
/// Readers load the current set without locking. Fetches are serialized so
/// concurrent misses coalesce; a completed fetch replaces the whole set at
/// once, so readers see either the old or the new set, never a mix.
pub struct KeySetCache {
    fetcher: Arc<dyn KeySetFetcher>,
    default_ttl: Duration,
    current: ArcSwapOption<KeySet>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl KeySetCache {
    #[must_use]
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, default_ttl: Duration) -> Self {
        Self {
            fetcher,
            default_ttl,
            current: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Return a non-expired key set, fetching one if needed.
    ///
    /// # Errors
    ///
    /// `KeySetUnavailable` if a fetch was needed and failed.
    pub async fn current(&self) -> Result<(Arc<KeySet>, Freshness), AuthorizationError> {
        if let Some(set) = self.load_unexpired() {
            return Ok((set, Freshness::Cached));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have fetched while we waited for the lock.
        if let Some(set) = self.load_unexpired() {
            return Ok((set, Freshness::Cached));
        }
        let set = self.fetch_and_store().await?;
        Ok((set, Freshness::Fetched))
    }

    /// Replace `seen` with a freshly fetched set.
    ///
    /// If another caller already replaced `seen`, its result is returned
    /// instead of fetching again.
    ///
    /// # Errors
    ///
    /// `KeySetUnavailable` if the fetch failed. The cached set is kept.
    pub async fn refresh_after(
        &self,
        seen: &Arc<KeySet>,
    ) -> Result<Arc<KeySet>, AuthorizationError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(set) = self.current.load_full()
            && !Arc::ptr_eq(&set, seen)
            && !set.is_expired(Instant::now())
        {
            debug!("key set already refreshed by a concurrent caller");
            return Ok(set);
        }
        self.fetch_and_store().await
    }

    /// Force a fetch regardless of what is cached.
    ///
    /// # Errors
    ///
    /// `KeySetUnavailable` if the fetch failed. The cached set is kept.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, AuthorizationError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Drop the cached set; the next call fetches.
    pub fn invalidate(&self) {
        self.current.store(None);
    }

    fn load_unexpired(&self) -> Option<Arc<KeySet>> {
        self.current
            .load_full()
            .filter(|set| !set.is_expired(Instant::now()))
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeySet>, AuthorizationError> {
        let fetched = self.fetcher.fetch().await?;
        let ttl = fetched
            .max_age
            .unwrap_or(self.default_ttl)
            .min(MAX_KEY_SET_TTL);
        let set = Arc::new(KeySet::new(fetched.keys, ttl));
        info!(
            key_count = set.len(),
            ttl_secs = ttl.as_secs(),
            "Verification key set refreshed"
        );
        self.current.store(Some(Arc::clone(&set)));
        Ok(set)
    }
}
