//! TTL-cached wrapper over the entitlement gate.
//!
//! Caches the per-tenant [`EffectiveEntitlement`] snapshot to absorb
//! request bursts. Only the feature/entitlement picture is cached:
//! [`CachedEntitlementGate::evaluate`] always delegates to the inner gate,
//! since quantity checks depend on live usage counts and must not be
//! served stale.
//!
//! Staleness within the TTL is an accepted commercial tradeoff; call
//! [`CachedEntitlementGate::invalidate`] from tier-change and
//! override-change write paths to shrink the window to zero.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelfsight_entitlements::{CachedEntitlementGate, EntitlementGate};
//! use std::time::Duration;
//!
//! let inner = EntitlementGate::new(store, catalog, config);
//! let cached = CachedEntitlementGate::new(inner, Duration::from_secs(30));
//!
//! // First call hits storage
//! let entitlement = cached.get_effective("tenant_123").await?;
//!
//! // Second call within 30 seconds uses cache
//! let entitlement = cached.get_effective("tenant_123").await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::gate::{EffectiveEntitlement, EntitlementGate, Intent, Verdict};
use crate::storage::PolicyStore;

/// Default maximum cache entries.
const DEFAULT_MAX_CACHE_ENTRIES: usize = 10_000;

/// Cleanup interval (every N operations).
const CLEANUP_INTERVAL: u64 = 100;

struct EntitlementCache {
    entries: HashMap<String, CacheEntry>,
}

struct CacheEntry {
    entitlement: EffectiveEntitlement,
    expires_at: Instant,
    last_accessed: Instant,
}

/// A gate wrapper that caches effective entitlements per tenant.
pub struct CachedEntitlementGate<S: PolicyStore + Clone> {
    inner: EntitlementGate<S>,
    cache: Arc<RwLock<EntitlementCache>>,
    ttl: Duration,
    max_entries: usize,
    operation_counter: AtomicU64,
}

impl<S: PolicyStore + Clone> CachedEntitlementGate<S> {
    /// Create a new cached gate with the default entry cap of 10,000.
    #[must_use]
    pub fn new(inner: EntitlementGate<S>, ttl: Duration) -> Self {
        Self::with_max_entries(inner, ttl, DEFAULT_MAX_CACHE_ENTRIES)
    }

    /// Create a new cached gate with a custom entry cap.
    #[must_use]
    pub fn with_max_entries(inner: EntitlementGate<S>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(EntitlementCache {
                entries: HashMap::new(),
            })),
            ttl,
            max_entries,
            operation_counter: AtomicU64::new(0),
        }
    }

    /// Evaluate an intent. Always delegates to the inner gate: verdicts
    /// depend on live usage counts and lifecycle dates.
    pub async fn evaluate(&self, tenant_id: &str, intent: Intent) -> Result<Verdict> {
        self.inner.evaluate(tenant_id, intent).await
    }

    /// Get the effective entitlement, from cache when fresh.
    pub async fn get_effective(&self, tenant_id: &str) -> Result<EffectiveEntitlement> {
        self.maybe_cleanup();

        // Poisoned lock reads as a cache miss.
        if let Ok(mut cache) = self.cache.write() {
            if let Some(entry) = cache.entries.get_mut(tenant_id) {
                if entry.expires_at > Instant::now() {
                    entry.last_accessed = Instant::now();
                    return Ok(entry.entitlement.clone());
                }
            }
        }

        let entitlement = self.inner.effective_entitlement(tenant_id).await?;

        let now = Instant::now();
        if let Ok(mut cache) = self.cache.write() {
            cache.entries.insert(
                tenant_id.to_string(),
                CacheEntry {
                    entitlement: entitlement.clone(),
                    expires_at: now + self.ttl,
                    last_accessed: now,
                },
            );
        } else {
            tracing::warn!(
                target: "shelfsight::cache",
                "Entitlement cache lock poisoned, skipping cache update"
            );
        }

        Ok(entitlement)
    }

    /// Check if a feature is available (cached).
    pub async fn has_feature(&self, tenant_id: &str, feature: &str) -> Result<bool> {
        let entitlement = self.get_effective(tenant_id).await?;
        Ok(entitlement.has_feature(feature))
    }

    /// Invalidate the cached snapshot for one tenant.
    ///
    /// Call this from tier-change and override-change write paths.
    pub fn invalidate(&self, tenant_id: &str) {
        // If the lock is poisoned, the cache is in an unknown state anyway
        if let Ok(mut cache) = self.cache.write() {
            cache.entries.remove(tenant_id);
        } else {
            tracing::warn!(
                target: "shelfsight::cache",
                tenant_id = %tenant_id,
                "Entitlement cache lock poisoned during invalidate"
            );
        }
    }

    /// Clear all cached snapshots.
    pub fn clear(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.entries.clear(),
            Err(poisoned) => {
                tracing::warn!(
                    target: "shelfsight::cache",
                    "Entitlement cache lock poisoned, clearing and recovering"
                );
                poisoned.into_inner().entries.clear();
            }
        }
    }

    /// Get the number of cached entries.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.cache.read().map(|c| c.entries.len()).unwrap_or(0)
    }

    /// Remove expired entries from the cache.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        if let Ok(mut cache) = self.cache.write() {
            cache.entries.retain(|_, entry| entry.expires_at > now);
        }
    }

    /// Enforce the entry cap by evicting the least-recently-accessed
    /// entries. Runs automatically during periodic maintenance.
    pub fn enforce_max_entries(&self) {
        if let Ok(mut cache) = self.cache.write() {
            if cache.entries.len() <= self.max_entries {
                return;
            }

            let mut entries: Vec<_> = cache
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.last_accessed))
                .collect();
            entries.sort_by_key(|(_, accessed)| *accessed);

            let to_remove = cache.entries.len() - self.max_entries;
            for (key, _) in entries.into_iter().take(to_remove) {
                cache.entries.remove(&key);
            }
        }
    }

    fn maybe_cleanup(&self) {
        let count = self.operation_counter.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_INTERVAL == 0 {
            self.cleanup_expired();
            self.enforce_max_entries();
        }
    }
}
