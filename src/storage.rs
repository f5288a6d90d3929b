//! Storage collaborator: the read-only data the engine evaluates over.
//!
//! Implement [`PolicyStore`] over your persistence layer. The engine only
//! specifies the shape of these reads, not how they are stored, and it
//! never writes through this trait. An in-memory implementation is
//! provided for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lifecycle::SubscriptionStatus;
use crate::tiers::Tier;

/// A tenant's subscription record.
///
/// Created at signup (trial), mutated by billing webhooks and admin
/// actions, read-only to this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSubscription {
    /// Tenant identifier.
    pub tenant_id: String,
    /// Subscribed tier.
    pub tier: Tier,
    /// Raw billing status.
    pub status: SubscriptionStatus,
    /// When the trial ends, if on trial.
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// When the paid subscription lapses, if scheduled.
    pub subscription_ends_at: Option<DateTime<Utc>>,
    /// Chain membership, if any.
    pub organization_id: Option<String>,
    /// Explicit freeze signal set by admin/billing tooling.
    pub frozen: bool,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TenantSubscription {
    /// Check if this tenant belongs to a chain.
    #[must_use]
    pub fn is_chain_member(&self) -> bool {
        self.organization_id.is_some()
    }
}

/// An organization (chain) grouping multiple tenants.
///
/// When a tenant belongs to an organization, the organization's pooled
/// limits replace the tenant's own tier limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: String,
    /// The organization's own tier.
    pub tier: Tier,
    /// Pooled location ceiling across all member tenants (`None` = unbounded).
    pub max_locations: Option<u64>,
    /// Pooled SKU ceiling across all member tenants (`None` = unbounded).
    pub max_total_skus: Option<u64>,
}

/// Scope of a feature override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideScope {
    /// Applies platform-wide.
    Platform,
    /// Applies to a single tenant.
    Tenant,
}

/// An exception to tier-default feature availability.
///
/// `allow_tenant_override` is meaningful only on platform-scope rows: a
/// tenant-scope override is eligible to apply only when the platform row
/// for the same feature permits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOverride {
    /// Scope of this row.
    pub scope: OverrideScope,
    /// Feature key.
    pub feature: String,
    /// Whether the feature is enabled by this row.
    pub enabled: bool,
    /// Platform-scope only: whether tenant-scope rows may contradict this one.
    pub allow_tenant_override: bool,
    /// Operator-facing justification.
    pub reason: Option<String>,
}

/// Current usage counts for a tenant or a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    /// SKUs currently held.
    pub skus: u64,
    /// Locations currently held.
    pub locations: u64,
}

/// Read-only data access for policy evaluation.
///
/// All reads for one evaluation may be batched by the backend; the
/// per-feature getters have default implementations over the list reads,
/// so a backend that can do indexed lookups should override them.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Get a tenant's subscription record.
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantSubscription>>;

    /// Get an organization record.
    async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>>;

    /// All platform-scope override rows.
    async fn list_platform_overrides(&self) -> Result<Vec<FeatureOverride>>;

    /// All tenant-scope override rows for one tenant.
    async fn list_tenant_overrides(&self, tenant_id: &str) -> Result<Vec<FeatureOverride>>;

    /// Platform-scope override for one feature, if present.
    ///
    /// Backends with an index on the feature key should override this.
    async fn get_platform_override(&self, feature: &str) -> Result<Option<FeatureOverride>> {
        Ok(self
            .list_platform_overrides()
            .await?
            .into_iter()
            .find(|o| o.feature == feature))
    }

    /// Tenant-scope override for one feature, if present.
    ///
    /// Backends with an index on (tenant, feature) should override this.
    async fn get_tenant_override(
        &self,
        tenant_id: &str,
        feature: &str,
    ) -> Result<Option<FeatureOverride>> {
        Ok(self
            .list_tenant_overrides(tenant_id)
            .await?
            .into_iter()
            .find(|o| o.feature == feature))
    }

    /// A single tenant's current usage counts.
    async fn get_usage(&self, tenant_id: &str) -> Result<UsageCounts>;

    /// Chain-wide usage: the sum across every tenant in the organization.
    async fn get_chain_usage(&self, org_id: &str) -> Result<UsageCounts>;
}

/// In-memory policy store for testing.
#[cfg(any(test, feature = "test-store"))]
pub mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    /// In-memory policy store for testing.
    ///
    /// Wraps data in `Arc` for cheap cloning.
    #[derive(Default, Clone)]
    pub struct InMemoryPolicyStore {
        inner: Arc<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        tenants: RwLock<HashMap<String, TenantSubscription>>,
        organizations: RwLock<HashMap<String, Organization>>,
        platform_overrides: RwLock<HashMap<String, FeatureOverride>>,
        tenant_overrides: RwLock<HashMap<String, HashMap<String, FeatureOverride>>>,
        usage: RwLock<HashMap<String, UsageCounts>>,
    }

    impl InMemoryPolicyStore {
        /// Create a new empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert or replace a tenant record.
        pub fn upsert_tenant(&self, tenant: TenantSubscription) {
            self.inner
                .tenants
                .write()
                .unwrap()
                .insert(tenant.tenant_id.clone(), tenant);
        }

        /// Insert or replace an organization record.
        pub fn upsert_organization(&self, org: Organization) {
            self.inner
                .organizations
                .write()
                .unwrap()
                .insert(org.id.clone(), org);
        }

        /// Set a platform-scope override row.
        pub fn set_platform_override(&self, ovr: FeatureOverride) {
            debug_assert_eq!(ovr.scope, OverrideScope::Platform);
            self.inner
                .platform_overrides
                .write()
                .unwrap()
                .insert(ovr.feature.clone(), ovr);
        }

        /// Set a tenant-scope override row.
        pub fn set_tenant_override(&self, tenant_id: &str, ovr: FeatureOverride) {
            debug_assert_eq!(ovr.scope, OverrideScope::Tenant);
            self.inner
                .tenant_overrides
                .write()
                .unwrap()
                .entry(tenant_id.to_string())
                .or_default()
                .insert(ovr.feature.clone(), ovr);
        }

        /// Set a tenant's usage counts.
        pub fn set_usage(&self, tenant_id: &str, usage: UsageCounts) {
            self.inner
                .usage
                .write()
                .unwrap()
                .insert(tenant_id.to_string(), usage);
        }
    }

    #[async_trait]
    impl PolicyStore for InMemoryPolicyStore {
        async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantSubscription>> {
            Ok(self.inner.tenants.read().unwrap().get(tenant_id).cloned())
        }

        async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>> {
            Ok(self
                .inner
                .organizations
                .read()
                .unwrap()
                .get(org_id)
                .cloned())
        }

        async fn list_platform_overrides(&self) -> Result<Vec<FeatureOverride>> {
            Ok(self
                .inner
                .platform_overrides
                .read()
                .unwrap()
                .values()
                .cloned()
                .collect())
        }

        async fn list_tenant_overrides(&self, tenant_id: &str) -> Result<Vec<FeatureOverride>> {
            Ok(self
                .inner
                .tenant_overrides
                .read()
                .unwrap()
                .get(tenant_id)
                .map(|rows| rows.values().cloned().collect())
                .unwrap_or_default())
        }

        async fn get_usage(&self, tenant_id: &str) -> Result<UsageCounts> {
            Ok(self
                .inner
                .usage
                .read()
                .unwrap()
                .get(tenant_id)
                .copied()
                .unwrap_or_default())
        }

        async fn get_chain_usage(&self, org_id: &str) -> Result<UsageCounts> {
            let tenants = self.inner.tenants.read().unwrap();
            let usage = self.inner.usage.read().unwrap();
            let mut total = UsageCounts::default();
            for tenant in tenants.values() {
                if tenant.organization_id.as_deref() == Some(org_id) {
                    if let Some(counts) = usage.get(&tenant.tenant_id) {
                        total.skus += counts.skus;
                        total.locations += counts.locations;
                    }
                }
            }
            Ok(total)
        }
    }
}
