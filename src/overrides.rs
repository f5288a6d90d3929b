//! Feature override resolution.
//!
//! Merges tier-default feature availability with platform- and
//! tenant-scoped override rows. Precedence, highest to lowest:
//!
//! 1. Platform kill-switch: `enabled = false, allow_tenant_override =
//!    false` blocks the feature for everyone, tenant rows included.
//! 2. Tenant-scope row, when the platform row permits tenant overrides.
//! 3. The platform row's own `enabled` value.
//! 4. No platform row at all: tier-catalog membership. A tenant-scope row
//!    without a platform row is ignored, otherwise every forgotten
//!    platform row would turn into an accidental entitlement grant.
//!
//! Resolution is evaluated fresh per call and performs no writes. A
//! missing feature is `allowed = false`, never an error.

use serde::{Deserialize, Serialize};

use crate::error::{EntitlementError, Result};
use crate::storage::{PolicyStore, TenantSubscription};
use crate::tiers::TierCatalog;

/// Where a feature decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Tier-catalog membership.
    Tier,
    /// A platform- or tenant-scope override row.
    Override,
}

/// The outcome of resolving one feature for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDecision {
    /// Whether the feature is available.
    pub allowed: bool,
    /// What decided it.
    pub source: DecisionSource,
    /// The override row's justification, when an override decided.
    pub override_reason: Option<String>,
}

impl FeatureDecision {
    fn from_tier(allowed: bool) -> Self {
        Self {
            allowed,
            source: DecisionSource::Tier,
            override_reason: None,
        }
    }

    fn from_override(allowed: bool, reason: Option<String>) -> Self {
        Self {
            allowed,
            source: DecisionSource::Override,
            override_reason: reason,
        }
    }
}

/// Resolves effective feature availability for tenants.
pub struct OverrideResolver<S: PolicyStore> {
    store: S,
    catalog: TierCatalog,
}

impl<S: PolicyStore> OverrideResolver<S> {
    /// Create a new resolver.
    #[must_use]
    pub fn new(store: S, catalog: TierCatalog) -> Self {
        Self { store, catalog }
    }

    /// Resolve a feature for a tenant by id.
    ///
    /// A missing tenant is [`EntitlementError::TenantNotFound`].
    pub async fn resolve_feature(&self, tenant_id: &str, feature: &str) -> Result<FeatureDecision> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| EntitlementError::TenantNotFound(tenant_id.to_string()))?;
        self.resolve_for(&tenant, feature).await
    }

    /// Resolve a feature for an already-loaded tenant record.
    pub async fn resolve_for(
        &self,
        tenant: &TenantSubscription,
        feature: &str,
    ) -> Result<FeatureDecision> {
        let platform = self.store.get_platform_override(feature).await?;

        match platform {
            Some(p) if !p.allow_tenant_override => {
                // Authoritative platform row. With enabled = false this is
                // the hard kill-switch; tenant rows cannot contradict it.
                Ok(FeatureDecision::from_override(p.enabled, p.reason))
            }
            Some(p) => {
                let tenant_row = self
                    .store
                    .get_tenant_override(&tenant.tenant_id, feature)
                    .await?;
                match tenant_row {
                    Some(t) => Ok(FeatureDecision::from_override(t.enabled, t.reason)),
                    None => Ok(FeatureDecision::from_override(p.enabled, p.reason)),
                }
            }
            None => {
                // No platform record: tier-catalog fallback. A stray
                // tenant row is ignored but logged so operators can find
                // orphaned overrides.
                if let Some(orphan) = self
                    .store
                    .get_tenant_override(&tenant.tenant_id, feature)
                    .await?
                {
                    tracing::debug!(
                        target: "shelfsight::overrides",
                        tenant_id = %tenant.tenant_id,
                        feature = %orphan.feature,
                        "Ignoring tenant override with no platform-scope record"
                    );
                }
                let definition = self.catalog.get(tenant.tier)?;
                Ok(FeatureDecision::from_tier(definition.has_feature(feature)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SubscriptionStatus;
    use crate::storage::test::InMemoryPolicyStore;
    use crate::storage::{FeatureOverride, OverrideScope};
    use crate::tiers::Tier;
    use chrono::Utc;

    fn seed_tenant(store: &InMemoryPolicyStore, id: &str, tier: Tier) {
        store.upsert_tenant(TenantSubscription {
            tenant_id: id.to_string(),
            tier,
            status: SubscriptionStatus::Active,
            trial_ends_at: None,
            subscription_ends_at: None,
            organization_id: None,
            frozen: false,
            updated_at: Utc::now(),
        });
    }

    fn platform(feature: &str, enabled: bool, allow_tenant: bool) -> FeatureOverride {
        FeatureOverride {
            scope: OverrideScope::Platform,
            feature: feature.to_string(),
            enabled,
            allow_tenant_override: allow_tenant,
            reason: Some("ops".to_string()),
        }
    }

    fn tenant_row(feature: &str, enabled: bool) -> FeatureOverride {
        FeatureOverride {
            scope: OverrideScope::Tenant,
            feature: feature.to_string(),
            enabled,
            allow_tenant_override: false,
            reason: Some("support ticket".to_string()),
        }
    }

    fn resolver(store: InMemoryPolicyStore) -> OverrideResolver<InMemoryPolicyStore> {
        OverrideResolver::new(store, TierCatalog::standard())
    }

    #[tokio::test]
    async fn test_tier_fallback_without_overrides() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_pro", Tier::Professional);
        let resolver = resolver(store);

        let decision = resolver
            .resolve_feature("t_pro", "gbp_integration")
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.source, DecisionSource::Tier);

        let decision = resolver
            .resolve_feature("t_pro", "bulk_export")
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.source, DecisionSource::Tier);
    }

    #[tokio::test]
    async fn test_missing_tenant_is_not_found() {
        let resolver = resolver(InMemoryPolicyStore::new());
        let err = resolver
            .resolve_feature("ghost", "api_access")
            .await
            .unwrap_err();
        assert!(matches!(err, EntitlementError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_feature_is_denied_not_error() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Enterprise);
        let resolver = resolver(store);

        let decision = resolver
            .resolve_feature("t_1", "no_such_feature")
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_platform_kill_switch_beats_tenant_override() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Enterprise);
        store.set_platform_override(platform("api_access", false, false));
        store.set_tenant_override("t_1", tenant_row("api_access", true));
        let resolver = resolver(store);

        let decision = resolver.resolve_feature("t_1", "api_access").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.source, DecisionSource::Override);
    }

    #[tokio::test]
    async fn test_tenant_override_reenables_when_permitted() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        store.set_platform_override(platform("advanced_analytics", false, true));
        store.set_tenant_override("t_1", tenant_row("advanced_analytics", true));
        let resolver = resolver(store);

        let decision = resolver
            .resolve_feature("t_1", "advanced_analytics")
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.source, DecisionSource::Override);
        assert_eq!(decision.override_reason.as_deref(), Some("support ticket"));
    }

    #[tokio::test]
    async fn test_platform_disabled_without_tenant_row_stays_disabled() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Enterprise);
        store.set_platform_override(platform("api_access", false, true));
        let resolver = resolver(store);

        let decision = resolver.resolve_feature("t_1", "api_access").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.source, DecisionSource::Override);
    }

    #[tokio::test]
    async fn test_tenant_override_ignored_without_platform_record() {
        // Product decision: absence of a platform record means tier
        // fallback, tenant rows notwithstanding.
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        store.set_tenant_override("t_1", tenant_row("api_access", true));
        let resolver = resolver(store);

        let decision = resolver.resolve_feature("t_1", "api_access").await.unwrap();
        assert!(!decision.allowed); // starter tier lacks api_access
        assert_eq!(decision.source, DecisionSource::Tier);
    }

    #[tokio::test]
    async fn test_platform_enable_grants_beyond_tier() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::GoogleOnly);
        store.set_platform_override(platform("square_sync", true, false));
        let resolver = resolver(store);

        let decision = resolver
            .resolve_feature("t_1", "square_sync")
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.source, DecisionSource::Override);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Professional);
        store.set_platform_override(platform("api_access", false, true));
        let resolver = resolver(store);

        let first = resolver.resolve_feature("t_1", "api_access").await.unwrap();
        let second = resolver.resolve_feature("t_1", "api_access").await.unwrap();
        assert_eq!(first, second);
    }
}
