//! The entitlement gate: the single entry point request handlers call.
//!
//! Given a tenant id and an intent, the gate classifies the tenant's
//! lifecycle state, consults the override resolver for feature intents or
//! the limit enforcer for quantity intents, and returns one [`Verdict`]
//! carrying a stable reason code plus upgrade metadata.
//!
//! Platform-admin bypass is the caller's job: check the actor before
//! invoking the gate. Keeping actor identity out of the gate keeps every
//! evaluation a pure function of tenant data.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelfsight_entitlements::{
//!     EngineConfig, EntitlementGate, Intent, Resource, TierCatalog,
//! };
//!
//! # async fn example() -> shelfsight_entitlements::Result<()> {
//! let gate = EntitlementGate::new(store, TierCatalog::standard(), EngineConfig::default());
//!
//! let verdict = gate
//!     .evaluate("tenant_123", Intent::Mutate { resource: Resource::Sku, delta: 5 })
//!     .await?;
//! if !verdict.allowed {
//!     println!("denied: {}", verdict.message);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EntitlementError, Result};
use crate::lifecycle::{self, LifecycleState};
use crate::limits::{LimitCheck, LimitDenyReason, LimitEnforcer, Resource, TierChangeCheck};
use crate::overrides::{DecisionSource, OverrideResolver};
use crate::storage::{PolicyStore, TenantSubscription};
use crate::tiers::{Tier, TierCatalog};

/// What the caller wants to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Use a named feature.
    Feature {
        /// The feature key.
        name: String,
    },
    /// Change usage of a counted resource by `delta`.
    Mutate {
        /// Which resource.
        resource: Resource,
        /// Signed change; positive is growth.
        delta: i64,
    },
    /// Move the tenant to a different tier.
    ChangeTier {
        /// The prospective tier.
        proposed: Tier,
    },
}

/// Stable machine-readable denial reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasonCode {
    /// Subscription is canceled or expired.
    SubscriptionInactive,
    /// Growth blocked by the maintenance state.
    MaintenanceNoGrowth,
    /// Growth blocked by an explicit freeze.
    FrozenNoGrowth,
    /// The mutation would exceed the effective limit.
    LimitExceeded,
    /// The tier does not include the feature.
    FeatureNotInPlan,
    /// An override disabled the feature.
    FeatureDisabled,
    /// Current usage exceeds the proposed tier's ceilings.
    TierLimitsExceeded,
}

impl ReasonCode {
    /// Get the wire form of this reason code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionInactive => "subscriptionInactive",
            Self::MaintenanceNoGrowth => "maintenanceNoGrowth",
            Self::FrozenNoGrowth => "frozenNoGrowth",
            Self::LimitExceeded => "limitExceeded",
            Self::FeatureNotInPlan => "featureNotInPlan",
            Self::FeatureDisabled => "featureDisabled",
            Self::TierLimitsExceeded => "tierLimitsExceeded",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of one gate evaluation.
///
/// A denial is a normal policy outcome, not an error: storage and
/// data-integrity failures come back through [`EntitlementError`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the intent may proceed.
    pub allowed: bool,
    /// Machine-readable denial reason. `None` when allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    /// Human-readable summary, suitable for display.
    pub message: String,
    /// What decided a feature intent, when one was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DecisionSource>,
    /// The cheapest tier that would satisfy the intent, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tier: Option<Tier>,
    /// Where to send the user to upgrade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_hint: Option<String>,
    /// The effective limit, for quantity denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Usage observed at evaluation time, for quantity denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
}

impl Verdict {
    fn allow(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason_code: None,
            message: message.into(),
            source: None,
            required_tier: None,
            upgrade_hint: None,
            limit: None,
            current: None,
        }
    }

    fn deny(reason_code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason_code: Some(reason_code),
            message: message.into(),
            source: None,
            required_tier: None,
            upgrade_hint: None,
            limit: None,
            current: None,
        }
    }

    fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = Some(source);
        self
    }

    fn with_required_tier(mut self, tier: Option<Tier>) -> Self {
        self.required_tier = tier;
        self
    }

    fn with_upgrade_hint(mut self, hint: Option<String>) -> Self {
        self.upgrade_hint = hint;
        self
    }

    fn with_usage(mut self, limit: Option<u64>, current: u64) -> Self {
        self.limit = limit;
        self.current = Some(current);
        self
    }
}

/// Everything a tenant is currently entitled to, resolved in one pass.
///
/// Derived, never persisted. Callers that need many feature answers for
/// one tenant (e.g. rendering a settings page) should use this instead of
/// N gate calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveEntitlement {
    /// The tenant's tier.
    pub tier: Tier,
    /// Lifecycle state at resolution time.
    pub lifecycle_state: LifecycleState,
    /// Every feature currently available.
    pub features: HashSet<String>,
    /// Effective SKU ceiling (`None` = unbounded).
    pub sku_limit: Option<u64>,
    /// Effective location ceiling (`None` = unbounded).
    pub location_limit: Option<u64>,
}

impl EffectiveEntitlement {
    /// Check if a feature is in the resolved set.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

/// Orchestrates lifecycle classification, override resolution, and limit
/// enforcement behind one `evaluate` call.
pub struct EntitlementGate<S: PolicyStore + Clone> {
    store: S,
    catalog: TierCatalog,
    config: EngineConfig,
    resolver: OverrideResolver<S>,
    enforcer: LimitEnforcer<S>,
}

impl<S: PolicyStore + Clone> EntitlementGate<S> {
    /// Create a new gate over a policy store and tier catalog.
    #[must_use]
    pub fn new(store: S, catalog: TierCatalog, config: EngineConfig) -> Self {
        let resolver = OverrideResolver::new(store.clone(), catalog.clone());
        let enforcer =
            LimitEnforcer::new(store.clone(), catalog.clone()).with_fail_open(config.fail_open);
        Self {
            store,
            catalog,
            config,
            resolver,
            enforcer,
        }
    }

    /// Evaluate an intent for a tenant at the current time.
    pub async fn evaluate(&self, tenant_id: &str, intent: Intent) -> Result<Verdict> {
        self.evaluate_at(tenant_id, intent, Utc::now()).await
    }

    /// Evaluate an intent at an explicit instant. Tests and replay tooling
    /// pass `now` directly.
    pub async fn evaluate_at(
        &self,
        tenant_id: &str,
        intent: Intent,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| EntitlementError::TenantNotFound(tenant_id.to_string()))?;

        let state = lifecycle::classify(&tenant, now);
        let effective_state = self.apply_grace(&tenant, state, now);

        if effective_state.is_terminal() {
            tracing::debug!(
                target: "shelfsight::gate",
                tenant_id = %tenant.tenant_id,
                state = %effective_state,
                "Denying intent for inactive subscription"
            );
            return Ok(Verdict::deny(
                ReasonCode::SubscriptionInactive,
                format!("Subscription is {effective_state}"),
            )
            .with_upgrade_hint(self.config.upgrade_url.clone()));
        }

        match intent {
            Intent::Feature { name } => self.evaluate_feature(&tenant, &name).await,
            Intent::Mutate { resource, delta } => {
                self.evaluate_mutation(&tenant, effective_state, resource, delta)
                    .await
            }
            Intent::ChangeTier { proposed } => self.evaluate_tier_change(&tenant, proposed).await,
        }
    }

    /// Resolve the tenant's full entitlement picture in one pass.
    pub async fn effective_entitlement(&self, tenant_id: &str) -> Result<EffectiveEntitlement> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| EntitlementError::TenantNotFound(tenant_id.to_string()))?;
        let now = Utc::now();
        let state = lifecycle::classify(&tenant, now);
        let effective_state = self.apply_grace(&tenant, state, now);

        let definition = self.catalog.get(tenant.tier)?;
        let mut features = definition.features.clone();

        // Fold override rows in with the same precedence resolve_for uses:
        // platform rows are authoritative, tenant rows apply only when the
        // platform row permits them.
        let platform_rows = self.store.list_platform_overrides().await?;
        let tenant_rows = self.store.list_tenant_overrides(&tenant.tenant_id).await?;
        for p in &platform_rows {
            let effective = if p.allow_tenant_override {
                tenant_rows
                    .iter()
                    .find(|t| t.feature == p.feature)
                    .map_or(p.enabled, |t| t.enabled)
            } else {
                p.enabled
            };
            if effective {
                features.insert(p.feature.clone());
            } else {
                features.remove(&p.feature);
            }
        }

        let (sku_limit, location_limit) = match &tenant.organization_id {
            Some(org_id) => {
                let org = self
                    .store
                    .get_organization(org_id)
                    .await?
                    .ok_or_else(|| EntitlementError::OrganizationNotFound(org_id.clone()))?;
                (org.max_total_skus, org.max_locations)
            }
            None => (definition.sku_limit, definition.location_limit),
        };

        Ok(EffectiveEntitlement {
            tier: tenant.tier,
            lifecycle_state: effective_state,
            features,
            sku_limit,
            location_limit,
        })
    }

    async fn evaluate_feature(
        &self,
        tenant: &TenantSubscription,
        feature: &str,
    ) -> Result<Verdict> {
        let decision = self.resolver.resolve_for(tenant, feature).await?;
        if decision.allowed {
            return Ok(
                Verdict::allow(format!("Feature '{feature}' is available"))
                    .with_source(decision.source),
            );
        }

        let verdict = match decision.source {
            DecisionSource::Override => Verdict::deny(
                ReasonCode::FeatureDisabled,
                match decision.override_reason {
                    Some(reason) => format!("Feature '{feature}' is disabled: {reason}"),
                    None => format!("Feature '{feature}' is disabled"),
                },
            ),
            DecisionSource::Tier => Verdict::deny(
                ReasonCode::FeatureNotInPlan,
                format!(
                    "Feature '{feature}' is not included in the {} plan",
                    tenant.tier
                ),
            )
            .with_required_tier(self.catalog.minimum_tier_with(feature))
            .with_upgrade_hint(self.config.upgrade_url.clone()),
        };
        Ok(verdict.with_source(decision.source))
    }

    async fn evaluate_mutation(
        &self,
        tenant: &TenantSubscription,
        state: LifecycleState,
        resource: Resource,
        delta: i64,
    ) -> Result<Verdict> {
        let check = self
            .enforcer
            .check_with_state(tenant, state, resource, delta)
            .await?;
        match check {
            LimitCheck::Admit => Ok(Verdict::allow(format!("{resource} change admitted"))),
            LimitCheck::Deny {
                reason: LimitDenyReason::GrowthFrozen,
                limit,
                current,
            } => {
                let reason_code = if state == LifecycleState::Frozen {
                    ReasonCode::FrozenNoGrowth
                } else {
                    ReasonCode::MaintenanceNoGrowth
                };
                Ok(Verdict::deny(
                    reason_code,
                    format!("Account is in {state}; new {resource}s cannot be added"),
                )
                .with_usage(limit, current)
                .with_upgrade_hint(self.config.upgrade_url.clone()))
            }
            LimitCheck::Deny {
                reason: LimitDenyReason::LimitExceeded,
                limit,
                current,
            } => {
                let needed = current.saturating_add(delta.max(0) as u64);
                Ok(Verdict::deny(
                    ReasonCode::LimitExceeded,
                    match limit {
                        Some(max) => format!(
                            "{resource} limit reached ({current} of {max} in use)"
                        ),
                        None => format!("{resource} limit reached"),
                    },
                )
                .with_usage(limit, current)
                .with_required_tier(self.catalog.minimum_tier_for(resource, needed))
                .with_upgrade_hint(self.config.upgrade_url.clone()))
            }
        }
    }

    async fn evaluate_tier_change(
        &self,
        tenant: &TenantSubscription,
        proposed: Tier,
    ) -> Result<Verdict> {
        let check = self
            .enforcer
            .validate_tier_change(&tenant.tenant_id, proposed)
            .await?;
        match check {
            TierChangeCheck::Allowed => {
                Ok(Verdict::allow(format!("Tier change to {proposed} permitted")))
            }
            TierChangeCheck::Blocked {
                excess_skus,
                excess_locations,
                ..
            } => {
                let mut parts = Vec::new();
                if excess_skus > 0 {
                    parts.push(format!("{excess_skus} SKUs"));
                }
                if excess_locations > 0 {
                    parts.push(format!("{excess_locations} locations"));
                }
                Ok(Verdict::deny(
                    ReasonCode::TierLimitsExceeded,
                    format!(
                        "Current usage exceeds the {proposed} plan by {}; remove the excess first",
                        parts.join(" and ")
                    ),
                ))
            }
        }
    }

    /// Expired tenants inside the configured grace window are treated as
    /// maintenance (readable, growth-frozen) instead of terminal. The
    /// window is anchored at whichever end date lapsed last.
    fn apply_grace(
        &self,
        tenant: &TenantSubscription,
        state: LifecycleState,
        now: DateTime<Utc>,
    ) -> LifecycleState {
        if state != LifecycleState::Expired || self.config.expired_grace.is_zero() {
            return state;
        }
        let lapsed_at = match (tenant.trial_ends_at, tenant.subscription_ends_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        match lapsed_at {
            Some(at) if now < at + self.config.expired_grace => LifecycleState::Maintenance,
            _ => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SubscriptionStatus;
    use crate::storage::test::InMemoryPolicyStore;
    use crate::storage::{FeatureOverride, Organization, OverrideScope, UsageCounts};
    use chrono::Duration;

    fn seed_tenant(store: &InMemoryPolicyStore, id: &str, tier: Tier) -> TenantSubscription {
        let tenant = TenantSubscription {
            tenant_id: id.to_string(),
            tier,
            status: SubscriptionStatus::Active,
            trial_ends_at: None,
            subscription_ends_at: None,
            organization_id: None,
            frozen: false,
            updated_at: Utc::now(),
        };
        store.upsert_tenant(tenant.clone());
        tenant
    }

    fn gate(store: InMemoryPolicyStore) -> EntitlementGate<InMemoryPolicyStore> {
        EntitlementGate::new(store, TierCatalog::standard(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_feature_allowed_by_tier() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Professional);
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Feature {
                    name: "gbp_integration".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(verdict.allowed);
        assert_eq!(verdict.source, Some(DecisionSource::Tier));
    }

    #[tokio::test]
    async fn test_feature_not_in_plan_names_required_tier() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        let config = EngineConfig::builder()
            .upgrade_url("https://app.shelfsight.example/billing/upgrade")
            .build();
        let gate = EntitlementGate::new(store, TierCatalog::standard(), config);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Feature {
                    name: "api_access".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::FeatureNotInPlan));
        assert_eq!(verdict.required_tier, Some(Tier::Professional));
        assert_eq!(
            verdict.upgrade_hint.as_deref(),
            Some("https://app.shelfsight.example/billing/upgrade")
        );
    }

    #[tokio::test]
    async fn test_kill_switch_denies_as_feature_disabled() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Enterprise);
        store.set_platform_override(FeatureOverride {
            scope: OverrideScope::Platform,
            feature: "api_access".to_string(),
            enabled: false,
            allow_tenant_override: false,
            reason: Some("incident 4412".to_string()),
        });
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Feature {
                    name: "api_access".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::FeatureDisabled));
        assert!(verdict.message.contains("incident 4412"));
    }

    #[tokio::test]
    async fn test_canceled_short_circuits() {
        let store = InMemoryPolicyStore::new();
        let mut tenant = seed_tenant(&store, "t_1", Tier::Professional);
        tenant.status = SubscriptionStatus::Canceled;
        store.upsert_tenant(tenant);
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Feature {
                    name: "gbp_integration".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::SubscriptionInactive));
    }

    #[tokio::test]
    async fn test_expired_trial_mutation_is_maintenance_no_growth() {
        let store = InMemoryPolicyStore::new();
        let mut tenant = seed_tenant(&store, "t_1", Tier::GoogleOnly);
        tenant.status = SubscriptionStatus::Trial;
        tenant.trial_ends_at = Some(Utc::now() - Duration::days(1));
        store.upsert_tenant(tenant);
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Sku,
                    delta: 1,
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::MaintenanceNoGrowth));
    }

    #[tokio::test]
    async fn test_frozen_mutation_reason_code() {
        let store = InMemoryPolicyStore::new();
        let mut tenant = seed_tenant(&store, "t_1", Tier::Professional);
        tenant.frozen = true;
        store.upsert_tenant(tenant);
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Location,
                    delta: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(verdict.reason_code, Some(ReasonCode::FrozenNoGrowth));
    }

    #[tokio::test]
    async fn test_limit_denial_carries_numbers_and_required_tier() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        store.set_usage(
            "t_1",
            UsageCounts {
                skus: 500,
                locations: 1,
            },
        );
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Sku,
                    delta: 1,
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::LimitExceeded));
        assert_eq!(verdict.limit, Some(500));
        assert_eq!(verdict.current, Some(500));
        // 501 SKUs fit in professional (5000).
        assert_eq!(verdict.required_tier, Some(Tier::Professional));
    }

    #[tokio::test]
    async fn test_tier_change_blocked_names_excess() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Professional);
        store.set_usage(
            "t_1",
            UsageCounts {
                skus: 700,
                locations: 1,
            },
        );
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::ChangeTier {
                    proposed: Tier::Starter,
                },
            )
            .await
            .unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason_code, Some(ReasonCode::TierLimitsExceeded));
        assert!(verdict.message.contains("200 SKUs"));
    }

    #[tokio::test]
    async fn test_tier_change_allowed() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        store.set_usage(
            "t_1",
            UsageCounts {
                skus: 100,
                locations: 1,
            },
        );
        let gate = gate(store);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::ChangeTier {
                    proposed: Tier::Professional,
                },
            )
            .await
            .unwrap();
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_error_not_verdict() {
        let gate = gate(InMemoryPolicyStore::new());
        let err = gate
            .evaluate(
                "ghost",
                Intent::Feature {
                    name: "api_access".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EntitlementError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_within_grace_degrades_to_maintenance() {
        let store = InMemoryPolicyStore::new();
        let mut tenant = seed_tenant(&store, "t_1", Tier::Professional);
        tenant.subscription_ends_at = Some(Utc::now() - Duration::days(2));
        store.upsert_tenant(tenant);
        let config = EngineConfig::builder().expired_grace_days(7).build();
        let gate = EntitlementGate::new(store, TierCatalog::standard(), config);

        // Inside the grace window: not terminal, but growth is frozen.
        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Sku,
                    delta: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(verdict.reason_code, Some(ReasonCode::MaintenanceNoGrowth));

        // Deletions still go through.
        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Sku,
                    delta: -1,
                },
            )
            .await
            .unwrap();
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn test_expired_outside_grace_is_inactive() {
        let store = InMemoryPolicyStore::new();
        let mut tenant = seed_tenant(&store, "t_1", Tier::Professional);
        tenant.subscription_ends_at = Some(Utc::now() - Duration::days(30));
        store.upsert_tenant(tenant);
        let config = EngineConfig::builder().expired_grace_days(7).build();
        let gate = EntitlementGate::new(store, TierCatalog::standard(), config);

        let verdict = gate
            .evaluate(
                "t_1",
                Intent::Mutate {
                    resource: Resource::Sku,
                    delta: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(verdict.reason_code, Some(ReasonCode::SubscriptionInactive));
    }

    #[tokio::test]
    async fn test_effective_entitlement_merges_overrides() {
        let store = InMemoryPolicyStore::new();
        seed_tenant(&store, "t_1", Tier::Starter);
        // Kill-switch removes a tier feature.
        store.set_platform_override(FeatureOverride {
            scope: OverrideScope::Platform,
            feature: "square_sync".to_string(),
            enabled: false,
            allow_tenant_override: false,
            reason: None,
        });
        // Permissive platform row plus tenant grant adds one beyond tier.
        store.set_platform_override(FeatureOverride {
            scope: OverrideScope::Platform,
            feature: "api_access".to_string(),
            enabled: false,
            allow_tenant_override: true,
            reason: None,
        });
        store.set_tenant_override(
            "t_1",
            FeatureOverride {
                scope: OverrideScope::Tenant,
                feature: "api_access".to_string(),
                enabled: true,
                allow_tenant_override: false,
                reason: None,
            },
        );
        let gate = gate(store);

        let entitlement = gate.effective_entitlement("t_1").await.unwrap();
        assert_eq!(entitlement.tier, Tier::Starter);
        assert_eq!(entitlement.lifecycle_state, LifecycleState::Active);
        assert!(!entitlement.has_feature("square_sync"));
        assert!(entitlement.has_feature("api_access"));
        assert!(entitlement.has_feature("inventory_management"));
        assert_eq!(entitlement.sku_limit, Some(500));
        assert_eq!(entitlement.location_limit, Some(1));
    }

    #[tokio::test]
    async fn test_effective_entitlement_uses_org_limits() {
        let store = InMemoryPolicyStore::new();
        store.upsert_organization(Organization {
            id: "org_1".to_string(),
            tier: Tier::ChainStarter,
            max_locations: Some(5),
            max_total_skus: Some(2_500),
        });
        let mut tenant = seed_tenant(&store, "t_1", Tier::ChainStarter);
        tenant.organization_id = Some("org_1".to_string());
        store.upsert_tenant(tenant);
        let gate = gate(store);

        let entitlement = gate.effective_entitlement("t_1").await.unwrap();
        assert_eq!(entitlement.sku_limit, Some(2_500));
        assert_eq!(entitlement.location_limit, Some(5));
    }
}
