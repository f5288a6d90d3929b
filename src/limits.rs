//! Usage-limit enforcement: quota checks, growth freezes, chain pooling,
//! and tier-change validation.
//!
//! The enforcer is a pre-check, not a transactional reservation: no lock is
//! held between the decision and the eventual write, and concurrent checks
//! for the same tenant may both observe `current = limit - 1`. The
//! persistence layer's constraints are the backstop; this is a deliberate
//! latency-over-exactness tradeoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EntitlementError, Result};
use crate::lifecycle::{self, LifecycleState};
use crate::storage::{PolicyStore, TenantSubscription, UsageCounts};
use crate::tiers::{Tier, TierCatalog};

/// A countable resource subject to tier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Inventory items.
    Sku,
    /// Store locations.
    Location,
}

impl Resource {
    /// Get the string form of this resource.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sku => "sku",
            Self::Location => "location",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a limit check denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDenyReason {
    /// Lifecycle state blocks all growth, headroom notwithstanding.
    GrowthFrozen,
    /// The mutation would exceed the numeric ceiling.
    LimitExceeded,
}

/// Result of checking a proposed mutation against the effective limit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum LimitCheck {
    /// The mutation may proceed.
    Admit,
    /// The mutation is denied.
    Deny {
        /// Why.
        reason: LimitDenyReason,
        /// The effective ceiling (`None` = unbounded).
        limit: Option<u64>,
        /// Usage observed at check time.
        current: u64,
    },
}

impl LimitCheck {
    /// Check if the mutation was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Result of validating a prospective tier change against current usage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum TierChangeCheck {
    /// Current usage fits within the proposed tier.
    Allowed,
    /// Current usage exceeds the proposed tier's ceilings.
    Blocked {
        /// SKUs over the proposed ceiling.
        excess_skus: u64,
        /// Locations over the proposed ceiling.
        excess_locations: u64,
        /// The proposed SKU ceiling.
        sku_limit: Option<u64>,
        /// The proposed location ceiling.
        location_limit: Option<u64>,
        /// Usage observed at check time.
        current: UsageCounts,
    },
}

impl TierChangeCheck {
    /// Check if the tier change was allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Enforces usage limits for tenants and chains.
pub struct LimitEnforcer<S: PolicyStore> {
    store: S,
    catalog: TierCatalog,
    fail_open: bool,
}

impl<S: PolicyStore> LimitEnforcer<S> {
    /// Create a new enforcer. Usage-read failures fail closed by default.
    #[must_use]
    pub fn new(store: S, catalog: TierCatalog) -> Self {
        Self {
            store,
            catalog,
            fail_open: false,
        }
    }

    /// Set whether usage-read failures admit the mutation instead of
    /// propagating. Tenant and organization reads always fail closed;
    /// only the usage-count read is eligible.
    #[must_use]
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Check a proposed mutation for a tenant by id, at the current time.
    pub async fn check_limit(
        &self,
        tenant_id: &str,
        resource: Resource,
        delta: i64,
    ) -> Result<LimitCheck> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| EntitlementError::TenantNotFound(tenant_id.to_string()))?;
        self.check_for(&tenant, resource, delta, Utc::now()).await
    }

    /// Check a proposed mutation for an already-loaded tenant record.
    pub async fn check_for(
        &self,
        tenant: &TenantSubscription,
        resource: Resource,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<LimitCheck> {
        let state = lifecycle::classify(tenant, now);
        self.check_with_state(tenant, state, resource, delta).await
    }

    /// Check a proposed mutation with a pre-computed lifecycle state.
    ///
    /// The gate uses this to apply its grace-window adjustment before
    /// enforcement.
    pub async fn check_with_state(
        &self,
        tenant: &TenantSubscription,
        state: LifecycleState,
        resource: Resource,
        delta: i64,
    ) -> Result<LimitCheck> {
        // Shrinking usage can never violate a ceiling.
        if delta <= 0 {
            return Ok(LimitCheck::Admit);
        }

        let limit = self.effective_limit(tenant, resource).await?;

        if state.blocks_growth() {
            // The denial stands regardless of usage; the count is
            // best-effort context for the caller's message.
            let current = self
                .current_usage(tenant, resource)
                .await
                .unwrap_or_default();
            return Ok(LimitCheck::Deny {
                reason: LimitDenyReason::GrowthFrozen,
                limit,
                current,
            });
        }

        let current = match self.current_usage(tenant, resource).await {
            Ok(count) => count,
            Err(err) if err.is_storage() && self.fail_open => {
                tracing::warn!(
                    target: "shelfsight::limits",
                    tenant_id = %tenant.tenant_id,
                    resource = %resource,
                    error = %err,
                    "Usage read failed, admitting per fail-open policy"
                );
                return Ok(LimitCheck::Admit);
            }
            Err(err) => return Err(err),
        };

        match limit {
            None => Ok(LimitCheck::Admit),
            Some(max) if current.saturating_add(delta as u64) > max => Ok(LimitCheck::Deny {
                reason: LimitDenyReason::LimitExceeded,
                limit: Some(max),
                current,
            }),
            Some(_) => Ok(LimitCheck::Admit),
        }
    }

    /// Validate a prospective tier change for a single tenant against its
    /// own current usage.
    pub async fn validate_tier_change(
        &self,
        tenant_id: &str,
        proposed: Tier,
    ) -> Result<TierChangeCheck> {
        let current = self.store.get_usage(tenant_id).await?;
        let definition = self.catalog.get(proposed)?;
        Ok(compare_usage(
            current,
            definition.sku_limit,
            definition.location_limit,
        ))
    }

    /// Validate a prospective tier change for an organization against
    /// chain-wide usage. An organization may not downgrade to a tier that
    /// cannot hold what its tenants already have.
    pub async fn validate_org_tier_change(
        &self,
        org_id: &str,
        proposed: Tier,
    ) -> Result<TierChangeCheck> {
        let org = self
            .store
            .get_organization(org_id)
            .await?
            .ok_or_else(|| EntitlementError::OrganizationNotFound(org_id.to_string()))?;
        let current = self.store.get_chain_usage(&org.id).await?;
        let definition = self.catalog.get(proposed)?;
        Ok(compare_usage(
            current,
            definition.sku_limit,
            definition.location_limit,
        ))
    }

    /// The effective ceiling for this tenant: the organization's pooled
    /// limit when it belongs to a chain, its own tier limit otherwise.
    async fn effective_limit(
        &self,
        tenant: &TenantSubscription,
        resource: Resource,
    ) -> Result<Option<u64>> {
        match &tenant.organization_id {
            Some(org_id) => {
                let org = self
                    .store
                    .get_organization(org_id)
                    .await?
                    .ok_or_else(|| EntitlementError::OrganizationNotFound(org_id.clone()))?;
                Ok(match resource {
                    Resource::Sku => org.max_total_skus,
                    Resource::Location => org.max_locations,
                })
            }
            None => self.catalog.limit(tenant.tier, resource),
        }
    }

    /// Current usage against the effective ceiling: chain-wide when the
    /// tenant belongs to an organization, its own otherwise.
    async fn current_usage(&self, tenant: &TenantSubscription, resource: Resource) -> Result<u64> {
        let counts = match &tenant.organization_id {
            Some(org_id) => self.store.get_chain_usage(org_id).await?,
            None => self.store.get_usage(&tenant.tenant_id).await?,
        };
        Ok(match resource {
            Resource::Sku => counts.skus,
            Resource::Location => counts.locations,
        })
    }
}

fn compare_usage(
    current: UsageCounts,
    sku_limit: Option<u64>,
    location_limit: Option<u64>,
) -> TierChangeCheck {
    let excess_skus = sku_limit.map_or(0, |max| current.skus.saturating_sub(max));
    let excess_locations = location_limit.map_or(0, |max| current.locations.saturating_sub(max));
    if excess_skus == 0 && excess_locations == 0 {
        TierChangeCheck::Allowed
    } else {
        TierChangeCheck::Blocked {
            excess_skus,
            excess_locations,
            sku_limit,
            location_limit,
            current,
        }
    }
}
