//! Tier catalog: plan definitions, feature sets, and usage limits.
//!
//! Tiers form a fixed inheritance hierarchy; a tier's effective feature set
//! is the union of its own features and every tier below it. Numeric limits
//! do not inherit: each tier carries its own ceilings, with `None` meaning
//! unbounded.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelfsight_entitlements::{Tier, TierCatalog};
//!
//! let catalog = TierCatalog::standard();
//! let pro = catalog.get(Tier::Professional)?;
//! assert!(pro.features.contains("gbp_integration")); // inherited from google_only
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{EntitlementError, Result};
use crate::limits::Resource;

/// A subscription tier.
///
/// Inheritance hierarchy (each tier includes everything below it):
///
/// - `enterprise` ⊇ `professional` ⊇ `starter` ⊇ `google_only`
/// - `organization` ⊇ `enterprise`
/// - each `chain_*` tier ⊇ its non-chain counterpart
///
/// `trial` is a leaf: its feature set is listed explicitly because trials
/// get time-boxed professional-grade access rather than a rung on the
/// upgrade ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Time-boxed evaluation tier assigned at signup.
    Trial,
    /// Perpetually limited directory-only tier.
    GoogleOnly,
    /// Entry paid tier.
    Starter,
    /// Mid paid tier.
    Professional,
    /// Top single-store tier.
    Enterprise,
    /// Multi-store organization tier.
    Organization,
    /// Chain variant of starter (pooled limits).
    ChainStarter,
    /// Chain variant of professional (pooled limits).
    ChainProfessional,
    /// Chain variant of enterprise (pooled limits).
    ChainEnterprise,
}

/// Self-serve upgrade ladder, cheapest first. Chain tiers and trial are
/// assigned by sales/admin tooling and are not upgrade targets.
const UPGRADE_PATH: [Tier; 5] = [
    Tier::GoogleOnly,
    Tier::Starter,
    Tier::Professional,
    Tier::Enterprise,
    Tier::Organization,
];

impl Tier {
    /// Parse a tier key. Unknown keys are [`EntitlementError::InvalidTier`],
    /// never silently mapped to the lowest tier.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "trial" => Ok(Self::Trial),
            "google_only" => Ok(Self::GoogleOnly),
            "starter" => Ok(Self::Starter),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            "organization" => Ok(Self::Organization),
            "chain_starter" => Ok(Self::ChainStarter),
            "chain_professional" => Ok(Self::ChainProfessional),
            "chain_enterprise" => Ok(Self::ChainEnterprise),
            other => Err(EntitlementError::InvalidTier(other.to_string())),
        }
    }

    /// Get the string key for this tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::GoogleOnly => "google_only",
            Self::Starter => "starter",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
            Self::Organization => "organization",
            Self::ChainStarter => "chain_starter",
            Self::ChainProfessional => "chain_professional",
            Self::ChainEnterprise => "chain_enterprise",
        }
    }

    /// The tier this one inherits features from, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Tier> {
        match self {
            Self::Trial | Self::GoogleOnly => None,
            Self::Starter => Some(Self::GoogleOnly),
            Self::Professional => Some(Self::Starter),
            Self::Enterprise => Some(Self::Professional),
            Self::Organization => Some(Self::Enterprise),
            Self::ChainStarter => Some(Self::Starter),
            Self::ChainProfessional => Some(Self::Professional),
            Self::ChainEnterprise => Some(Self::Enterprise),
        }
    }

    /// Check if this is a chain tier (limits pool across an organization).
    #[must_use]
    pub fn is_chain(&self) -> bool {
        matches!(
            self,
            Self::ChainStarter | Self::ChainProfessional | Self::ChainEnterprise
        )
    }

    /// The lowest paid tier. Trial expiry on this tier degrades to
    /// maintenance rather than a hard block: commercially it is a
    /// perpetually limited plan, not a paywall.
    #[must_use]
    pub fn is_lowest_paid(&self) -> bool {
        *self == Self::GoogleOnly
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Definition of a single tier: feature set plus usage ceilings.
///
/// When returned by [`TierCatalog::get`], `features` is the *effective*
/// (cumulative) set. Limits are always the tier's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDefinition {
    /// Features available on this tier.
    pub features: HashSet<String>,
    /// Maximum SKU count (`None` = unbounded).
    pub sku_limit: Option<u64>,
    /// Maximum location count (`None` = unbounded).
    pub location_limit: Option<u64>,
}

impl TierDefinition {
    /// Check if this definition includes a feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Get the limit for a resource (`None` = unbounded).
    #[must_use]
    pub fn limit(&self, resource: Resource) -> Option<u64> {
        match resource {
            Resource::Sku => self.sku_limit,
            Resource::Location => self.location_limit,
        }
    }
}

/// The tier catalog: every tier the platform sells, with its features
/// and limits.
#[derive(Debug, Clone, Default)]
pub struct TierCatalog {
    tiers: HashMap<Tier, TierDefinition>,
}

impl TierCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing a catalog.
    #[must_use]
    pub fn builder() -> TierCatalogBuilder {
        TierCatalogBuilder::new()
    }

    /// The shipped plan matrix.
    #[must_use]
    pub fn standard() -> Self {
        Self::builder()
            .tier(Tier::GoogleOnly)
                .features(["directory_listing", "gbp_integration"])
                .sku_limit(50)
                .location_limit(1)
                .done()
            .tier(Tier::Starter)
                .features(["inventory_management", "square_sync"])
                .sku_limit(500)
                .location_limit(1)
                .done()
            .tier(Tier::Professional)
                .features(["api_access", "advanced_analytics", "multi_location"])
                .sku_limit(5_000)
                .location_limit(3)
                .done()
            .tier(Tier::Enterprise)
                .features(["bulk_export", "custom_branding", "priority_support"])
                .sku_limit(50_000)
                .location_limit(25)
                .done()
            .tier(Tier::Organization)
                .features(["chain_dashboard", "pooled_billing"])
                .location_limit(100)
                .done()
            .tier(Tier::ChainStarter)
                .features(["chain_dashboard"])
                .sku_limit(2_500)
                .location_limit(5)
                .done()
            .tier(Tier::ChainProfessional)
                .features(["chain_dashboard"])
                .sku_limit(25_000)
                .location_limit(25)
                .done()
            .tier(Tier::ChainEnterprise)
                .features(["chain_dashboard", "pooled_billing"])
                .done()
            // Trial is a leaf with an explicit professional-equivalent set.
            .tier(Tier::Trial)
                .features([
                    "directory_listing",
                    "gbp_integration",
                    "inventory_management",
                    "square_sync",
                    "api_access",
                    "advanced_analytics",
                    "multi_location",
                ])
                .sku_limit(100)
                .location_limit(1)
                .done()
            .build()
    }

    /// Add or replace a tier definition.
    pub fn add(&mut self, tier: Tier, definition: TierDefinition) {
        self.tiers.insert(tier, definition);
    }

    /// Check if a tier is defined in this catalog.
    #[must_use]
    pub fn contains(&self, tier: Tier) -> bool {
        self.tiers.contains_key(&tier)
    }

    /// Get the effective definition for a tier.
    ///
    /// Features are the cumulative union along the inheritance chain;
    /// limits are the tier's own. A tier with no catalog row is
    /// [`EntitlementError::InvalidTier`].
    pub fn get(&self, tier: Tier) -> Result<TierDefinition> {
        let own = self
            .tiers
            .get(&tier)
            .ok_or_else(|| EntitlementError::InvalidTier(tier.as_str().to_string()))?;

        let mut features = own.features.clone();
        let mut ancestor = tier.parent();
        while let Some(t) = ancestor {
            // An ancestor missing from the catalog contributes nothing.
            if let Some(def) = self.tiers.get(&t) {
                features.extend(def.features.iter().cloned());
            }
            ancestor = t.parent();
        }

        Ok(TierDefinition {
            features,
            sku_limit: own.sku_limit,
            location_limit: own.location_limit,
        })
    }

    /// Get a tier's own limit for a resource.
    pub fn limit(&self, tier: Tier, resource: Resource) -> Result<Option<u64>> {
        Ok(self.get(tier)?.limit(resource))
    }

    /// The cheapest self-serve tier whose effective feature set includes
    /// `feature`. Used to populate upgrade prompts.
    #[must_use]
    pub fn minimum_tier_with(&self, feature: &str) -> Option<Tier> {
        UPGRADE_PATH
            .into_iter()
            .find(|t| matches!(self.get(*t), Ok(def) if def.has_feature(feature)))
    }

    /// The cheapest self-serve tier whose limit accommodates `needed`
    /// units of `resource`.
    #[must_use]
    pub fn minimum_tier_for(&self, resource: Resource, needed: u64) -> Option<Tier> {
        UPGRADE_PATH.into_iter().find(|t| {
            self.get(*t)
                .map(|def| def.limit(resource).map_or(true, |limit| limit >= needed))
                .unwrap_or(false)
        })
    }
}

/// Builder for constructing a tier catalog.
#[derive(Debug, Default)]
pub struct TierCatalogBuilder {
    tiers: HashMap<Tier, TierDefinition>,
}

impl TierCatalogBuilder {
    /// Create a new catalog builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start defining a tier.
    #[must_use]
    pub fn tier(self, tier: Tier) -> TierBuilder {
        TierBuilder {
            parent: self,
            tier,
            features: HashSet::new(),
            sku_limit: None,
            location_limit: None,
        }
    }

    /// Build the catalog.
    #[must_use]
    pub fn build(self) -> TierCatalog {
        TierCatalog { tiers: self.tiers }
    }

    fn add_tier(mut self, tier: Tier, definition: TierDefinition) -> Self {
        self.tiers.insert(tier, definition);
        self
    }
}

/// Builder for a single tier definition.
#[derive(Debug)]
pub struct TierBuilder {
    parent: TierCatalogBuilder,
    tier: Tier,
    features: HashSet<String>,
    sku_limit: Option<u64>,
    location_limit: Option<u64>,
}

impl TierBuilder {
    /// Add features owned by this tier (inherited features come from the
    /// hierarchy, not from repetition here).
    #[must_use]
    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Add a single feature.
    #[must_use]
    pub fn feature(mut self, feature: &str) -> Self {
        self.features.insert(feature.to_string());
        self
    }

    /// Set the SKU ceiling. Unset = unbounded.
    #[must_use]
    pub fn sku_limit(mut self, max: u64) -> Self {
        self.sku_limit = Some(max);
        self
    }

    /// Set the location ceiling. Unset = unbounded.
    #[must_use]
    pub fn location_limit(mut self, max: u64) -> Self {
        self.location_limit = Some(max);
        self
    }

    /// Finish this tier and return to the catalog builder.
    #[must_use]
    pub fn done(self) -> TierCatalogBuilder {
        let definition = TierDefinition {
            features: self.features,
            sku_limit: self.sku_limit,
            location_limit: self.location_limit,
        };
        self.parent.add_tier(self.tier, definition)
    }
}
