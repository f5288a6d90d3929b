//! ShelfSight entitlements - the policy engine for a multi-tenant
//! retail-visibility platform
//!
//! Decides, for every tenant on every request, what subscription
//! lifecycle state the tenant is in, which features and limits apply
//! given tier + overrides, and whether a proposed operation should be
//! allowed, degraded, or blocked with a commercial reason.
//!
//! # Features
//!
//! - **Tier Catalog**: cumulative feature inheritance along a fixed tier
//!   hierarchy, with per-tier SKU/location limits
//! - **Lifecycle Classifier**: pure, total mapping from billing status +
//!   dates to one effective lifecycle state
//! - **Override Resolver**: platform kill-switches and per-tenant feature
//!   grants with documented precedence
//! - **Limit Enforcer**: quota checks with chain pooling, growth freezes,
//!   and tier-change validation
//! - **Entitlement Gate**: the single entry point returning structured
//!   verdicts with stable reason codes and upgrade hints
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use shelfsight_entitlements::{
//!     EngineConfig, EntitlementGate, Intent, TierCatalog,
//! };
//!
//! #[tokio::main]
//! async fn main() -> shelfsight_entitlements::Result<()> {
//!     shelfsight_entitlements::init_tracing();
//!
//!     let store = MyPolicyStore::connect().await?;
//!     let config = EngineConfig::builder().from_env().build();
//!     let gate = EntitlementGate::new(store, TierCatalog::standard(), config);
//!
//!     let verdict = gate
//!         .evaluate("tenant_123", Intent::Feature { name: "api_access".into() })
//!         .await?;
//!     println!("allowed: {}", verdict.allowed);
//!     Ok(())
//! }
//! ```
//!
//! The engine never writes tenant, override, or usage state; implement
//! [`PolicyStore`] over your persistence layer to supply the reads.
//! Platform-admin bypass is checked by the caller before invoking the
//! gate.

pub mod cache;
mod config;
mod error;
pub mod gate;
pub mod lifecycle;
pub mod limits;
pub mod overrides;
pub mod response;
pub mod storage;
pub mod tiers;

// Re-exports for public API
pub use cache::CachedEntitlementGate;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{EntitlementError, Result};
pub use gate::{EffectiveEntitlement, EntitlementGate, Intent, ReasonCode, Verdict};
pub use lifecycle::{classify, LifecycleState, SubscriptionStatus};
pub use limits::{LimitCheck, LimitDenyReason, LimitEnforcer, Resource, TierChangeCheck};
pub use overrides::{DecisionSource, FeatureDecision, OverrideResolver};
pub use response::DenialResponse;
pub use storage::{
    FeatureOverride, Organization, OverrideScope, PolicyStore, TenantSubscription, UsageCounts,
};
pub use tiers::{Tier, TierCatalog, TierCatalogBuilder, TierDefinition};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "shelfsight=debug")
/// - `SHELFSIGHT_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("SHELFSIGHT_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
