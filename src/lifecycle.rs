//! Lifecycle classification: raw subscription status + dates → one
//! effective lifecycle state.
//!
//! [`classify`] is a pure, total function: every valid input combination
//! maps to exactly one of the seven states, with no I/O and no `unknown`
//! output. The raw persisted `status` field is what billing wrote; the
//! lifecycle state is what the engine enforces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::TenantSubscription;

/// Raw subscription status, as persisted on the tenant record.
///
/// Mutated only by billing-event handlers and tier-change endpoints;
/// the engine reads it and never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In a trial period.
    Trial,
    /// Paid and current.
    Active,
    /// Payment failed; subscription not yet terminated.
    PastDue,
    /// Terminated by the tenant or by billing. Terminal; the record
    /// persists for audit.
    Canceled,
    /// Lapsed without renewal.
    Expired,
}

impl SubscriptionStatus {
    /// Get the string form of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effective lifecycle state, derived per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Paid and in good standing.
    Active,
    /// Trial running, not yet ended.
    Trialing,
    /// Degraded: existing data readable and editable, growth blocked.
    Maintenance,
    /// Explicitly frozen by an admin/billing signal. Growth blocked.
    Frozen,
    /// Terminal: subscription canceled.
    Canceled,
    /// Terminal (outside any grace window): subscription lapsed.
    Expired,
    /// Payment failed; access continues while dunning runs.
    PastDue,
}

impl LifecycleState {
    /// Terminal states short-circuit evaluation to a commercial denial.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Expired)
    }

    /// States in which growth operations (`delta > 0`) are denied
    /// unconditionally, even under the numeric limit.
    #[must_use]
    pub fn blocks_growth(&self) -> bool {
        matches!(self, Self::Maintenance | Self::Frozen)
    }

    /// Get the string form of this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::Maintenance => "maintenance",
            Self::Frozen => "frozen",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::PastDue => "past_due",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a tenant's effective lifecycle state at `now`.
///
/// Rules, first match wins:
///
/// 1. `status == canceled` → `Canceled`.
/// 2. explicit freeze flag → `Frozen`. The freeze signal is a business
///    decision carried on the record, never derived from date math here.
/// 3. `status == expired` → `Expired`.
/// 4. expired trial → `Maintenance` on the lowest paid tier
///    (`google_only`), `Expired` otherwise.
/// 5. `status == active` past `subscription_ends_at` → `Expired`.
/// 6. `status == past_due` → `PastDue`.
/// 7. live trial → `Trialing`.
/// 8. otherwise → `Active`.
#[must_use]
pub fn classify(tenant: &TenantSubscription, now: DateTime<Utc>) -> LifecycleState {
    if tenant.status == SubscriptionStatus::Canceled {
        return LifecycleState::Canceled;
    }
    if tenant.frozen {
        return LifecycleState::Frozen;
    }
    match tenant.status {
        SubscriptionStatus::Expired => LifecycleState::Expired,
        SubscriptionStatus::Trial => match tenant.trial_ends_at {
            Some(ends) if ends <= now => {
                if tenant.tier.is_lowest_paid() {
                    LifecycleState::Maintenance
                } else {
                    LifecycleState::Expired
                }
            }
            // No trial end date recorded: treat the trial as live rather
            // than inventing an expiry.
            _ => LifecycleState::Trialing,
        },
        SubscriptionStatus::Active => match tenant.subscription_ends_at {
            Some(ends) if ends <= now => LifecycleState::Expired,
            _ => LifecycleState::Active,
        },
        SubscriptionStatus::PastDue => LifecycleState::PastDue,
        SubscriptionStatus::Canceled => LifecycleState::Canceled,
    }
}
