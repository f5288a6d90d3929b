//! Engine configuration.
//!
//! Deployment-level knobs for the policy engine. All of them default to
//! the strict setting; relaxations are opt-in per deployment.

use chrono::Duration;

/// Configuration for the entitlement engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Admit mutations when the usage-count read fails, instead of
    /// propagating the storage error. Availability-over-revenue tradeoff;
    /// off by default. Tenant and organization reads always fail closed.
    pub fail_open: bool,
    /// How long an expired subscription keeps maintenance access before
    /// going terminal. Zero means expired is terminal immediately.
    pub expired_grace: Duration,
    /// Upgrade-page URL attached to commercial denials.
    pub upgrade_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fail_open: false,
            expired_grace: Duration::zero(),
            upgrade_url: None,
        }
    }
}

impl EngineConfig {
    /// Create a builder for custom configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
///
/// # Example
///
/// ```rust
/// use shelfsight_entitlements::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .expired_grace_days(7)
///     .upgrade_url("https://app.example.com/billing/upgrade")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    fail_open: Option<bool>,
    expired_grace: Option<Duration>,
    upgrade_url: Option<String>,
}

impl EngineConfigBuilder {
    /// Set whether usage-read failures admit the mutation.
    #[must_use]
    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = Some(fail_open);
        self
    }

    /// Set the post-expiry grace window in days.
    #[must_use]
    pub fn expired_grace_days(mut self, days: i64) -> Self {
        self.expired_grace = Some(Duration::days(days));
        self
    }

    /// Set the upgrade-page URL attached to commercial denials.
    #[must_use]
    pub fn upgrade_url(mut self, url: impl Into<String>) -> Self {
        self.upgrade_url = Some(url.into());
        self
    }

    /// Load settings from environment variables, keeping any values
    /// already set on the builder:
    ///
    /// - `SHELFSIGHT_FAIL_OPEN_LIMITS`: `true`/`1` enables fail-open
    /// - `SHELFSIGHT_EXPIRED_GRACE_DAYS`: integer days
    /// - `SHELFSIGHT_UPGRADE_URL`: upgrade-page URL
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.fail_open.is_none() {
            if let Ok(v) = std::env::var("SHELFSIGHT_FAIL_OPEN_LIMITS") {
                self.fail_open = Some(v == "1" || v.eq_ignore_ascii_case("true"));
            }
        }
        if self.expired_grace.is_none() {
            if let Some(days) = std::env::var("SHELFSIGHT_EXPIRED_GRACE_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
            {
                self.expired_grace = Some(Duration::days(days));
            }
        }
        if self.upgrade_url.is_none() {
            self.upgrade_url = std::env::var("SHELFSIGHT_UPGRADE_URL").ok();
        }
        self
    }

    /// Build the configuration, filling unset fields with defaults.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            fail_open: self.fail_open.unwrap_or(defaults.fail_open),
            expired_grace: self.expired_grace.unwrap_or(defaults.expired_grace),
            upgrade_url: self.upgrade_url.or(defaults.upgrade_url),
        }
    }
}
