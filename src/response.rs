//! Boundary serialization for denial verdicts.
//!
//! HTTP layers serialize denials into a conventional error body. Some
//! legacy API consumers read snake_case keys while newer ones read
//! camelCase; [`DenialResponse::dual_cased`] emits both spellings of every
//! key. The dual-casing lives here, at the boundary, and nowhere inside
//! the policy engine.

use serde::{Deserialize, Serialize};

use crate::gate::Verdict;
use crate::tiers::Tier;

/// The wire shape of a denial, as consumed by API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialResponse {
    /// The stable reason-code string, e.g. `"limitExceeded"`.
    pub error: String,
    /// Human-readable summary.
    pub message: String,
    /// Effective limit, for quantity denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Usage at evaluation time, for quantity denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    /// The cheapest tier that would satisfy the intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tier: Option<Tier>,
    /// Upgrade-page URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_url: Option<String>,
}

impl DenialResponse {
    /// Build a response from a verdict. `None` for allowed verdicts,
    /// which have no error body.
    #[must_use]
    pub fn from_verdict(verdict: &Verdict) -> Option<Self> {
        if verdict.allowed {
            return None;
        }
        Some(Self {
            error: verdict
                .reason_code
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "denied".to_string()),
            message: verdict.message.clone(),
            limit: verdict.limit,
            current: verdict.current,
            required_tier: verdict.required_tier,
            upgrade_url: verdict.upgrade_hint.clone(),
        })
    }

    /// Serialize with every key present in both camelCase and snake_case.
    ///
    /// Legacy consumers read snake_case keys; keep emitting both until
    /// the last of them migrates.
    #[must_use]
    pub fn dual_cased(&self) -> serde_json::Value {
        // Serializing a plain struct of scalars cannot fail.
        let value = serde_json::to_value(self).unwrap_or_default();
        let serde_json::Value::Object(map) = value else {
            return value;
        };
        let mut out = serde_json::Map::with_capacity(map.len() * 2);
        for (key, val) in map {
            let snake = camel_to_snake(&key);
            if snake != key {
                out.insert(snake, val.clone());
            }
            out.insert(key, val);
        }
        serde_json::Value::Object(out)
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
