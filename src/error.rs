//! Error types for the entitlement engine.
//!
//! Policy denials are *not* errors: they are ordinary [`Verdict`](crate::gate::Verdict)
//! values with a reason code. Errors here cover missing or inconsistent data
//! and storage-collaborator failures.

/// The error type for entitlement evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    /// The tenant record does not exist. The engine never guesses a default tier.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// A tenant references an organization that no longer exists.
    /// This is a data-integrity problem and is surfaced, never swallowed.
    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    /// An unrecognized tier key. Treated as a hard validation failure,
    /// never silently mapped to the lowest tier.
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    /// A read from the persistence collaborator failed.
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EntitlementError {
    /// Check whether this error came from the storage collaborator
    /// (as opposed to a data-validation failure).
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EntitlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EntitlementError::TenantNotFound("t_123".to_string());
        assert_eq!(err.to_string(), "Tenant not found: t_123");

        let err = EntitlementError::InvalidTier("platinum".to_string());
        assert_eq!(err.to_string(), "Invalid tier: platinum");
    }

    #[test]
    fn test_is_storage() {
        let err = EntitlementError::Storage(anyhow::anyhow!("connection reset"));
        assert!(err.is_storage());

        let err = EntitlementError::OrganizationNotFound("org_1".to_string());
        assert!(!err.is_storage());
    }
}
