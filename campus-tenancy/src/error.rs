//! Tenancy errors
//!
//! One error type for the whole engine. Batch operations downgrade
//! entry-level errors into report entries; the rest propagate.

use thiserror::Error;

/// Errors raised by the tenancy engine.
#[derive(Debug, Error)]
pub enum TenancyError {
    /// A tenant descriptor is missing a required field or carries a bad value.
    #[error("Invalid tenant descriptor: {0}")]
    InvalidDescriptor(String),

    /// Another tenant already owns the domain.
    #[error("Domain '{domain}' is already registered to tenant '{owner}'")]
    DuplicateDomain { domain: String, owner: String },

    /// The schema could not be created.
    #[error("Failed to create schema '{schema}': {reason}")]
    SchemaCreation { schema: String, reason: String },

    /// A migration could not be applied to a schema.
    #[error("Migration {version} failed on schema '{schema}': {reason}")]
    Migration {
        schema: String,
        version: u32,
        reason: String,
    },

    /// A managed schema exists without a tenant record.
    #[error("Schema '{0}' exists without a tenant record; resolve it manually")]
    OrphanedSchema(String),

    /// No tenant schema with that name exists.
    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    /// The tenant exists but is suspended.
    #[error("Tenant '{0}' is suspended")]
    SuspendedTenant(String),

    /// A tenant context was requested while another one is active.
    #[error("Tenant context '{active}' is active; refusing to enter '{requested}'")]
    ReentrantContext { active: String, requested: String },

    /// A scope handle was used after its context was restored.
    #[error("Tenant scope for '{0}' used outside of its context")]
    StaleScope(String),

    /// A password was rejected by the strength policy.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A user descriptor is malformed.
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// The underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TenancyError {
    /// Stable snake_case label used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "invalid_descriptor",
            Self::DuplicateDomain { .. } => "duplicate_domain",
            Self::SchemaCreation { .. } => "schema_creation",
            Self::Migration { .. } => "migration",
            Self::OrphanedSchema(_) => "orphaned_schema",
            Self::UnknownTenant(_) => "unknown_tenant",
            Self::SuspendedTenant(_) => "suspended_tenant",
            Self::ReentrantContext { .. } => "reentrant_context",
            Self::StaleScope(_) => "stale_scope",
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::InvalidUser(_) => "invalid_user",
            Self::Storage(_) => "storage",
        }
    }

    /// Whether a batch may record this error against one entry and carry on.
    ///
    /// Context errors are never entry-level: they mean the caller cannot
    /// trust which schema it is bound to.
    pub fn is_entry_level(&self) -> bool {
        !matches!(
            self,
            Self::UnknownTenant(_) | Self::ReentrantContext { .. } | Self::StaleScope(_)
        )
    }
}

/// Result alias for tenancy operations.
pub type Result<T> = std::result::Result<T, TenancyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_errors_propagate() {
        assert!(!TenancyError::UnknownTenant("x".into()).is_entry_level());
        assert!(
            !TenancyError::ReentrantContext {
                active: "a".into(),
                requested: "b".into()
            }
            .is_entry_level()
        );
        assert!(!TenancyError::StaleScope("x".into()).is_entry_level());
    }

    #[test]
    fn test_batch_errors_are_entry_level() {
        assert!(TenancyError::InvalidDescriptor("x".into()).is_entry_level());
        assert!(TenancyError::InvalidCredentials("short".into()).is_entry_level());
        assert!(
            TenancyError::Migration {
                schema: "s".into(),
                version: 1,
                reason: "boom".into()
            }
            .is_entry_level()
        );
    }

    #[test]
    fn test_kind_labels() {
        let err = TenancyError::DuplicateDomain {
            domain: "a.localhost".into(),
            owner: "a".into(),
        };
        assert_eq!(err.kind(), "duplicate_domain");
        assert_eq!(
            err.to_string(),
            "Domain 'a.localhost' is already registered to tenant 'a'"
        );
    }
}
