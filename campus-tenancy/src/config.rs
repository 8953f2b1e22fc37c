//! Engine configuration

use crate::password::{HashAlgorithm, PasswordPolicy};
use serde::{Deserialize, Serialize};

/// Configuration shared by the tenancy components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Schema bound when no tenant operation is in progress
    pub default_schema: String,

    /// Schema names tenants may never claim (`pg_*` is always reserved)
    pub reserved_schemas: Vec<String>,

    /// Password strength rules for provisioned accounts
    pub password: PasswordPolicy,

    /// Algorithm for newly hashed passwords
    pub hash_algorithm: HashAlgorithm,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            default_schema: "public".to_string(),
            reserved_schemas: vec!["public".to_string(), "information_schema".to_string()],
            password: PasswordPolicy::default(),
            hash_algorithm: HashAlgorithm::Argon2,
        }
    }
}

impl TenancyConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default schema
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Set the password policy
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password = policy;
        self
    }

    /// Set the hash algorithm
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Whether `name` is reserved for the database itself.
    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with("pg_")
            || name == self.default_schema
            || self.reserved_schemas.iter().any(|r| r == name)
    }
}
