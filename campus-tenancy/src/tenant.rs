//! Tenant descriptors and records
//!
//! A [`TenantDescriptor`] is the desired state of one school as read from
//! configuration. A [`TenantRecord`] is what the registry stores for it.

use crate::config::TenancyConfig;
use crate::{Result, TenancyError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

static SCHEMA_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("schema name pattern is valid")
});

static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("domain pattern is valid")
});

/// Whether `name` is usable as a schema identifier.
pub(crate) fn is_valid_schema_name(name: &str) -> bool {
    SCHEMA_NAME_REGEX.is_match(name)
}

/// Open extension fields carried alongside the fixed descriptor fields.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Tenant lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Paying, fully operational tenant
    Active,
    /// Operational during an evaluation period
    Trial,
    /// Blocked from serving requests
    Suspended,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Trial => write!(f, "trial"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "suspended" => Ok(Self::Suspended),
            other => Err(TenancyError::InvalidDescriptor(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// Desired state of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    /// Schema name; the tenant's stable identity
    #[serde(alias = "schema")]
    pub schema_name: String,

    /// Display name
    pub name: String,

    /// Routing domain, unique across tenants
    pub domain: String,

    /// Lifecycle status
    pub status: TenantStatus,

    /// Any other keys from the source record
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl TenantDescriptor {
    /// Create a descriptor with no extension attributes.
    ///
    /// # Examples
    ///
    /// ```
    /// use campus_tenancy::{TenantDescriptor, TenantStatus};
    ///
    /// let descriptor = TenantDescriptor::new(
    ///     "dps_kolkata",
    ///     "Delhi Public School Kolkata",
    ///     "dpskolkata.localhost",
    ///     TenantStatus::Active,
    /// );
    /// assert!(descriptor.attributes.is_empty());
    /// ```
    pub fn new(
        schema_name: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
        status: TenantStatus,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            name: name.into(),
            domain: domain.into(),
            status,
            attributes: Attributes::new(),
        }
    }

    /// Add an extension attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Parse one loosely-typed configuration record.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| TenancyError::InvalidDescriptor(e.to_string()))
    }

    /// Check required fields and normalize the domain.
    pub fn validate(mut self, config: &TenancyConfig) -> Result<Self> {
        if self.schema_name.is_empty() {
            return Err(TenancyError::InvalidDescriptor(
                "schema_name is required".to_string(),
            ));
        }
        if !is_valid_schema_name(&self.schema_name) {
            return Err(TenancyError::InvalidDescriptor(format!(
                "schema_name '{}' must be lowercase letters, digits or '_' and start with a letter",
                self.schema_name
            )));
        }
        if config.is_reserved(&self.schema_name) {
            return Err(TenancyError::InvalidDescriptor(format!(
                "schema_name '{}' is reserved",
                self.schema_name
            )));
        }

        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(TenancyError::InvalidDescriptor(format!(
                "{}: name is required",
                self.schema_name
            )));
        }

        self.domain = self.domain.trim().to_lowercase();
        if self.domain.is_empty() {
            return Err(TenancyError::InvalidDescriptor(format!(
                "{}: domain is required",
                self.schema_name
            )));
        }
        if !DOMAIN_REGEX.is_match(&self.domain) {
            return Err(TenancyError::InvalidDescriptor(format!(
                "{}: '{}' is not a valid domain",
                self.schema_name, self.domain
            )));
        }

        Ok(self)
    }
}

/// A tenant as persisted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Internal identifier
    pub id: Uuid,
    /// Schema name
    pub schema_name: String,
    /// Display name
    pub name: String,
    /// Routing domain
    pub domain: String,
    /// Lifecycle status
    pub status: TenantStatus,
    /// Extension attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Build a fresh record from a validated descriptor.
    pub fn from_descriptor(descriptor: &TenantDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            schema_name: descriptor.schema_name.clone(),
            name: descriptor.name.clone(),
            domain: descriptor.domain.clone(),
            status: descriptor.status,
            attributes: descriptor.attributes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every mutable field already equals the descriptor's.
    pub fn matches(&self, descriptor: &TenantDescriptor) -> bool {
        self.name == descriptor.name
            && self.domain == descriptor.domain
            && self.status == descriptor.status
            && self.attributes == descriptor.attributes
    }

    /// Overwrite mutable fields from the descriptor and bump `updated_at`.
    pub fn apply(&mut self, descriptor: &TenantDescriptor) {
        self.name = descriptor.name.clone();
        self.domain = descriptor.domain.clone();
        self.status = descriptor.status;
        self.attributes = descriptor.attributes.clone();
        self.updated_at = Utc::now();
    }

    /// Check if the tenant may serve requests
    pub fn is_active(&self) -> bool {
        self.status != TenantStatus::Suspended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> TenancyConfig {
        TenancyConfig::default()
    }

    #[test]
    fn test_parse_with_attributes() {
        let descriptor = TenantDescriptor::from_value(json!({
            "schema_name": "dps_kolkata",
            "name": "DPS Kolkata",
            "domain": "dpskolkata.localhost",
            "status": "trial",
            "plan": "premium",
            "max_users": 200
        }))
        .unwrap();

        assert_eq!(descriptor.status, TenantStatus::Trial);
        assert_eq!(descriptor.attributes.len(), 2);
        assert_eq!(descriptor.attributes.get("plan"), Some(&json!("premium")));
    }

    #[test]
    fn test_schema_alias() {
        let descriptor = TenantDescriptor::from_value(json!({
            "schema": "kendriya",
            "name": "Kendriya Vidyalaya",
            "domain": "kvd1delhi.localhost",
            "status": "active"
        }))
        .unwrap();
        assert_eq!(descriptor.schema_name, "kendriya");
    }

    #[test]
    fn test_missing_field_is_invalid_descriptor() {
        let err = TenantDescriptor::from_value(json!({
            "schema_name": "kendriya",
            "name": "Kendriya Vidyalaya",
            "status": "active"
        }))
        .unwrap_err();

        assert!(matches!(err, TenancyError::InvalidDescriptor(_)));
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn test_validate_normalizes_domain() {
        let descriptor = TenantDescriptor::new(
            "dps_kolkata",
            "  DPS Kolkata ",
            " DPSKolkata.Localhost ",
            TenantStatus::Active,
        )
        .validate(&config())
        .unwrap();

        assert_eq!(descriptor.domain, "dpskolkata.localhost");
        assert_eq!(descriptor.name, "DPS Kolkata");
    }

    #[test]
    fn test_validate_rejects_bad_schema_names() {
        for bad in ["", "DPS", "1school", "has-dash", "public", "pg_temp"] {
            let result = TenantDescriptor::new(bad, "School", "school.localhost", TenantStatus::Active)
                .validate(&config());
            assert!(
                matches!(result, Err(TenancyError::InvalidDescriptor(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_domain() {
        let result = TenantDescriptor::new("school", "School", "not a domain", TenantStatus::Active)
            .validate(&config());
        assert!(matches!(result, Err(TenancyError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_record_matches_and_apply() {
        let descriptor =
            TenantDescriptor::new("school", "School", "school.localhost", TenantStatus::Active);
        let mut record = TenantRecord::from_descriptor(&descriptor);
        assert!(record.matches(&descriptor));

        let changed = descriptor
            .clone()
            .with_attribute("plan", json!("basic"));
        assert!(!record.matches(&changed));

        let before = record.updated_at;
        record.apply(&changed);
        assert!(record.matches(&changed));
        assert!(record.updated_at >= before);
        assert_eq!(record.created_at, before);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Suspended".parse::<TenantStatus>().unwrap(), TenantStatus::Suspended);
        assert!("closed".parse::<TenantStatus>().is_err());
    }
}
