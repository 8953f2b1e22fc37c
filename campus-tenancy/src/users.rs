//! User Provisioning
//!
//! Creates and updates privileged accounts inside one tenant schema. A
//! whole batch runs in a single tenant context; each user is matched by
//! email and created, updated or left alone.

use crate::config::TenancyConfig;
use crate::context::{ContextSwitcher, TenantScope};
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::registry::UpsertOutcome;
use crate::report::{EntryOutcome, UserSyncReport};
use crate::{Result, TenancyError};
use async_trait::async_trait;
use campus_log::{info, warn};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full control over the tenant
    SuperAdmin,
    /// School administrator
    #[default]
    Admin,
    /// Office staff
    Staff,
    /// Teaching staff
    Teacher,
}

impl UserRole {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "teacher" => Ok(Self::Teacher),
            other => Err(TenancyError::InvalidUser(format!("unknown role '{}'", other))),
        }
    }
}

/// Desired state of one account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    /// Login email, unique within a schema
    pub email: String,
    /// Plaintext password
    pub password: String,
    /// Account role
    #[serde(default)]
    pub role: UserRole,
    /// Given name; left as stored when absent
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name; left as stored when absent
    #[serde(default)]
    pub last_name: Option<String>,
}

impl UserDescriptor {
    /// Create a descriptor without names
    pub fn new(email: impl Into<String>, password: impl Into<String>, role: UserRole) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            role,
            first_name: None,
            last_name: None,
        }
    }

    /// Set both names
    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }

    /// Trim and lowercase the email, then check its shape.
    pub fn normalize(mut self) -> Result<Self> {
        self.email = self.email.trim().to_lowercase();
        if self.email.is_empty() {
            return Err(TenancyError::InvalidUser("email is required".to_string()));
        }
        if !EMAIL_REGEX.is_match(&self.email) {
            return Err(TenancyError::InvalidUser(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        self.first_name = self.first_name.map(|n| n.trim().to_string());
        self.last_name = self.last_name.map(|n| n.trim().to_string());
        Ok(self)
    }
}

impl std::fmt::Debug for UserDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDescriptor")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Users destined for one schema, as read from a users file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    /// Target tenant schema
    #[serde(alias = "schema")]
    pub schema_name: String,
    /// Accounts to sync
    #[serde(default)]
    pub users: Vec<UserDescriptor>,
}

/// An account stored in a tenant schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Internal identifier
    pub id: Uuid,
    /// Login email
    pub email: String,
    /// Password hash (argon2 or bcrypt)
    pub password_hash: String,
    /// Account role
    pub role: UserRole,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Whether the account may log in
    pub is_active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Display name, falling back to the email
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Per-schema user persistence.
///
/// Every call takes the [`TenantScope`] of the running operation and must
/// reject it with `StaleScope` if it is no longer the active context.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by (normalized) email
    async fn find_by_email(&self, scope: &TenantScope, email: &str) -> Result<Option<UserRecord>>;

    /// Insert a new user
    async fn insert(&self, scope: &TenantScope, record: &UserRecord) -> Result<()>;

    /// Replace an existing user
    async fn update(&self, scope: &TenantScope, record: &UserRecord) -> Result<()>;

    /// All users of the scope's schema, sorted by email
    async fn list(&self, scope: &TenantScope) -> Result<Vec<UserRecord>>;
}

/// Upserts privileged accounts into tenant schemas.
pub struct UserProvisioner {
    switcher: Arc<ContextSwitcher>,
    store: Arc<dyn UserStore>,
    policy: PasswordPolicy,
    hasher: PasswordHasher,
}

impl UserProvisioner {
    /// Create a provisioner
    pub fn new(
        switcher: Arc<ContextSwitcher>,
        store: Arc<dyn UserStore>,
        config: &TenancyConfig,
    ) -> Self {
        Self {
            switcher,
            store,
            policy: config.password.clone(),
            hasher: PasswordHasher::new(config.hash_algorithm),
        }
    }

    /// Sync a batch of users into one schema.
    ///
    /// The batch runs inside a single tenant context. Rejected users are
    /// recorded in the report; context errors abort the whole batch.
    pub async fn sync_users(
        &self,
        schema_name: &str,
        users: Vec<UserDescriptor>,
    ) -> Result<UserSyncReport> {
        self.switcher
            .with_tenant(schema_name, |scope| async move {
                let mut report = UserSyncReport::new(scope.schema_name());

                for user in users {
                    let key = user.email.trim().to_lowercase();
                    match self.upsert(&scope, user).await {
                        Ok((record, outcome)) => {
                            info!(
                                "User '{}' in '{}': {:?}",
                                record.email,
                                scope.schema_name(),
                                outcome
                            );
                            report.record(record.email, entry_outcome(outcome));
                        }
                        Err(err) if err.is_entry_level() => {
                            warn!("User '{}' in '{}' failed: {}", key, scope.schema_name(), err);
                            report.record(key, EntryOutcome::failed(&err));
                        }
                        Err(err) => return Err(err),
                    }
                }

                Ok(report)
            })
            .await
    }

    /// Create or update exactly one user.
    ///
    /// Names default to "Super" / "Admin" when not given.
    pub async fn create_one(
        &self,
        schema_name: &str,
        email: &str,
        password: &str,
        role: UserRole,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<UserRecord> {
        let descriptor = UserDescriptor::new(email, password, role)
            .with_names(first_name.unwrap_or("Super"), last_name.unwrap_or("Admin"));

        self.switcher
            .with_tenant(schema_name, |scope| async move {
                let upserted = self.upsert(&scope, descriptor).await;
                if let Ok((record, outcome)) = &upserted {
                    info!(
                        "User '{}' in '{}': {:?}",
                        record.email,
                        scope.schema_name(),
                        outcome
                    );
                }
                upserted.map(|(record, _)| record)
            })
            .await
    }

    /// List the users of a schema
    pub async fn list(&self, schema_name: &str) -> Result<Vec<UserRecord>> {
        self.switcher
            .with_tenant(schema_name, |scope| async move { self.store.list(&scope).await })
            .await
    }

    async fn upsert(
        &self,
        scope: &TenantScope,
        descriptor: UserDescriptor,
    ) -> Result<(UserRecord, UpsertOutcome)> {
        let user = descriptor.normalize()?;
        self.policy.check(&user.password)?;

        let Some(mut record) = self.store.find_by_email(scope, &user.email).await? else {
            let now = Utc::now();
            let record = UserRecord {
                id: Uuid::new_v4(),
                email: user.email,
                password_hash: self.hasher.hash(&user.password)?,
                role: user.role,
                first_name: user.first_name.unwrap_or_default(),
                last_name: user.last_name.unwrap_or_default(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            self.store.insert(scope, &record).await?;
            return Ok((record, UpsertOutcome::Created));
        };

        // A hash in an unknown format never matches; it gets replaced.
        let same_password = matches!(
            self.hasher.verify(&user.password, &record.password_hash),
            Ok(true)
        );
        let same_first = user.first_name.as_ref().is_none_or(|n| *n == record.first_name);
        let same_last = user.last_name.as_ref().is_none_or(|n| *n == record.last_name);

        if same_password && same_first && same_last && user.role == record.role {
            return Ok((record, UpsertOutcome::Unchanged));
        }

        if !same_password {
            record.password_hash = self.hasher.hash(&user.password)?;
        }
        record.role = user.role;
        if let Some(first_name) = user.first_name {
            record.first_name = first_name;
        }
        if let Some(last_name) = user.last_name {
            record.last_name = last_name;
        }
        record.updated_at = Utc::now();

        self.store.update(scope, &record).await?;
        Ok((record, UpsertOutcome::Updated))
    }
}

fn entry_outcome(outcome: UpsertOutcome) -> EntryOutcome {
    match outcome {
        UpsertOutcome::Created => EntryOutcome::Created,
        UpsertOutcome::Updated => EntryOutcome::Updated,
        UpsertOutcome::Unchanged => EntryOutcome::Unchanged,
    }
}

impl std::fmt::Debug for UserProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserProvisioner")
            .field("policy", &self.policy)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}
