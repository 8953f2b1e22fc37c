//! Schema Per Tenant
//!
//! Physical schema lifecycle: creation, existence checks and migrations.
//!
//! Backends implement [`SchemaProvider`]; [`SchemaStore`] layers idempotent
//! creation, ordered migration and name-scoped locking on top of it.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = SchemaStore::new(provider);
//!
//! // Create (if absent) and migrate under one lock
//! let outcome = store.provision("dps_kolkata").await?;
//! assert!(outcome.created);
//! ```

use crate::tenant::is_valid_schema_name;
use crate::{Result, TenancyError};
use async_trait::async_trait;
use campus_log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One versioned step of the tenant schema's structure.
///
/// `sql` may reference the target schema as `{schema}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Strictly increasing version number
    pub version: u32,
    /// Short name for logs and bookkeeping
    pub name: &'static str,
    /// SQL body
    pub sql: &'static str,
}

impl Migration {
    /// Create a migration
    pub const fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    /// SQL with `{schema}` replaced by the schema name.
    pub fn render(&self, schema_name: &str) -> String {
        self.sql.replace("{schema}", schema_name)
    }
}

/// Structure every tenant schema is migrated to.
pub static TENANT_MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "create_users",
        r#"CREATE TABLE "{schema}".users (
            id            UUID PRIMARY KEY,
            email         VARCHAR(255) NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role          VARCHAR(32) NOT NULL,
            first_name    VARCHAR(150) NOT NULL DEFAULT '',
            last_name     VARCHAR(150) NOT NULL DEFAULT '',
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    ),
    Migration::new(
        2,
        "create_tenant_settings",
        r#"CREATE TABLE "{schema}".tenant_settings (
            id            SMALLINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
            academic_year VARCHAR(16),
            language      VARCHAR(16) NOT NULL DEFAULT 'en',
            currency      VARCHAR(8) NOT NULL DEFAULT 'INR',
            timezone      VARCHAR(64) NOT NULL DEFAULT 'Asia/Kolkata',
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        INSERT INTO "{schema}".tenant_settings (id) VALUES (1)"#,
    ),
    Migration::new(
        3,
        "index_users_role",
        r#"CREATE INDEX users_role_idx ON "{schema}".users (role)"#,
    ),
];

/// What a schema name currently refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    /// Nothing by that name exists
    Absent,
    /// A managed tenant schema
    Tenant,
    /// Something else owns the name
    Foreign,
}

/// Schema backend trait
///
/// Implementations talk to the actual database. Each call must be atomic:
/// `create_schema` leaves either a complete managed schema or nothing, and
/// `apply_migration` records the version only if the migration succeeded.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Classify a schema name
    async fn inspect(&self, schema_name: &str) -> Result<SchemaState>;

    /// Create a managed schema with its migration bookkeeping
    async fn create_schema(&self, schema_name: &str) -> Result<()>;

    /// Drop a schema and everything in it
    async fn drop_schema(&self, schema_name: &str) -> Result<()>;

    /// Migration versions already applied to a schema
    async fn applied_versions(&self, schema_name: &str) -> Result<BTreeSet<u32>>;

    /// Apply one migration and record its version
    async fn apply_migration(&self, schema_name: &str, migration: &Migration) -> Result<()>;

    /// Names of all managed tenant schemas
    async fn tenant_schemas(&self) -> Result<Vec<String>>;
}

/// Result of [`SchemaStore::ensure_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// Whether this call created the schema
    pub created: bool,
}

/// Result of [`SchemaStore::provision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// Whether this call created the schema
    pub created: bool,
    /// Migration versions applied by this call
    pub applied: Vec<u32>,
}

/// Tenant schema manager
pub struct SchemaStore {
    provider: Arc<dyn SchemaProvider>,
    migrations: Vec<Migration>,
    locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SchemaStore {
    /// Create a schema store using the built-in tenant migrations.
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self {
            provider,
            migrations: TENANT_MIGRATIONS.to_vec(),
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Replace the migration set.
    pub fn with_migrations(mut self, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        self.migrations = migrations;
        self
    }

    /// Backend in use
    pub fn provider(&self) -> &Arc<dyn SchemaProvider> {
        &self.provider
    }

    /// Migration set in version order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Classify a schema name
    pub async fn state(&self, schema_name: &str) -> Result<SchemaState> {
        self.provider.inspect(schema_name).await
    }

    /// Check if a managed tenant schema exists
    pub async fn exists(&self, schema_name: &str) -> Result<bool> {
        Ok(self.state(schema_name).await? == SchemaState::Tenant)
    }

    /// Names of all managed tenant schemas
    pub async fn tenant_schemas(&self) -> Result<Vec<String>> {
        let mut names = self.provider.tenant_schemas().await?;
        names.sort();
        Ok(names)
    }

    /// Create the schema if it does not exist yet.
    ///
    /// Calling this again for the same name is a no-op. A name held by
    /// something other than a tenant schema fails with `SchemaCreation`.
    pub async fn ensure_schema(&self, schema_name: &str) -> Result<EnsureOutcome> {
        let _guard = self.lock(schema_name).await;
        self.ensure_locked(schema_name).await
    }

    /// Bring a schema up to the latest migration, returning the versions applied.
    pub async fn apply_pending_migrations(&self, schema_name: &str) -> Result<Vec<u32>> {
        let _guard = self.lock(schema_name).await;
        self.migrate_locked(schema_name).await
    }

    /// Ensure and migrate a schema as one unit.
    ///
    /// If migration fails on a schema this call created, the schema is
    /// dropped again so no half-built schema is left behind.
    pub async fn provision(&self, schema_name: &str) -> Result<ProvisionOutcome> {
        let _guard = self.lock(schema_name).await;

        let EnsureOutcome { created } = self.ensure_locked(schema_name).await?;
        match self.migrate_locked(schema_name).await {
            Ok(applied) => Ok(ProvisionOutcome { created, applied }),
            Err(err) => {
                if created {
                    warn!("Discarding schema '{}' after failed migration", schema_name);
                    if let Err(drop_err) = self.provider.drop_schema(schema_name).await {
                        warn!("Could not drop schema '{}': {}", schema_name, drop_err);
                    }
                }
                Err(err)
            }
        }
    }

    async fn ensure_locked(&self, schema_name: &str) -> Result<EnsureOutcome> {
        if !is_valid_schema_name(schema_name) {
            return Err(TenancyError::SchemaCreation {
                schema: schema_name.to_string(),
                reason: "invalid schema identifier".to_string(),
            });
        }

        match self.provider.inspect(schema_name).await? {
            SchemaState::Tenant => Ok(EnsureOutcome { created: false }),
            SchemaState::Foreign => Err(TenancyError::SchemaCreation {
                schema: schema_name.to_string(),
                reason: "name is taken by a schema that is not a tenant schema".to_string(),
            }),
            SchemaState::Absent => {
                self.provider
                    .create_schema(schema_name)
                    .await
                    .map_err(|e| match e {
                        TenancyError::SchemaCreation { .. } => e,
                        other => TenancyError::SchemaCreation {
                            schema: schema_name.to_string(),
                            reason: other.to_string(),
                        },
                    })?;
                debug!("Created schema '{}'", schema_name);
                Ok(EnsureOutcome { created: true })
            }
        }
    }

    async fn migrate_locked(&self, schema_name: &str) -> Result<Vec<u32>> {
        if self.provider.inspect(schema_name).await? != SchemaState::Tenant {
            return Err(TenancyError::UnknownTenant(schema_name.to_string()));
        }

        let done = self.provider.applied_versions(schema_name).await?;
        let mut applied = Vec::new();

        for migration in self.migrations.iter().filter(|m| !done.contains(&m.version)) {
            self.provider
                .apply_migration(schema_name, migration)
                .await
                .map_err(|e| match e {
                    TenancyError::Migration { .. } => e,
                    other => TenancyError::Migration {
                        schema: schema_name.to_string(),
                        version: migration.version,
                        reason: other.to_string(),
                    },
                })?;
            debug!(
                "Applied migration {} ({}) to '{}'",
                migration.version, migration.name, schema_name
            );
            applied.push(migration.version);
        }

        Ok(applied)
    }

    async fn lock(&self, schema_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(schema_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("migrations", &self.migrations.len())
            .finish_non_exhaustive()
    }
}
