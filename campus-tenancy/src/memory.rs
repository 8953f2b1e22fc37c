//! In-memory backend
//!
//! Stores for tenants, schemas and users that live in process memory.
//! [`MemoryBackend`] bundles them and can persist a JSON snapshot, which
//! lets the CLI run without a database. The schema provider supports
//! fault injection for exercising rollback paths.

use crate::context::TenantScope;
use crate::registry::TenantStore;
use crate::schema::{Migration, SchemaProvider, SchemaState};
use crate::tenant::TenantRecord;
use crate::users::{UserRecord, UserStore};
use crate::{Result, TenancyError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// In-memory tenant record store
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    records: RwLock<BTreeMap<String, TenantRecord>>,
}

impl InMemoryTenantStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn from_records(records: Vec<TenantRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.schema_name.clone(), r))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get(&self, schema_name: &str) -> Result<Option<TenantRecord>> {
        Ok(self.records.read().get(schema_name).cloned())
    }

    async fn get_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.domain == domain)
            .cloned())
    }

    async fn insert(&self, record: &TenantRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.schema_name) {
            return Err(TenancyError::Storage(format!(
                "tenant '{}' already exists",
                record.schema_name
            )));
        }
        records.insert(record.schema_name.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &TenantRecord) -> Result<()> {
        match self.records.write().get_mut(&record.schema_name) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(TenancyError::Storage(format!(
                "tenant '{}' does not exist",
                record.schema_name
            ))),
        }
    }

    async fn remove(&self, schema_name: &str) -> Result<()> {
        self.records.write().remove(schema_name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct Faults {
    migrations: BTreeSet<u32>,
    creates: BTreeSet<String>,
}

/// In-memory schema provider
///
/// Tracks tenant schemas with their applied migration versions, plus
/// foreign names that block schema creation.
#[derive(Debug, Default)]
pub struct InMemorySchemaProvider {
    schemas: RwLock<BTreeMap<String, BTreeSet<u32>>>,
    foreign: RwLock<BTreeSet<String>>,
    faults: RwLock<Faults>,
}

impl InMemorySchemaProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy a name with a non-tenant schema
    pub fn add_foreign_schema(&self, name: &str) {
        self.foreign.write().insert(name.to_string());
    }

    /// Create a managed schema directly, as if left behind by an earlier run
    pub fn add_tenant_schema(&self, name: &str) {
        self.schemas.write().entry(name.to_string()).or_default();
    }

    /// Make every application of migration `version` fail
    pub fn fail_migration(&self, version: u32) {
        self.faults.write().migrations.insert(version);
    }

    /// Make creation of schema `name` fail
    pub fn fail_create(&self, name: &str) {
        self.faults.write().creates.insert(name.to_string());
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }
}

#[async_trait]
impl SchemaProvider for InMemorySchemaProvider {
    async fn inspect(&self, schema_name: &str) -> Result<SchemaState> {
        if self.schemas.read().contains_key(schema_name) {
            Ok(SchemaState::Tenant)
        } else if self.foreign.read().contains(schema_name) {
            Ok(SchemaState::Foreign)
        } else {
            Ok(SchemaState::Absent)
        }
    }

    async fn create_schema(&self, schema_name: &str) -> Result<()> {
        if self.faults.read().creates.contains(schema_name) {
            return Err(TenancyError::SchemaCreation {
                schema: schema_name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        if self.foreign.read().contains(schema_name) {
            return Err(TenancyError::SchemaCreation {
                schema: schema_name.to_string(),
                reason: "name already in use".to_string(),
            });
        }
        self.schemas
            .write()
            .entry(schema_name.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_schema(&self, schema_name: &str) -> Result<()> {
        self.schemas.write().remove(schema_name);
        Ok(())
    }

    async fn applied_versions(&self, schema_name: &str) -> Result<BTreeSet<u32>> {
        self.schemas
            .read()
            .get(schema_name)
            .cloned()
            .ok_or_else(|| TenancyError::UnknownTenant(schema_name.to_string()))
    }

    async fn apply_migration(&self, schema_name: &str, migration: &Migration) -> Result<()> {
        if self.faults.read().migrations.contains(&migration.version) {
            return Err(TenancyError::Migration {
                schema: schema_name.to_string(),
                version: migration.version,
                reason: "injected failure".to_string(),
            });
        }
        match self.schemas.write().get_mut(schema_name) {
            Some(applied) => {
                applied.insert(migration.version);
                Ok(())
            }
            None => Err(TenancyError::UnknownTenant(schema_name.to_string())),
        }
    }

    async fn tenant_schemas(&self) -> Result<Vec<String>> {
        Ok(self.schemas.read().keys().cloned().collect())
    }
}

/// In-memory per-schema user store
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<String, BTreeMap<String, UserRecord>>>,
}

impl InMemoryUserStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users stored for a schema, bypassing the context check
    pub fn count(&self, schema_name: &str) -> usize {
        self.users.read().get(schema_name).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, scope: &TenantScope, email: &str) -> Result<Option<UserRecord>> {
        let schema = scope.verify()?;
        Ok(self
            .users
            .read()
            .get(schema)
            .and_then(|users| users.get(email))
            .cloned())
    }

    async fn insert(&self, scope: &TenantScope, record: &UserRecord) -> Result<()> {
        let schema = scope.verify()?;
        let mut users = self.users.write();
        let table = users.entry(schema.to_string()).or_default();
        if table.contains_key(&record.email) {
            return Err(TenancyError::Storage(format!(
                "user '{}' already exists in '{}'",
                record.email, schema
            )));
        }
        table.insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, scope: &TenantScope, record: &UserRecord) -> Result<()> {
        let schema = scope.verify()?;
        match self
            .users
            .write()
            .get_mut(schema)
            .and_then(|users| users.get_mut(&record.email))
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(TenancyError::Storage(format!(
                "user '{}' does not exist in '{}'",
                record.email, schema
            ))),
        }
    }

    async fn list(&self, scope: &TenantScope) -> Result<Vec<UserRecord>> {
        let schema = scope.verify()?;
        Ok(self
            .users
            .read()
            .get(schema)
            .map(|users| users.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Serializable state of a [`MemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySnapshot {
    /// Tenant records
    pub tenants: Vec<TenantRecord>,
    /// Tenant schemas and their applied migration versions
    pub schemas: BTreeMap<String, BTreeSet<u32>>,
    /// Names held by non-tenant schemas
    pub foreign_schemas: BTreeSet<String>,
    /// Users per schema
    pub users: BTreeMap<String, Vec<UserRecord>>,
}

/// In-memory stores for all three concerns, shared by `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tenants: Arc<InMemoryTenantStore>,
    schemas: Arc<InMemorySchemaProvider>,
    users: Arc<InMemoryUserStore>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Tenant record store
    pub fn tenants(&self) -> Arc<InMemoryTenantStore> {
        Arc::clone(&self.tenants)
    }

    /// Schema provider
    pub fn schemas(&self) -> Arc<InMemorySchemaProvider> {
        Arc::clone(&self.schemas)
    }

    /// User store
    pub fn users(&self) -> Arc<InMemoryUserStore> {
        Arc::clone(&self.users)
    }

    /// Capture the current state
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            tenants: self.tenants.records.read().values().cloned().collect(),
            schemas: self.schemas.schemas.read().clone(),
            foreign_schemas: self.schemas.foreign.read().clone(),
            users: self
                .users
                .users
                .read()
                .iter()
                .map(|(schema, users)| (schema.clone(), users.values().cloned().collect()))
                .collect(),
        }
    }

    /// Rebuild a backend from a snapshot
    pub fn restore(snapshot: MemorySnapshot) -> Self {
        let users = snapshot
            .users
            .into_iter()
            .map(|(schema, users)| {
                let table = users.into_iter().map(|u| (u.email.clone(), u)).collect();
                (schema, table)
            })
            .collect();

        Self {
            tenants: Arc::new(InMemoryTenantStore::from_records(snapshot.tenants)),
            schemas: Arc::new(InMemorySchemaProvider {
                schemas: RwLock::new(snapshot.schemas),
                foreign: RwLock::new(snapshot.foreign_schemas),
                faults: RwLock::new(Faults::default()),
            }),
            users: Arc::new(InMemoryUserStore {
                users: RwLock::new(users),
            }),
        }
    }

    /// Load a state file; a missing file yields an empty backend.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TenancyError::Storage(format!("cannot read state file {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let snapshot: MemorySnapshot = serde_json::from_str(&content).map_err(|e| {
            TenancyError::Storage(format!("corrupt state file {}: {}", path.display(), e))
        })?;
        Ok(Self::restore(snapshot))
    }

    /// Write the current state to a file as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TenancyError::Storage(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| TenancyError::Storage(format!("cannot encode state: {}", e)))?;
        std::fs::write(path, json).map_err(|e| {
            TenancyError::Storage(format!("cannot write state file {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{TenantDescriptor, TenantStatus};

    fn record(schema: &str) -> TenantRecord {
        TenantRecord::from_descriptor(&TenantDescriptor::new(
            schema,
            "School",
            format!("{}.localhost", schema),
            TenantStatus::Active,
        ))
    }

    #[tokio::test]
    async fn test_tenant_store_insert_twice_fails() {
        let store = InMemoryTenantStore::new();
        store.insert(&record("alpha")).await.unwrap();
        assert!(store.insert(&record("alpha")).await.is_err());
        assert!(store.get_by_domain("alpha.localhost").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_schema_states() {
        let provider = InMemorySchemaProvider::new();
        provider.add_foreign_schema("audit");
        provider.create_schema("alpha").await.unwrap();

        assert_eq!(provider.inspect("alpha").await.unwrap(), SchemaState::Tenant);
        assert_eq!(provider.inspect("audit").await.unwrap(), SchemaState::Foreign);
        assert_eq!(provider.inspect("beta").await.unwrap(), SchemaState::Absent);
        assert!(provider.create_schema("audit").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_create_failure() {
        let provider = InMemorySchemaProvider::new();
        provider.fail_create("alpha");
        assert!(provider.create_schema("alpha").await.is_err());

        provider.clear_faults();
        assert!(provider.create_schema("alpha").await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("campus.json");

        let backend = MemoryBackend::new();
        backend.tenants().insert(&record("alpha")).await.unwrap();
        backend.schemas().create_schema("alpha").await.unwrap();
        backend.schemas().add_foreign_schema("audit");
        backend.save(&path).unwrap();

        let restored = MemoryBackend::load(&path).unwrap();
        assert_eq!(restored.snapshot(), backend.snapshot());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(backend.snapshot(), MemorySnapshot::default());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            MemoryBackend::load(&path),
            Err(TenancyError::Storage(_))
        ));
    }
}
