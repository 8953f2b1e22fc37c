//! Tenant Registry
//!
//! Maps schema names to tenant metadata and decides, per descriptor,
//! whether a sync creates, updates or leaves a record alone.

use crate::tenant::{TenantDescriptor, TenantRecord};
use crate::{Result, TenancyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tenant record persistence (implement with your database)
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find a record by schema name
    async fn get(&self, schema_name: &str) -> Result<Option<TenantRecord>>;

    /// Find a record by domain
    async fn get_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>>;

    /// Insert a new record
    async fn insert(&self, record: &TenantRecord) -> Result<()>;

    /// Replace an existing record
    async fn update(&self, record: &TenantRecord) -> Result<()>;

    /// Remove a record
    async fn remove(&self, schema_name: &str) -> Result<()>;

    /// All records, sorted by schema name
    async fn list(&self) -> Result<Vec<TenantRecord>>;
}

/// What an upsert did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// A new record was inserted
    Created,
    /// An existing record was overwritten
    Updated,
    /// The record already matched
    Unchanged,
}

/// Record returned by [`TenantRegistry::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// The record as now stored
    pub record: TenantRecord,
    /// What happened
    pub outcome: UpsertOutcome,
}

impl Upserted {
    /// Whether the record was newly inserted
    pub fn was_created(&self) -> bool {
        self.outcome == UpsertOutcome::Created
    }

    /// Whether the registry content changed
    pub fn changed(&self) -> bool {
        self.outcome != UpsertOutcome::Unchanged
    }
}

/// Tenant registry
///
/// Enforces domain uniqueness on top of a [`TenantStore`].
#[derive(Clone)]
pub struct TenantRegistry {
    store: Arc<dyn TenantStore>,
}

impl TenantRegistry {
    /// Create a registry backed by `store`.
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    /// Look up a tenant by schema name.
    pub async fn find(&self, schema_name: &str) -> Result<Option<TenantRecord>> {
        self.store.get(schema_name).await
    }

    /// Look up a tenant by routing domain.
    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>> {
        self.store.get_by_domain(&domain.to_lowercase()).await
    }

    /// All tenants, sorted by schema name.
    pub async fn list(&self) -> Result<Vec<TenantRecord>> {
        let mut records = self.store.list().await?;
        records.sort_by(|a, b| a.schema_name.cmp(&b.schema_name));
        Ok(records)
    }

    /// Insert or update the record for a validated descriptor.
    ///
    /// Fails with `DuplicateDomain` when another tenant owns the domain;
    /// in that case nothing is written.
    pub async fn upsert(&self, descriptor: &TenantDescriptor) -> Result<Upserted> {
        if let Some(owner) = self.store.get_by_domain(&descriptor.domain).await? {
            if owner.schema_name != descriptor.schema_name {
                return Err(TenancyError::DuplicateDomain {
                    domain: descriptor.domain.clone(),
                    owner: owner.schema_name,
                });
            }
        }

        match self.store.get(&descriptor.schema_name).await? {
            None => {
                let record = TenantRecord::from_descriptor(descriptor);
                self.store.insert(&record).await?;
                Ok(Upserted {
                    record,
                    outcome: UpsertOutcome::Created,
                })
            }
            Some(record) if record.matches(descriptor) => Ok(Upserted {
                record,
                outcome: UpsertOutcome::Unchanged,
            }),
            Some(mut record) => {
                record.apply(descriptor);
                self.store.update(&record).await?;
                Ok(Upserted {
                    record,
                    outcome: UpsertOutcome::Updated,
                })
            }
        }
    }

    /// Remove a record inserted by a sync whose provisioning failed.
    pub(crate) async fn discard(&self, schema_name: &str) -> Result<()> {
        self.store.remove(schema_name).await
    }
}

impl std::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTenantStore;
    use crate::tenant::TenantStatus;

    fn registry() -> TenantRegistry {
        TenantRegistry::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn descriptor(schema: &str, domain: &str) -> TenantDescriptor {
        TenantDescriptor::new(schema, schema.to_uppercase(), domain, TenantStatus::Active)
    }

    #[tokio::test]
    async fn test_upsert_creates_then_unchanged() {
        let registry = registry();
        let d = descriptor("dps_kolkata", "dpskolkata.localhost");

        let first = registry.upsert(&d).await.unwrap();
        assert!(first.was_created());

        let second = registry.upsert(&d).await.unwrap();
        assert_eq!(second.outcome, UpsertOutcome::Unchanged);
        assert_eq!(second.record, first.record);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_fields() {
        let registry = registry();
        let d = descriptor("kendriya", "kvd1delhi.localhost");
        let created = registry.upsert(&d).await.unwrap().record;

        let mut changed = d.clone();
        changed.status = TenantStatus::Suspended;
        let updated = registry.upsert(&changed).await.unwrap();

        assert_eq!(updated.outcome, UpsertOutcome::Updated);
        assert!(!updated.was_created());
        assert_eq!(updated.record.id, created.id);
        assert_eq!(updated.record.created_at, created.created_at);
        assert_eq!(
            registry.find("kendriya").await.unwrap().unwrap().status,
            TenantStatus::Suspended
        );
    }

    #[tokio::test]
    async fn test_duplicate_domain_rejected() {
        let registry = registry();
        registry
            .upsert(&descriptor("dps_kolkata", "shared.localhost"))
            .await
            .unwrap();

        let err = registry
            .upsert(&descriptor("kendriya", "shared.localhost"))
            .await
            .unwrap_err();

        assert!(matches!(err, TenancyError::DuplicateDomain { ref owner, .. } if owner == "dps_kolkata"));
        assert!(registry.find("kendriya").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_domain_move_between_syncs() {
        let registry = registry();
        registry
            .upsert(&descriptor("dps_kolkata", "old.localhost"))
            .await
            .unwrap();
        registry
            .upsert(&descriptor("dps_kolkata", "new.localhost"))
            .await
            .unwrap();

        // The old domain is free again once its owner moved away
        let moved = registry
            .upsert(&descriptor("kendriya", "old.localhost"))
            .await
            .unwrap();
        assert!(moved.was_created());
    }

    #[tokio::test]
    async fn test_list_sorted_by_schema() {
        let registry = registry();
        for (schema, domain) in [("zeta", "z.localhost"), ("alpha", "a.localhost"), ("mid", "m.localhost")] {
            registry.upsert(&descriptor(schema, domain)).await.unwrap();
        }

        let names: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.schema_name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
