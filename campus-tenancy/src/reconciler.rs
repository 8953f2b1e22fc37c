//! Tenant Reconciliation
//!
//! Brings the registry and the physical schemas in line with a desired
//! list of tenants. Entries are processed one at a time in input order;
//! a failing entry is recorded and the batch moves on.
//!
//! # Provisioning Rollback
//!
//! A new tenant is inserted into the registry first and then provisioned.
//! If provisioning fails the record is removed again, and the schema store
//! drops any schema it created for it, so a record never points at a
//! missing or half-migrated schema.
//!
//! # Orphaned Schemas
//!
//! A tenant schema with no registry record is never adopted or dropped.
//! A descriptor naming one fails with `OrphanedSchema`;
//! [`Reconciler::find_orphans`] lists them all.

use crate::config::TenancyConfig;
use crate::registry::{TenantRegistry, UpsertOutcome};
use crate::report::{EntryOutcome, MigrationReport, SyncReport};
use crate::schema::SchemaStore;
use crate::tenant::TenantDescriptor;
use crate::{Result, TenancyError};
use campus_log::{info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Drives the registry and schema store from tenant descriptors.
#[derive(Debug, Clone)]
pub struct Reconciler {
    registry: TenantRegistry,
    schemas: Arc<SchemaStore>,
    config: TenancyConfig,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(registry: TenantRegistry, schemas: Arc<SchemaStore>, config: TenancyConfig) -> Self {
        Self {
            registry,
            schemas,
            config,
        }
    }

    /// Reconcile typed descriptors.
    ///
    /// Entry-level failures end up in the report. Only errors that leave
    /// the run itself in doubt (a registry that cannot be listed, for
    /// instance) are returned as `Err`.
    pub async fn sync(&self, descriptors: Vec<TenantDescriptor>) -> Result<SyncReport> {
        let mut report = SyncReport::new();

        for descriptor in descriptors {
            let key = descriptor.schema_name.clone();
            let result = self.reconcile(descriptor).await;
            self.record(&mut report, key, result)?;
        }

        self.finish(report).await
    }

    /// Reconcile loosely-typed records, as read from a configuration file.
    ///
    /// Records that do not parse are reported as `invalid_descriptor`
    /// failures, keyed by their schema name if one is present and by
    /// `#index` otherwise.
    pub async fn sync_values(&self, values: Vec<serde_json::Value>) -> Result<SyncReport> {
        let mut report = SyncReport::new();

        for (index, value) in values.into_iter().enumerate() {
            let key = value
                .get("schema_name")
                .or_else(|| value.get("schema"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", index));

            let result = match TenantDescriptor::from_value(value) {
                Ok(descriptor) => self.reconcile(descriptor).await,
                Err(err) => Err(err),
            };
            self.record(&mut report, key, result)?;
        }

        self.finish(report).await
    }

    /// Apply pending migrations to every registered tenant's schema.
    ///
    /// Tenants are migrated one after another in schema name order. A
    /// tenant whose schema is missing is reported as failed.
    pub async fn migrate_all(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new();

        for tenant in self.registry.list().await? {
            let result = self
                .schemas
                .apply_pending_migrations(&tenant.schema_name)
                .await;
            match &result {
                Ok(applied) if applied.is_empty() => {
                    info!("Schema '{}' is up to date", tenant.schema_name)
                }
                Ok(applied) => info!(
                    "Migrated schema '{}': applied {:?}",
                    tenant.schema_name, applied
                ),
                Err(err) => warn!("Migrating schema '{}' failed: {}", tenant.schema_name, err),
            }
            report.record(tenant.schema_name, &result);
        }

        Ok(report)
    }

    /// Tenant schemas that have no registry record, sorted.
    pub async fn find_orphans(&self) -> Result<Vec<String>> {
        let registered: BTreeSet<String> = self
            .registry
            .list()
            .await?
            .into_iter()
            .map(|r| r.schema_name)
            .collect();

        Ok(self
            .schemas
            .tenant_schemas()
            .await?
            .into_iter()
            .filter(|name| !registered.contains(name))
            .collect())
    }

    /// Registry used by this reconciler
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    async fn reconcile(&self, descriptor: TenantDescriptor) -> Result<UpsertOutcome> {
        let descriptor = descriptor.validate(&self.config)?;
        let schema_name = descriptor.schema_name.as_str();

        if self.registry.find(schema_name).await?.is_none() && self.schemas.exists(schema_name).await? {
            return Err(TenancyError::OrphanedSchema(schema_name.to_string()));
        }

        let upserted = self.registry.upsert(&descriptor).await?;
        if !upserted.was_created() {
            return Ok(upserted.outcome);
        }

        match self.schemas.provision(schema_name).await {
            Ok(provisioned) => {
                info!(
                    "Provisioned schema '{}' (migrations {:?})",
                    schema_name, provisioned.applied
                );
                Ok(UpsertOutcome::Created)
            }
            Err(err) => {
                warn!("Rolling back tenant '{}': {}", schema_name, err);
                if let Err(discard_err) = self.registry.discard(schema_name).await {
                    warn!(
                        "Could not remove record for tenant '{}': {}",
                        schema_name, discard_err
                    );
                }
                Err(err)
            }
        }
    }

    fn record(
        &self,
        report: &mut SyncReport,
        key: String,
        result: Result<UpsertOutcome>,
    ) -> Result<()> {
        match result {
            Ok(outcome) => {
                info!("Tenant '{}': {:?}", key, outcome);
                report.record(key, entry_outcome(outcome));
                Ok(())
            }
            Err(err) if err.is_entry_level() => {
                warn!("Tenant '{}' failed: {}", key, err);
                report.record(key, EntryOutcome::failed(&err));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn finish(&self, mut report: SyncReport) -> Result<SyncReport> {
        report.tenants = self.registry.list().await?;
        info!(
            "Tenant sync finished: {} created, {} updated, {} unchanged, {} failed",
            report.tally.created, report.tally.updated, report.tally.unchanged, report.tally.failed
        );
        Ok(report)
    }
}

fn entry_outcome(outcome: UpsertOutcome) -> EntryOutcome {
    match outcome {
        UpsertOutcome::Created => EntryOutcome::Created,
        UpsertOutcome::Updated => EntryOutcome::Updated,
        UpsertOutcome::Unchanged => EntryOutcome::Unchanged,
    }
}
