//! Run reports
//!
//! Batch operations never stop at the first bad entry. They collect one
//! entry per input plus running counts, and the caller decides how to
//! render them.

use crate::tenant::TenantRecord;
use crate::TenancyError;
use serde::{Deserialize, Serialize};

/// What happened to one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Newly created
    Created,
    /// Existing entry overwritten
    Updated,
    /// Already up to date
    Unchanged,
    /// Rejected; the rest of the batch went on
    Failed {
        /// Error label, see [`TenancyError::kind`]
        kind: String,
        /// Human-readable reason
        reason: String,
    },
}

impl EntryOutcome {
    /// Failure outcome for an entry-level error
    pub fn failed(err: &TenancyError) -> Self {
        Self::Failed {
            kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }

    /// Check if this is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short label for tables
    pub fn label(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One line of a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    /// Entry identity: schema name, email, or `#index` for unparseable input
    pub key: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Running counts shared by tenant and user reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Entries created
    pub created: usize,
    /// Entries updated
    pub updated: usize,
    /// Entries left unchanged
    pub unchanged: usize,
    /// Entries that failed
    pub failed: usize,
}

impl Tally {
    fn count(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Created => self.created += 1,
            EntryOutcome::Updated => self.updated += 1,
            EntryOutcome::Unchanged => self.unchanged += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Number of entries counted
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.failed
    }
}

/// Result of a tenant sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Counts across the whole run
    #[serde(flatten)]
    pub tally: Tally,
    /// One entry per input descriptor, in input order
    pub entries: Vec<SyncEntry>,
    /// Full registry listing after the run, sorted by schema name
    pub tenants: Vec<TenantRecord>,
}

impl SyncReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one entry's outcome
    pub fn record(&mut self, key: impl Into<String>, outcome: EntryOutcome) {
        self.tally.count(&outcome);
        self.entries.push(SyncEntry {
            key: key.into(),
            outcome,
        });
    }

    /// Check if any entry failed
    pub fn has_failures(&self) -> bool {
        self.tally.failed > 0
    }

    /// Entries that failed
    pub fn failures(&self) -> impl Iterator<Item = &SyncEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }
}

/// Result of syncing the users of one tenant schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSyncReport {
    /// Target schema
    pub schema_name: String,
    /// Counts for this schema
    #[serde(flatten)]
    pub tally: Tally,
    /// One entry per user descriptor, keyed by email
    pub entries: Vec<SyncEntry>,
}

impl UserSyncReport {
    /// Create an empty report for `schema_name`
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            ..Self::default()
        }
    }

    /// Record one user's outcome
    pub fn record(&mut self, email: impl Into<String>, outcome: EntryOutcome) {
        self.tally.count(&outcome);
        self.entries.push(SyncEntry {
            key: email.into(),
            outcome,
        });
    }

    /// Check if any user failed
    pub fn has_failures(&self) -> bool {
        self.tally.failed > 0
    }
}

/// Migration result for one tenant schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Pending migrations were applied
    Migrated {
        /// Versions applied, ascending
        applied: Vec<u32>,
    },
    /// Nothing was pending
    UpToDate,
    /// Migration failed
    Failed {
        /// Error label
        kind: String,
        /// Human-readable reason
        reason: String,
    },
}

/// One line of a [`MigrationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEntry {
    /// Tenant schema
    pub schema_name: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

/// Result of migrating every registered tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Schemas that received migrations
    pub migrated: usize,
    /// Schemas already current
    pub up_to_date: usize,
    /// Schemas that failed
    pub failed: usize,
    /// One entry per tenant, sorted by schema name
    pub entries: Vec<MigrationEntry>,
}

impl MigrationReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of migrating one schema
    pub fn record(&mut self, schema_name: impl Into<String>, result: &Result<Vec<u32>, TenancyError>) {
        let outcome = match result {
            Ok(applied) if applied.is_empty() => {
                self.up_to_date += 1;
                MigrationOutcome::UpToDate
            }
            Ok(applied) => {
                self.migrated += 1;
                MigrationOutcome::Migrated {
                    applied: applied.clone(),
                }
            }
            Err(err) => {
                self.failed += 1;
                MigrationOutcome::Failed {
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                }
            }
        };
        self.entries.push(MigrationEntry {
            schema_name: schema_name.into(),
            outcome,
        });
    }

    /// Check if any schema failed
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report_counts() {
        let mut report = SyncReport::new();
        report.record("a", EntryOutcome::Created);
        report.record("b", EntryOutcome::Unchanged);
        report.record(
            "#2",
            EntryOutcome::failed(&TenancyError::InvalidDescriptor("missing field".into())),
        );

        assert_eq!(report.tally.created, 1);
        assert_eq!(report.tally.unchanged, 1);
        assert_eq!(report.tally.failed, 1);
        assert_eq!(report.tally.total(), 3);
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = SyncReport::new();
        report.record(
            "x",
            EntryOutcome::failed(&TenancyError::DuplicateDomain {
                domain: "x.localhost".into(),
                owner: "y".into(),
            }),
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["created"], 0);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["entries"][0]["key"], "x");
        assert_eq!(value["entries"][0]["outcome"], "failed");
        assert_eq!(value["entries"][0]["kind"], "duplicate_domain");
    }

    #[test]
    fn test_migration_report() {
        let mut report = MigrationReport::new();
        report.record("a", &Ok(vec![1, 2]));
        report.record("b", &Ok(vec![]));
        report.record("c", &Err(TenancyError::UnknownTenant("c".into())));

        assert_eq!((report.migrated, report.up_to_date, report.failed), (1, 1, 1));
        assert!(report.has_failures());
    }
}
