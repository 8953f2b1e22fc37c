//! Schema-per-tenant provisioning for campus
//!
//! Every school is a tenant isolated in its own database schema. This
//! crate keeps tenants and their schemas in sync with declarative
//! configuration and runs per-tenant work in an exclusive tenant context.
//!
//! # Features
//!
//! - 🗄️ **Schema Store** - Idempotent schema creation and versioned migrations
//! - 🏢 **Tenant Registry** - Schema name to tenant metadata, unique domains
//! - 🔁 **Reconciler** - Create/update/unchanged decisions with rollback
//! - 🔒 **Context Switcher** - Scoped, non-reentrant tenant binding
//! - 👤 **User Provisioning** - Privileged accounts upserted by email
//! - 🔍 **Domain Resolution** - Request host to tenant lookup
//! - 💾 **Backends** - In-memory (with JSON snapshots) and PostgreSQL (`postgres` feature)
//!
//! # Quick Start
//!
//! ## 1. Assemble the engine
//!
//! ```rust
//! use campus_tenancy::{MemoryBackend, Tenancy, TenancyConfig};
//!
//! let backend = MemoryBackend::new();
//! let tenancy = Tenancy::in_memory(&backend, TenancyConfig::default());
//! assert!(tenancy.switcher().active().is_default());
//! ```
//!
//! ## 2. Sync tenants
//!
//! ```rust,ignore
//! let report = tenancy.reconciler().sync(vec![
//!     TenantDescriptor::new("dps_kolkata", "DPS Kolkata", "dpskolkata.localhost", TenantStatus::Active),
//!     TenantDescriptor::new("kendriya", "Kendriya Vidyalaya", "kvd1delhi.localhost", TenantStatus::Trial),
//! ]).await?;
//!
//! assert_eq!(report.tally.created, 2);
//! ```
//!
//! ## 3. Provision users inside a tenant
//!
//! ```rust,ignore
//! let report = tenancy
//!     .users()
//!     .sync_users("dps_kolkata", vec![
//!         UserDescriptor::new("admin@dps.edu", "admin@123", UserRole::Admin),
//!     ])
//!     .await?;
//! ```
//!
//! ## 4. Run arbitrary work in a tenant context
//!
//! ```rust,ignore
//! let users = tenancy
//!     .switcher()
//!     .with_tenant("dps_kolkata", |scope| async move { store.list(&scope).await })
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod memory;
pub mod password;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod reconciler;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod tenant;
pub mod users;

pub use config::TenancyConfig;
pub use context::{ActiveContext, ContextSwitcher, TenantScope};
pub use engine::Tenancy;
pub use error::{Result, TenancyError};
pub use memory::{
    InMemorySchemaProvider, InMemoryTenantStore, InMemoryUserStore, MemoryBackend, MemorySnapshot,
};
pub use password::{HashAlgorithm, PasswordHasher, PasswordPolicy};
#[cfg(feature = "postgres")]
pub use postgres::{PgBackend, PgConfig};
pub use reconciler::Reconciler;
pub use registry::{TenantRegistry, TenantStore, UpsertOutcome, Upserted};
pub use report::{
    EntryOutcome, MigrationEntry, MigrationOutcome, MigrationReport, SyncEntry, SyncReport, Tally,
    UserSyncReport,
};
pub use resolver::DomainResolver;
pub use schema::{
    EnsureOutcome, Migration, ProvisionOutcome, SchemaProvider, SchemaState, SchemaStore,
    TENANT_MIGRATIONS,
};
pub use tenant::{Attributes, TenantDescriptor, TenantRecord, TenantStatus};
pub use users::{UserDescriptor, UserGroup, UserProvisioner, UserRecord, UserRole, UserStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::TenancyConfig;
    pub use crate::context::{ActiveContext, ContextSwitcher, TenantScope};
    pub use crate::engine::Tenancy;
    pub use crate::error::{Result, TenancyError};
    pub use crate::memory::MemoryBackend;
    pub use crate::reconciler::Reconciler;
    pub use crate::registry::{TenantRegistry, TenantStore};
    pub use crate::report::{EntryOutcome, MigrationReport, SyncReport, UserSyncReport};
    pub use crate::resolver::DomainResolver;
    pub use crate::schema::{SchemaProvider, SchemaStore};
    pub use crate::tenant::{TenantDescriptor, TenantRecord, TenantStatus};
    pub use crate::users::{UserDescriptor, UserProvisioner, UserRole, UserStore};
}
