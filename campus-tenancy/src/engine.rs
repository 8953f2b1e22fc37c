//! Engine assembly
//!
//! Wires the registry, schema store, context switcher, reconciler and
//! user provisioner over one set of backend stores.

use crate::config::TenancyConfig;
use crate::context::ContextSwitcher;
use crate::memory::MemoryBackend;
use crate::reconciler::Reconciler;
use crate::registry::{TenantRegistry, TenantStore};
use crate::resolver::DomainResolver;
use crate::schema::{SchemaProvider, SchemaStore};
use crate::users::{UserProvisioner, UserStore};
use std::sync::Arc;

/// Fully wired tenancy engine.
#[derive(Debug)]
pub struct Tenancy {
    config: TenancyConfig,
    registry: TenantRegistry,
    schemas: Arc<SchemaStore>,
    switcher: Arc<ContextSwitcher>,
    reconciler: Reconciler,
    users: UserProvisioner,
}

impl Tenancy {
    /// Assemble an engine from backend stores.
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        schemas: Arc<dyn SchemaProvider>,
        users: Arc<dyn UserStore>,
        config: TenancyConfig,
    ) -> Self {
        let registry = TenantRegistry::new(tenants);
        let schemas = Arc::new(SchemaStore::new(schemas));
        let switcher = Arc::new(
            ContextSwitcher::new(Arc::clone(&schemas))
                .with_default_schema(config.default_schema.clone()),
        );
        let reconciler = Reconciler::new(registry.clone(), Arc::clone(&schemas), config.clone());
        let users = UserProvisioner::new(Arc::clone(&switcher), users, &config);

        Self {
            config,
            registry,
            schemas,
            switcher,
            reconciler,
            users,
        }
    }

    /// Assemble an engine over an in-memory backend.
    pub fn in_memory(backend: &MemoryBackend, config: TenancyConfig) -> Self {
        Self::new(backend.tenants(), backend.schemas(), backend.users(), config)
    }

    /// Engine configuration
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Tenant registry
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Schema store
    pub fn schemas(&self) -> &Arc<SchemaStore> {
        &self.schemas
    }

    /// Context switcher
    pub fn switcher(&self) -> &Arc<ContextSwitcher> {
        &self.switcher
    }

    /// Tenant reconciler
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// User provisioner
    pub fn users(&self) -> &UserProvisioner {
        &self.users
    }

    /// Domain resolver over this engine's registry
    pub fn resolver(&self) -> DomainResolver {
        DomainResolver::new(self.registry.clone())
    }
}
