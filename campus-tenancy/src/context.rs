//! Tenant Context
//!
//! Scoped, exclusive binding of an operation to one tenant schema.
//!
//! [`ContextSwitcher::with_tenant`] switches the active context, hands the
//! operation a [`TenantScope`] and restores the previous context when the
//! operation finishes, fails or is dropped mid-flight. Nesting is refused
//! with `ReentrantContext`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let users = switcher
//!     .with_tenant("dps_kolkata", |scope| async move {
//!         store.list(&scope).await
//!     })
//!     .await?;
//! ```

use crate::schema::SchemaStore;
use crate::{Result, TenancyError};
use campus_log::debug;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Schema the current operation is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "schema", rename_all = "snake_case")]
pub enum ActiveContext {
    /// Shared default schema; no tenant operation in progress
    Default,
    /// A tenant schema
    Tenant(String),
}

impl ActiveContext {
    /// Tenant schema name, if bound to a tenant
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Tenant(name) => Some(name),
        }
    }

    /// Check if no tenant is bound
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl std::fmt::Display for ActiveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "<default>"),
            Self::Tenant(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug)]
struct Binding {
    context: ActiveContext,
    // Bumped on every enter and restore so old scopes can be told apart
    // from a later scope for the same schema.
    epoch: u64,
}

/// Switches one worker's active context between tenant schemas.
#[derive(Debug)]
pub struct ContextSwitcher {
    schemas: Arc<SchemaStore>,
    binding: Arc<parking_lot::Mutex<Binding>>,
    default_schema: String,
}

impl ContextSwitcher {
    /// Create a switcher starting in the default context.
    pub fn new(schemas: Arc<SchemaStore>) -> Self {
        Self {
            schemas,
            binding: Arc::new(parking_lot::Mutex::new(Binding {
                context: ActiveContext::Default,
                epoch: 0,
            })),
            default_schema: "public".to_string(),
        }
    }

    /// Set the schema name reported for the default context
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Create a switcher for another worker.
    ///
    /// The new switcher shares the schema store but carries its own
    /// independent active context.
    pub fn worker(&self) -> Self {
        Self {
            schemas: Arc::clone(&self.schemas),
            binding: Arc::new(parking_lot::Mutex::new(Binding {
                context: ActiveContext::Default,
                epoch: 0,
            })),
            default_schema: self.default_schema.clone(),
        }
    }

    /// Current active context
    pub fn active(&self) -> ActiveContext {
        self.binding.lock().context.clone()
    }

    /// Name of the schema currently bound, the default schema included
    pub fn current_schema(&self) -> String {
        match &self.binding.lock().context {
            ActiveContext::Default => self.default_schema.clone(),
            ActiveContext::Tenant(name) => name.clone(),
        }
    }

    /// Schema store backing this switcher
    pub fn schemas(&self) -> &Arc<SchemaStore> {
        &self.schemas
    }

    /// Run `op` bound to `schema_name`.
    ///
    /// Fails with `ReentrantContext` when called inside another scope and
    /// with `UnknownTenant` when no tenant schema of that name exists. The
    /// previous context is restored on every exit path, including when the
    /// returned future is dropped before completion.
    pub async fn with_tenant<F, Fut, T>(&self, schema_name: &str, op: F) -> Result<T>
    where
        F: FnOnce(TenantScope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.check_not_bound(schema_name)?;

        if !self.schemas.exists(schema_name).await? {
            return Err(TenancyError::UnknownTenant(schema_name.to_string()));
        }

        let guard = self.enter(schema_name)?;
        let scope = TenantScope {
            schema_name: schema_name.to_string(),
            epoch: guard.epoch,
            binding: Arc::clone(&self.binding),
        };

        let result = op(scope).await;
        drop(guard);
        result
    }

    fn check_not_bound(&self, requested: &str) -> Result<()> {
        match &self.binding.lock().context {
            ActiveContext::Default => Ok(()),
            ActiveContext::Tenant(active) => Err(TenancyError::ReentrantContext {
                active: active.clone(),
                requested: requested.to_string(),
            }),
        }
    }

    // Check and set under one lock; the existence check above awaited, so
    // another task on this worker may have entered meanwhile.
    fn enter(&self, schema_name: &str) -> Result<ContextGuard> {
        let mut binding = self.binding.lock();
        if let ActiveContext::Tenant(active) = &binding.context {
            return Err(TenancyError::ReentrantContext {
                active: active.clone(),
                requested: schema_name.to_string(),
            });
        }

        let previous = std::mem::replace(
            &mut binding.context,
            ActiveContext::Tenant(schema_name.to_string()),
        );
        binding.epoch += 1;
        debug!("Entered tenant context '{}'", schema_name);

        Ok(ContextGuard {
            binding: Arc::clone(&self.binding),
            previous: Some(previous),
            epoch: binding.epoch,
        })
    }
}

/// Restores the previous context on drop.
struct ContextGuard {
    binding: Arc<parking_lot::Mutex<Binding>>,
    previous: Option<ActiveContext>,
    epoch: u64,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let mut binding = self.binding.lock();
        let left = std::mem::replace(
            &mut binding.context,
            self.previous.take().unwrap_or(ActiveContext::Default),
        );
        binding.epoch += 1;
        debug!("Left tenant context '{}', restored '{}'", left, binding.context);
    }
}

/// Proof that an operation runs inside a tenant context.
///
/// Not `Clone`: a scope belongs to exactly one `with_tenant` call. Stores
/// that act on tenant data take `&TenantScope` and call [`verify`] first.
///
/// [`verify`]: TenantScope::verify
#[derive(Debug)]
pub struct TenantScope {
    schema_name: String,
    epoch: u64,
    binding: Arc<parking_lot::Mutex<Binding>>,
}

impl TenantScope {
    /// Schema this scope is bound to
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Check the scope's context is still the active one.
    pub fn verify(&self) -> Result<&str> {
        let binding = self.binding.lock();
        let live = binding.epoch == self.epoch
            && binding.context.tenant() == Some(self.schema_name.as_str());
        if live {
            Ok(&self.schema_name)
        } else {
            Err(TenancyError::StaleScope(self.schema_name.clone()))
        }
    }

    /// Check if the scope is still usable
    pub fn is_live(&self) -> bool {
        self.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySchemaProvider;

    async fn switcher(schemas: &[&str]) -> ContextSwitcher {
        let store = Arc::new(SchemaStore::new(Arc::new(InMemorySchemaProvider::new())));
        for name in schemas {
            store.provision(name).await.unwrap();
        }
        ContextSwitcher::new(store)
    }

    #[tokio::test]
    async fn test_binds_and_restores() {
        let switcher = switcher(&["dps_kolkata"]).await;

        let seen = switcher
            .with_tenant("dps_kolkata", |scope| async move {
                Ok(scope.schema_name().to_string())
            })
            .await
            .unwrap();

        assert_eq!(seen, "dps_kolkata");
        assert_eq!(switcher.active(), ActiveContext::Default);
        assert_eq!(switcher.current_schema(), "public");
    }

    #[tokio::test]
    async fn test_active_inside_scope() {
        let switcher = switcher(&["kendriya"]).await;

        let inside = switcher
            .with_tenant("kendriya", |_scope| async { Ok(()) })
            .await;
        assert!(inside.is_ok());

        let active = switcher
            .with_tenant("kendriya", |scope| {
                let active = scope.verify().map(str::to_string);
                async move { active }
            })
            .await
            .unwrap();
        assert_eq!(active, "kendriya");
    }

    #[tokio::test]
    async fn test_restores_after_failure() {
        let switcher = switcher(&["dps_kolkata"]).await;

        let result: Result<()> = switcher
            .with_tenant("dps_kolkata", |_scope| async {
                Err(TenancyError::Storage("boom".into()))
            })
            .await;

        assert!(matches!(result, Err(TenancyError::Storage(_))));
        assert!(switcher.active().is_default());
    }

    #[tokio::test]
    async fn test_unknown_tenant() {
        let switcher = switcher(&[]).await;
        let err = switcher
            .with_tenant("ghost", |_scope| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(err, TenancyError::UnknownTenant(ref s) if s == "ghost"));
        assert!(switcher.active().is_default());
    }

    #[tokio::test]
    async fn test_scope_goes_stale_after_exit() {
        let switcher = switcher(&["dps_kolkata"]).await;
        let mut leaked = None;

        switcher
            .with_tenant("dps_kolkata", |scope| {
                leaked = Some(scope);
                async { Ok(()) }
            })
            .await
            .unwrap();

        let scope = leaked.unwrap();
        assert!(matches!(scope.verify(), Err(TenancyError::StaleScope(_))));
    }

    #[tokio::test]
    async fn test_old_scope_stale_in_later_context_for_same_schema() {
        let switcher = switcher(&["dps_kolkata"]).await;
        let mut leaked = None;

        switcher
            .with_tenant("dps_kolkata", |scope| {
                leaked = Some(scope);
                async { Ok(()) }
            })
            .await
            .unwrap();
        let old = leaked.unwrap();

        let old_live = switcher
            .with_tenant("dps_kolkata", |scope| {
                let verdict = (old.is_live(), scope.is_live());
                async move { Ok(verdict) }
            })
            .await
            .unwrap();
        assert_eq!(old_live, (false, true));
    }

    #[tokio::test]
    async fn test_worker_has_independent_context() {
        let switcher = switcher(&["dps_kolkata", "kendriya"]).await;
        let worker = switcher.worker();

        let nested = switcher
            .with_tenant("dps_kolkata", |_scope| async {
                assert!(worker.active().is_default());
                worker
                    .with_tenant("kendriya", |scope| async move {
                        Ok(scope.schema_name().to_string())
                    })
                    .await
            })
            .await
            .unwrap();

        assert_eq!(nested, "kendriya");
        assert!(switcher.active().is_default());
        assert!(worker.active().is_default());
    }
}
