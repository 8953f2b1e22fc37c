//! Tenant Resolution
//!
//! Maps a request host to the tenant that owns it. The request-routing
//! layer calls [`DomainResolver::resolve`] with the raw `Host` value and
//! gets back the record whose schema the request should run against.

use crate::registry::TenantRegistry;
use crate::tenant::TenantRecord;
use crate::{Result, TenancyError};
use campus_log::debug;

/// Resolves tenants by routing domain.
#[derive(Debug, Clone)]
pub struct DomainResolver {
    registry: TenantRegistry,
}

impl DomainResolver {
    /// Create a resolver over a registry
    pub fn new(registry: TenantRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a host to a serving tenant.
    ///
    /// Fails with `UnknownTenant` when no tenant owns the domain and with
    /// `SuspendedTenant` when the owner is suspended.
    pub async fn resolve(&self, host: &str) -> Result<TenantRecord> {
        let domain = normalize_host(host);
        if domain.is_empty() {
            return Err(TenancyError::UnknownTenant(host.to_string()));
        }

        let tenant = self
            .registry
            .find_by_domain(&domain)
            .await?
            .ok_or_else(|| TenancyError::UnknownTenant(domain.clone()))?;

        if !tenant.is_active() {
            return Err(TenancyError::SuspendedTenant(tenant.schema_name));
        }

        debug!("Resolved host '{}' to schema '{}'", host, tenant.schema_name);
        Ok(tenant)
    }

    /// Resolve a host straight to its schema name
    pub async fn schema_for(&self, host: &str) -> Result<String> {
        Ok(self.resolve(host).await?.schema_name)
    }
}

/// Lowercase a host and strip its port and any trailing dot.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6 literal, optionally followed by a port
        rest.split(']').next().unwrap_or_default()
    } else {
        host.split(':').next().unwrap_or_default()
    };
    host.trim_end_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTenantStore;
    use crate::tenant::{TenantDescriptor, TenantStatus};
    use std::sync::Arc;

    async fn resolver() -> DomainResolver {
        let registry = TenantRegistry::new(Arc::new(InMemoryTenantStore::new()));
        registry
            .upsert(&TenantDescriptor::new(
                "dps_kolkata",
                "DPS Kolkata",
                "dpskolkata.localhost",
                TenantStatus::Active,
            ))
            .await
            .unwrap();
        registry
            .upsert(&TenantDescriptor::new(
                "closed",
                "Closed School",
                "closed.localhost",
                TenantStatus::Suspended,
            ))
            .await
            .unwrap();
        DomainResolver::new(registry)
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("DPSKolkata.localhost:8000"), "dpskolkata.localhost");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:8080"), "::1");
        assert_eq!(normalize_host(""), "");
    }

    #[tokio::test]
    async fn test_resolve_with_port() {
        let resolver = resolver().await;
        let schema = resolver.schema_for("DPSKolkata.localhost:8000").await.unwrap();
        assert_eq!(schema, "dps_kolkata");
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let resolver = resolver().await;
        assert!(matches!(
            resolver.resolve("nowhere.localhost").await,
            Err(TenancyError::UnknownTenant(_))
        ));
    }

    #[tokio::test]
    async fn test_suspended_tenant() {
        let resolver = resolver().await;
        assert!(matches!(
            resolver.resolve("closed.localhost").await,
            Err(TenancyError::SuspendedTenant(ref s)) if s == "closed"
        ));
    }
}
