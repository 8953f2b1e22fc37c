//! Tenant commands
//!
//! Sync, list, migrate, orphan detection and host resolution.

use super::{Context, persist_after, read_array};
use crate::error::{CliError, CliResult};
use crate::render;
use std::path::Path;

/// Reconcile the registry against a tenants file.
pub async fn sync(ctx: &Context, file: &Path) -> CliResult<()> {
    let values = read_array(file)?;
    let result = ctx.tenancy.reconciler().sync_values(values).await;
    let report = persist_after(ctx, result.map_err(CliError::from))?;

    if ctx.json {
        render::json(&report)?;
    } else {
        render::sync_report(&report);
    }

    if report.has_failures() {
        return Err(CliError::Failures(report.tally.failed));
    }
    Ok(())
}

/// Print every registered tenant.
pub async fn list(ctx: &Context) -> CliResult<()> {
    let tenants = ctx.tenancy.registry().list().await?;
    if ctx.json {
        render::json(&tenants)
    } else {
        render::tenants(&tenants);
        Ok(())
    }
}

/// Apply pending migrations to every tenant schema.
pub async fn migrate(ctx: &Context) -> CliResult<()> {
    let result = ctx.tenancy.reconciler().migrate_all().await;
    let report = persist_after(ctx, result.map_err(CliError::from))?;

    if ctx.json {
        render::json(&report)?;
    } else {
        render::migration_report(&report);
    }

    if report.has_failures() {
        return Err(CliError::Failures(report.failed));
    }
    Ok(())
}

/// List tenant schemas that have no registry record.
pub async fn orphans(ctx: &Context) -> CliResult<()> {
    let orphans = ctx.tenancy.reconciler().find_orphans().await?;
    if ctx.json {
        render::json(&orphans)
    } else {
        render::orphans(&orphans);
        Ok(())
    }
}

/// Print the schema serving a request host.
pub async fn resolve(ctx: &Context, host: &str) -> CliResult<()> {
    let tenant = ctx.tenancy.resolver().resolve(host).await?;
    if ctx.json {
        render::json(&tenant)
    } else {
        println!("{}", tenant.schema_name);
        Ok(())
    }
}
