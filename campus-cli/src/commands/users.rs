//! User commands
//!
//! Batch sync from a users file and single-account creation.

use super::{Context, persist_after, read_array};
use crate::error::{CliError, CliResult};
use crate::render::{self, UserView};
use campus_log::warn;
use campus_tenancy::{EntryOutcome, TenancyError, UserDescriptor, UserRole, UserSyncReport};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Deserialize)]
struct RawGroup {
    #[serde(alias = "schema")]
    schema_name: String,
    #[serde(default)]
    users: Vec<Value>,
}

/// Options for `users create`.
#[derive(Debug, Clone)]
pub struct CreateOptions<'a> {
    pub schema: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// Sync every group of a users file into its schema.
pub async fn sync(ctx: &Context, file: &Path) -> CliResult<()> {
    let groups = read_array(file)?;
    let mut reports = Vec::with_capacity(groups.len());

    for (index, value) in groups.into_iter().enumerate() {
        let group: RawGroup = match serde_json::from_value(value) {
            Ok(group) => group,
            Err(e) => {
                let key = format!("#{}", index);
                let mut report = UserSyncReport::new(key.clone());
                report.record(
                    key,
                    EntryOutcome::failed(&TenancyError::InvalidUser(e.to_string())),
                );
                reports.push(report);
                continue;
            }
        };

        match sync_group(ctx, group).await {
            Ok(report) => reports.push(report),
            Err(err) => return persist_after(ctx, Err(err)),
        }
    }

    ctx.backend.persist()?;

    if ctx.json {
        render::json(&reports)?;
    } else {
        render::user_reports(&reports);
    }

    let failed: usize = reports.iter().map(|r| r.tally.failed).sum();
    if failed > 0 {
        return Err(CliError::Failures(failed));
    }
    Ok(())
}

async fn sync_group(ctx: &Context, group: RawGroup) -> CliResult<UserSyncReport> {
    let mut users = Vec::with_capacity(group.users.len());
    let mut malformed = Vec::new();

    for (index, value) in group.users.into_iter().enumerate() {
        let key = value
            .get("email")
            .and_then(Value::as_str)
            .map(|email| email.trim().to_lowercase())
            .unwrap_or_else(|| format!("#{}", index));
        match serde_json::from_value::<UserDescriptor>(value) {
            Ok(user) => users.push(user),
            Err(e) => malformed.push((key, TenancyError::InvalidUser(e.to_string()))),
        }
    }

    let mut report = match ctx.tenancy.users().sync_users(&group.schema_name, users).await {
        Ok(report) => report,
        // The group is skipped; other schemas still get their users
        Err(err @ TenancyError::UnknownTenant(_)) => {
            warn!("Skipping users for '{}': {}", group.schema_name, err);
            let mut report = UserSyncReport::new(group.schema_name.clone());
            report.record(group.schema_name.clone(), EntryOutcome::failed(&err));
            report
        }
        Err(err) => return Err(err.into()),
    };

    for (key, err) in malformed {
        report.record(key, EntryOutcome::failed(&err));
    }
    Ok(report)
}

/// Create or update one privileged account.
pub async fn create(ctx: &Context, options: CreateOptions<'_>) -> CliResult<()> {
    let role: UserRole = options.role.parse()?;
    let record = ctx
        .tenancy
        .users()
        .create_one(
            options.schema,
            options.email,
            options.password,
            role,
            options.first_name,
            options.last_name,
        )
        .await?;
    ctx.backend.persist()?;

    if ctx.json {
        render::json(&UserView::new(options.schema, &record))
    } else {
        render::user(options.schema, &record);
        Ok(())
    }
}
