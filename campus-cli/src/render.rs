//! Report rendering
//!
//! Human-readable tables on stdout, or pretty JSON with `--json`.

use crate::error::CliResult;
use campus_tenancy::{
    EntryOutcome, MigrationOutcome, MigrationReport, SyncEntry, SyncReport, Tally, TenantRecord,
    UserRecord, UserSyncReport,
};
use colored::{ColoredString, Colorize};
use serde::Serialize;

/// Print any serializable value as pretty JSON.
pub fn json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a tenant sync report: per-entry outcomes, totals, then the registry.
pub fn sync_report(report: &SyncReport) {
    println!("{}", "Tenant sync".bright_cyan().bold());
    entries(&report.entries);
    println!();
    tally(&report.tally);
    println!();
    tenants(&report.tenants);
}

/// Print one user sync report per schema.
pub fn user_reports(reports: &[UserSyncReport]) {
    for report in reports {
        println!(
            "{} {}",
            "Users in".bright_cyan().bold(),
            report.schema_name.bright_cyan().bold()
        );
        entries(&report.entries);
        tally(&report.tally);
        println!();
    }
}

/// Print the tenant registry listing.
pub fn tenants(tenants: &[TenantRecord]) {
    if tenants.is_empty() {
        println!("{}", "No tenants registered.".dimmed());
        return;
    }

    let rows = tenants
        .iter()
        .map(|t| {
            vec![
                t.schema_name.clone(),
                t.name.clone(),
                t.domain.clone(),
                t.status.to_string(),
                t.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    table(&["SCHEMA", "NAME", "DOMAIN", "STATUS", "CREATED"], rows, None);
    println!("\n{} tenant(s)", tenants.len());
}

/// Print a migrate-all report.
pub fn migration_report(report: &MigrationReport) {
    println!("{}", "Tenant migrations".bright_cyan().bold());
    if report.entries.is_empty() {
        println!("{}", "No tenants registered.".dimmed());
        return;
    }

    let rows = report
        .entries
        .iter()
        .map(|e| match &e.outcome {
            MigrationOutcome::Migrated { applied } => vec![
                e.schema_name.clone(),
                "migrated".to_string(),
                format!("applied {:?}", applied),
            ],
            MigrationOutcome::UpToDate => {
                vec![e.schema_name.clone(), "up_to_date".to_string(), String::new()]
            }
            MigrationOutcome::Failed { reason, .. } => {
                vec![e.schema_name.clone(), "failed".to_string(), reason.clone()]
            }
        })
        .collect();
    table(&["SCHEMA", "OUTCOME", "DETAIL"], rows, Some(1));

    println!(
        "\n{} migrated, {} up to date, {}",
        report.migrated,
        report.up_to_date,
        failed_count(report.failed)
    );
}

/// Print orphaned schema names.
pub fn orphans(names: &[String]) {
    if names.is_empty() {
        println!("{}", "No orphaned schemas.".green());
        return;
    }
    println!(
        "{}",
        "Schemas without a tenant record (resolve manually):".yellow().bold()
    );
    for name in names {
        println!("  {} {}", "•".dimmed(), name);
    }
}

/// Print a single provisioned user.
pub fn user(schema_name: &str, record: &UserRecord) {
    println!(
        "{} {} in {}",
        "✓".green().bold(),
        record.email.bold(),
        schema_name.bright_cyan()
    );
    println!("  {:<8} {}", "id".dimmed(), record.id);
    println!("  {:<8} {}", "name".dimmed(), record.full_name());
    println!("  {:<8} {}", "role".dimmed(), record.role);
    println!("  {:<8} {}", "active".dimmed(), record.is_active);
}

/// Serializable view of a user without the password hash.
#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub schema_name: &'a str,
    pub id: String,
    pub email: &'a str,
    pub role: String,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl<'a> UserView<'a> {
    pub fn new(schema_name: &'a str, record: &'a UserRecord) -> Self {
        Self {
            schema_name,
            id: record.id.to_string(),
            email: &record.email,
            role: record.role.to_string(),
            first_name: &record.first_name,
            last_name: &record.last_name,
            is_active: record.is_active,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

fn entries(entries: &[SyncEntry]) {
    if entries.is_empty() {
        println!("{}", "Nothing to do.".dimmed());
        return;
    }

    let rows = entries
        .iter()
        .map(|e| {
            let detail = match &e.outcome {
                EntryOutcome::Failed { kind, reason } => format!("{}: {}", kind, reason),
                _ => String::new(),
            };
            vec![e.key.clone(), e.outcome.label().to_string(), detail]
        })
        .collect();
    table(&["ENTRY", "OUTCOME", "DETAIL"], rows, Some(1));
}

fn tally(tally: &Tally) {
    println!(
        "{} created, {} updated, {} unchanged, {}",
        tally.created.to_string().green(),
        tally.updated.to_string().yellow(),
        tally.unchanged,
        failed_count(tally.failed)
    );
}

fn failed_count(failed: usize) -> ColoredString {
    let text = format!("{} failed", failed);
    if failed > 0 { text.red().bold() } else { text.normal() }
}

fn paint(label: &str, padded: String) -> ColoredString {
    match label {
        "created" | "migrated" => padded.green(),
        "updated" => padded.yellow(),
        "failed" => padded.red().bold(),
        _ => padded.dimmed(),
    }
}

// Pads before colouring so escape codes don't skew the widths.
fn table(headers: &[&str], rows: Vec<Vec<String>>, outcome_column: Option<usize>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<w$}", h, w = w))
        .collect();
    println!("{}", header.join("  ").trim_end().bold());

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let padded = format!("{:<w$}", cell, w = w);
                if Some(i) == outcome_column {
                    paint(cell, padded).to_string()
                } else {
                    padded
                }
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}
