//! Campus CLI - tenant and user provisioning for multi-tenant school deployments.
//!
//! # Commands
//!
//! - `campus tenants sync --file <path>` - Reconcile tenants from a JSON file
//! - `campus tenants list` - List registered tenants
//! - `campus tenants migrate` - Apply pending migrations to every tenant schema
//! - `campus tenants orphans` - List tenant schemas with no registry record
//! - `campus tenants resolve <host>` - Print the schema serving a host
//! - `campus users sync --file <path>` - Sync users into tenant schemas
//! - `campus users create` - Create or update one privileged account

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod backend;
mod commands;
mod config;
mod error;
mod render;

use backend::Backend;
use campus_log::{Format, Level};
use commands::{Context, tenants, users};
use config::CliConfig;
use error::CliResult;

/// Campus CLI - tenant and user provisioning
#[derive(Parser)]
#[command(name = "campus")]
#[command(version)]
#[command(about = "🏫 Provision tenant schemas and accounts for a multi-tenant campus deployment")]
#[command(long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = format!(
    "{}\n  {} campus tenants sync --file tenants.json\n  {} campus users sync --file users.json\n  {} campus users create --schema north --email head@north.edu --password 'S3cure!pass'\n  {} campus tenants resolve north.campus.test",
    "Examples:".bright_cyan().bold(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file (default: ./campus.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON state file for the in-memory backend
    #[arg(long, global = true, env = "CAMPUS_STATE_FILE")]
    state: Option<PathBuf>,

    /// PostgreSQL URL; selects the database backend
    #[arg(long, global = true, env = "CAMPUS_DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tenant registry and schema management
    #[command(alias = "t")]
    Tenants {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// User provisioning inside tenant schemas
    #[command(alias = "u")]
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum TenantCommands {
    /// Reconcile tenants from a JSON file
    Sync {
        /// JSON array of tenant descriptors
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List registered tenants
    #[command(alias = "ls")]
    List,

    /// Apply pending migrations to every tenant schema
    Migrate,

    /// List tenant schemas that have no registry record
    Orphans,

    /// Print the schema serving a request host
    Resolve {
        /// Request host, optionally with a port
        host: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Sync users from a JSON file of schema groups
    Sync {
        /// JSON array of `{schema_name, users}` groups
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create or update one privileged account
    Create {
        /// Tenant schema to create the account in
        #[arg(short, long)]
        schema: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "CAMPUS_USER_PASSWORD", hide_env_values = true)]
        password: String,

        /// Role (super_admin, admin, staff, teacher)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// First name (default: Super)
        #[arg(long)]
        first_name: Option<String>,

        /// Last name (default: Admin)
        #[arg(long)]
        last_name: Option<String>,
    },
}

fn configure_logging(cli: &Cli) {
    if std::env::var("CAMPUS_LOG_FORMAT").is_err() {
        campus_log::set_format(Format::Compact);
    }

    if cli.verbose {
        campus_log::set_debug(true);
    } else if cli.quiet {
        campus_log::set_level(Level::Error);
    } else if std::env::var("CAMPUS_LOG_LEVEL").is_err() && !campus_log::is_debug_enabled() {
        campus_log::set_level(Level::Warn);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.state_file = state;
    }
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }

    let backend = Backend::open(&config).await?;
    let tenancy = backend.tenancy(&config);
    let ctx = Context {
        backend,
        tenancy,
        json: cli.json,
    };

    match cli.command {
        Commands::Tenants { command } => match command {
            TenantCommands::Sync { file } => tenants::sync(&ctx, &file).await,
            TenantCommands::List => tenants::list(&ctx).await,
            TenantCommands::Migrate => tenants::migrate(&ctx).await,
            TenantCommands::Orphans => tenants::orphans(&ctx).await,
            TenantCommands::Resolve { host } => tenants::resolve(&ctx, &host).await,
        },

        Commands::Users { command } => match command {
            UserCommands::Sync { file } => users::sync(&ctx, &file).await,
            UserCommands::Create {
                schema,
                email,
                password,
                role,
                first_name,
                last_name,
            } => {
                users::create(
                    &ctx,
                    users::CreateOptions {
                        schema: &schema,
                        email: &email,
                        password: &password,
                        role: &role,
                        first_name: first_name.as_deref(),
                        last_name: last_name.as_deref(),
                    },
                )
                .await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle color preferences
    if cli.no_color {
        colored::control::set_override(false);
    }
    configure_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
        std::process::exit(1);
    };
}
