//! Storage backend selection.

use crate::config::CliConfig;
#[cfg(not(feature = "postgres"))]
use crate::error::CliError;
use crate::error::CliResult;
use campus_log::debug;
use campus_tenancy::{MemoryBackend, Tenancy};
use std::path::PathBuf;

#[cfg(feature = "postgres")]
use campus_tenancy::{PgBackend, PgConfig};
#[cfg(feature = "postgres")]
use std::sync::Arc;

/// Where tenant, schema and user data lives for this run.
pub enum Backend {
    /// In-memory stores persisted to a JSON state file
    Memory {
        /// Live stores
        stores: MemoryBackend,
        /// State file loaded at start and written after mutations
        path: PathBuf,
    },
    /// PostgreSQL database
    #[cfg(feature = "postgres")]
    Postgres(Arc<PgBackend>),
}

impl Backend {
    /// Open the backend named by the configuration.
    pub async fn open(config: &CliConfig) -> CliResult<Self> {
        match &config.database_url {
            #[cfg(feature = "postgres")]
            Some(url) => {
                let pg = PgBackend::connect(PgConfig::new(url.clone()).pool_size(config.pool_size))
                    .await?;
                Ok(Backend::Postgres(Arc::new(pg)))
            }
            #[cfg(not(feature = "postgres"))]
            Some(_) => Err(CliError::Config(
                "a database URL was given but this build has no PostgreSQL support \
                 (rebuild with --features postgres)"
                    .to_string(),
            )),
            None => {
                debug!("Loading state from {}", config.state_file.display());
                let stores = MemoryBackend::load(&config.state_file)?;
                Ok(Backend::Memory {
                    stores,
                    path: config.state_file.clone(),
                })
            }
        }
    }

    /// Assemble the engine over this backend.
    pub fn tenancy(&self, config: &CliConfig) -> Tenancy {
        match self {
            Backend::Memory { stores, .. } => Tenancy::in_memory(stores, config.tenancy.clone()),
            #[cfg(feature = "postgres")]
            Backend::Postgres(pg) => Tenancy::new(
                pg.clone(),
                pg.clone(),
                pg.clone(),
                config.tenancy.clone(),
            ),
        }
    }

    /// Write state back after a mutating command.
    pub fn persist(&self) -> CliResult<()> {
        match self {
            Backend::Memory { stores, path } => {
                stores.save(path)?;
                debug!("Saved state to {}", path.display());
                Ok(())
            }
            #[cfg(feature = "postgres")]
            Backend::Postgres(_) => Ok(()),
        }
    }
}

