//! CLI configuration
//!
//! Sources, lowest priority first: built-in defaults, the TOML file
//! (`--config`, or `campus.toml` in the working directory), `.env`, the
//! `CAMPUS_*` environment variables, then command-line flags.

use crate::error::{CliError, CliResult};
use campus_tenancy::TenancyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "campus.toml";

/// Settings for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON file holding the in-memory backend state
    pub state_file: PathBuf,

    /// PostgreSQL URL; when set, the database backend is used instead
    pub database_url: Option<String>,

    /// PostgreSQL pool size
    pub pool_size: usize,

    /// Engine settings
    pub tenancy: TenancyConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("campus-state.json"),
            database_url: None,
            pool_size: 10,
            tenancy: TenancyConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML configuration text
    pub fn from_toml(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("CAMPUS_STATE_FILE")
            && !path.is_empty()
        {
            self.state_file = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("CAMPUS_DATABASE_URL")
            && !url.is_empty()
        {
            self.database_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_tenancy::HashAlgorithm;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.state_file, PathBuf::from("campus-state.json"));
        assert!(config.database_url.is_none());
        assert_eq!(config.tenancy.default_schema, "public");
    }

    #[test]
    fn test_from_toml() {
        let config = CliConfig::from_toml(
            r#"
            state_file = "/var/lib/campus/state.json"

            [tenancy]
            hash_algorithm = "bcrypt"

            [tenancy.password]
            min_length = 10
            require_digit = true
            "#,
        )
        .unwrap();

        assert_eq!(config.state_file, PathBuf::from("/var/lib/campus/state.json"));
        assert_eq!(config.tenancy.hash_algorithm, HashAlgorithm::Bcrypt);
        assert_eq!(config.tenancy.password.min_length, 10);
        assert!(config.tenancy.password.require_digit);
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            CliConfig::from_toml("state_file = ["),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CliConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
