//! Error types for the campus CLI.

use campus_tenancy::TenancyError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or environment problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input file is not usable at all
    #[error("Parse error: {0}")]
    Parse(String),

    /// Engine error that aborted the command
    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    /// The run finished but some entries failed
    #[error("Run finished with failed entries: {0}")]
    Failures(usize),
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_message() {
        assert_eq!(
            CliError::Failures(3).to_string(),
            "Run finished with failed entries: 3"
        );
    }

    #[test]
    fn test_tenancy_error_is_transparent() {
        let err: CliError = TenancyError::UnknownTenant("ghost".into()).into();
        assert_eq!(err.to_string(), "Unknown tenant: ghost");
    }
}
