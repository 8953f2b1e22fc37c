//! CLI command implementations.

pub mod tenants;
pub mod users;

use crate::backend::Backend;
use crate::error::{CliError, CliResult};
use campus_tenancy::Tenancy;
use serde_json::Value;
use std::path::Path;

/// Everything a command needs for one run.
pub struct Context {
    pub backend: Backend,
    pub tenancy: Tenancy,
    pub json: bool,
}

/// Save backend state, then hand back the command's result.
///
/// Also runs when the command aborted, so entries finished before the
/// error reach the state file.
pub fn persist_after<T>(ctx: &Context, result: CliResult<T>) -> CliResult<T> {
    ctx.backend.persist()?;
    result
}

/// Read an input file that must hold a JSON array.
///
/// A missing file, invalid JSON or a non-array top level is fatal; the
/// individual elements are returned unvalidated.
pub fn read_array(path: &Path) -> CliResult<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Parse(format!("cannot read {}: {}", path.display(), e)))?;

    match serde_json::from_str(&content) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(CliError::Parse(format!(
            "{}: expected a JSON array at the top level",
            path.display()
        ))),
        Err(e) => Err(CliError::Parse(format!("{}: {}", path.display(), e))),
    }
}
