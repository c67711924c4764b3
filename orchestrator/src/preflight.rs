//! Precondition checks run before the first session.

use std::fmt;
use std::path::Path;

use anyhow::Result;

use crate::io::config::RunConfig;

/// A run could not start: invalid configuration or missing inputs.
///
/// Carried inside `anyhow::Error`; callers recover it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionError {
    pub message: String,
}

impl PreconditionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PreconditionError {}

/// Validate config and require the workspace directory and manifest file to exist.
pub fn check_preconditions(config: &RunConfig) -> Result<()> {
    config
        .validate()
        .map_err(|err| PreconditionError::new(format!("invalid config: {err}")))?;
    ensure_dir("workspace", &config.workspace)?;
    ensure_file("manifest", &config.manifest)?;
    Ok(())
}

fn ensure_dir(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(PreconditionError::new(format!("{label} path is not set")).into());
    }
    if !path.exists() {
        return Err(
            PreconditionError::new(format!("{label} does not exist: {}", path.display())).into(),
        );
    }
    if !path.is_dir() {
        return Err(PreconditionError::new(format!(
            "{label} is not a directory: {}",
            path.display()
        ))
        .into());
    }
    Ok(())
}

fn ensure_file(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(PreconditionError::new(format!("{label} path is not set")).into());
    }
    if !path.exists() {
        return Err(
            PreconditionError::new(format!("{label} does not exist: {}", path.display())).into(),
        );
    }
    if !path.is_file() {
        return Err(
            PreconditionError::new(format!("{label} is not a file: {}", path.display())).into(),
        );
    }
    Ok(())
}
