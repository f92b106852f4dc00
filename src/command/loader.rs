use crate::command::schema::{CommandDescription, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read command from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse command YAML{}: {source}", located(.path))]
    Yaml {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid command{}: {source}", located(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

/// ` (path)` when the error is tied to a file.
fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

impl LoadError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            LoadError::Io { .. } => self,
            LoadError::Yaml { path: None, source } => LoadError::Yaml {
                path: Some(path),
                source,
            },
            LoadError::Validation { path: None, source } => LoadError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<CommandDescription, LoadError> {
    let command: CommandDescription =
        serde_yaml::from_str(input).map_err(|source| LoadError::Yaml { path: None, source })?;
    command
        .validate()
        .map_err(|source| LoadError::Validation { path: None, source })?;
    Ok(command)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<CommandDescription, LoadError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
