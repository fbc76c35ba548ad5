//! CLI error type.

use cefloader::LoaderError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("{0}")]
    Config(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Loader(LoaderError::InvalidConfig(_)) => 2,
            CliError::Loader(_) => 1,
        }
    }
}
