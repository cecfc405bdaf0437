use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Package \"{package}\" has uncommitted changes. Aborted.")]
    UncommittedChanges { package: String },

    #[error("Repository \"{identifier}\" of package \"{package}\" is invalid.")]
    InvalidRepository { package: String, identifier: String },

    #[error("Branch \"{branch}\" is not available on server.")]
    BranchNotOnServer { branch: String },

    #[error("Command \"{command}\" failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Command \"{command}\" was cancelled")]
    Cancelled { command: String },

    #[error("Command \"{command}\" timed out after {}s", .after.as_secs())]
    TimedOut { command: String, after: Duration },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdateError {
    pub fn invalid_repository(package: &str, identifier: impl Into<String>) -> Self {
        UpdateError::InvalidRepository {
            package: package.to_string(),
            identifier: identifier.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
