use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds that abort an invocation before the child command runs.
///
/// Commands return `anyhow::Result`; these values travel inside it and can be
/// recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "credential cache {} is corrupt: {reason}. Remove the file to reset the cache",
        .path.display()
    )]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("MFA session token request failed: {0}")]
    AuthenticationFailed(String),

    #[error("role assumption failed: {0}")]
    AssumeRoleDenied(String),

    #[error("config file {} not found", .path.display())]
    ConfigMissing { path: PathBuf },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("no command given to run")]
    NoCommand,
}

impl Error {
    pub fn cache_corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid(reason.into())
    }
}
