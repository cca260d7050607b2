//! Fatal errors of a reconciliation run.
//!
//! Adapters report failures as `anyhow::Error`; the workflow wraps them into
//! one of these variants when the failure must end the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that terminate a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No account is logged in on the remote source.
    #[error("GitHub authentication failed: {0}")]
    NotAuthenticated(String),

    /// The account token lacks scopes the run depends on.
    #[error("Missing required GitHub scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    /// Listing the account's repositories failed.
    #[error("Failed to get GitHub repos for {account}")]
    RemoteFetch {
        account: String,
        #[source]
        source: anyhow::Error,
    },

    /// The project database could not be opened or bootstrapped.
    #[error("Failed to initialize database at {}", path.display())]
    StoreInit {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Reading stored projects failed.
    #[error("Failed to fetch db projects")]
    StoreRead(#[source] anyhow::Error),

    /// `git clone` exited unsuccessfully.
    #[error("Failed to clone {url}")]
    Clone {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::NotAuthenticated(message.into())
    }

    pub fn clone_failed(url: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Clone {
            url: url.into(),
            source,
        }
    }
}
