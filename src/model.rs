//! Repository and project record types shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Repository visibility as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[serde(alias = "PUBLIC")]
    Public,
    #[serde(alias = "PRIVATE")]
    Private,
    #[serde(alias = "INTERNAL")]
    Internal,
    /// Anything else, including an empty column in the local database.
    #[serde(other)]
    Unknown,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Unknown => "unknown",
        }
    }

    /// Parse a known visibility. Matching is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "internal" => Some(Visibility::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository owned by the remote account. Read-only to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub name: String,
    pub owner_id: String,
    pub size_kb: u64,
    pub url: String,
    pub visibility: Visibility,
    /// ISO-8601 creation timestamp as reported by the forge.
    pub created_at: String,
}

/// A project persisted in the local database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub owner_id: String,
    pub size_kb: u64,
    pub url: String,
    pub visibility: Visibility,
    pub created_at: String,
    /// Absolute path of the checkout, or empty when unknown.
    pub path: String,
    /// Reserved. Always empty.
    pub submodule: String,
}

impl ProjectRecord {
    /// Build the record stored for a newly added repository.
    ///
    /// `created_at` is the insertion time, not the remote creation time.
    pub fn from_remote(repo: &RemoteRepository, path: &Path, created_at: String) -> Self {
        Self {
            name: repo.name.clone(),
            owner_id: repo.owner_id.clone(),
            size_kb: repo.size_kb,
            url: repo.url.clone(),
            visibility: repo.visibility,
            created_at,
            path: path.to_string_lossy().to_string(),
            submodule: String::new(),
        }
    }
}

/// Current UTC time formatted as RFC 3339.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
