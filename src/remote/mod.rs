//! Remote forge access: who is logged in, and which repositories they own.

pub mod api;
pub mod gh_cli;

use anyhow::Result;
use serde::{Deserialize, Deserializer};

use crate::error::SyncError;
use crate::model::RemoteRepository;

pub use api::GithubApi;
pub use gh_cli::GhCli;

/// Scopes the token must carry for private repositories to be listed.
pub const REQUIRED_SCOPES: &[&str] = &["repo"];

/// Default cap on the number of repositories fetched per run.
pub const DEFAULT_REPO_LIMIT: usize = 1000;

/// The authenticated account and the scopes its token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
    pub scopes: Vec<String>,
}

/// Read-only view of the remote forge.
pub trait RemoteSource {
    /// Resolve the logged-in account. Fails when nobody is logged in.
    fn resolve_account(&self) -> Result<Account>;

    /// List up to `limit` repositories owned by `login`.
    fn list_repositories(&self, login: &str, limit: usize) -> Result<Vec<RemoteRepository>>;
}

/// Ensure every required scope is granted.
pub fn verify_scopes(scopes: &[String], required: &[&str]) -> Result<(), SyncError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|scope| !scopes.iter().any(|s| s == *scope))
        .map(|scope| scope.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SyncError::MissingScopes(missing))
    }
}

/// Split a scope list such as `'gist', 'repo'` or `gist, repo`.
pub fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Owner object shared by the `gh` JSON output and the REST API.
///
/// `gh` reports the GraphQL node id as a string while the REST API uses a
/// number; both are kept as strings.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OwnerJson {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
