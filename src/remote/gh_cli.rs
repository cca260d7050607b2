//! Remote source backed by the GitHub CLI (`gh`).
//!
//! Authentication is whatever `gh auth login` set up; nothing is stored by
//! this tool.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::process::Command;

use super::{Account, OwnerJson, RemoteSource, parse_scope_list};
use crate::model::{RemoteRepository, Visibility};

/// Fields requested from `gh search repos --json`.
const SEARCH_FIELDS: &str = "url,name,size,owner,visibility,createdAt";

#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl GhCli {
    /// Use `program` as the `gh` executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `gh` and return stdout. Non-zero exit is an error carrying stderr.
    fn gh_output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "gh {} failed (exit {}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("gh output was not valid UTF-8")
    }
}

impl RemoteSource for GhCli {
    fn resolve_account(&self) -> Result<Account> {
        // `gh auth status` prints to stderr on older releases and exits
        // non-zero when logged out, so inspect both streams regardless.
        let output = Command::new(&self.program)
            .args(["auth", "status"])
            .output()
            .with_context(|| format!("failed to execute {}", self.program))?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        parse_auth_status(&text).ok_or_else(|| anyhow::anyhow!("No user logged in to GitHub CLI"))
    }

    fn list_repositories(&self, login: &str, limit: usize) -> Result<Vec<RemoteRepository>> {
        if login.trim().is_empty() {
            bail!("No user provided");
        }
        let limit = limit.to_string();
        let stdout = self.gh_output(&[
            "search",
            "repos",
            "--owner",
            login,
            "--limit",
            &limit,
            "--json",
            SEARCH_FIELDS,
        ])?;
        parse_search_output(&stdout)
    }
}

/// One account block of `gh auth status` output.
#[derive(Debug, Default)]
struct AuthBlock {
    login: String,
    scopes: Vec<String>,
    active: bool,
}

/// Extract the active account from `gh auth status` output.
///
/// Understands both the current layout
/// (`Logged in to github.com account octocat (keyring)`) and the older one
/// (`Logged in to github.com as octocat (oauth_token)`). When several
/// accounts are listed the one marked `Active account: true` wins, otherwise
/// the first.
pub fn parse_auth_status(text: &str) -> Option<Account> {
    let mut blocks: Vec<AuthBlock> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.contains("Logged in to") {
            if let Some(login) = login_from_status_line(line) {
                blocks.push(AuthBlock {
                    login,
                    ..Default::default()
                });
            }
        } else if let Some((_, raw)) = line.split_once("Token scopes:") {
            if let Some(block) = blocks.last_mut() {
                block.scopes = parse_scope_list(raw);
            }
        } else if line.contains("Active account: true")
            && let Some(block) = blocks.last_mut()
        {
            block.active = true;
        }
    }

    let index = blocks.iter().position(|b| b.active).unwrap_or(0);
    if blocks.is_empty() {
        return None;
    }
    let block = blocks.swap_remove(index);
    Some(Account {
        login: block.login,
        scopes: block.scopes,
    })
}

fn login_from_status_line(line: &str) -> Option<String> {
    let mut words = line.split_whitespace();
    while let Some(word) = words.next() {
        if word == "account" || word == "as" {
            let login = words.next()?;
            if login.is_empty() {
                return None;
            }
            return Some(login.to_string());
        }
    }
    None
}

/// Row of `gh search repos --json url,name,size,owner,visibility,createdAt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhSearchRepo {
    name: String,
    url: String,
    #[serde(default)]
    size: u64,
    owner: OwnerJson,
    visibility: Visibility,
    #[serde(default)]
    created_at: String,
}

/// Parse the JSON array printed by `gh search repos`.
pub fn parse_search_output(stdout: &str) -> Result<Vec<RemoteRepository>> {
    let rows: Vec<GhSearchRepo> =
        serde_json::from_str(stdout).context("failed to parse gh search repos output")?;
    Ok(rows
        .into_iter()
        .map(|row| RemoteRepository {
            name: row.name,
            owner_id: row.owner.id,
            size_kb: row.size,
            url: row.url,
            visibility: row.visibility,
            created_at: row.created_at,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
