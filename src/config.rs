//! Configuration file and layered settings resolution.
//!
//! Settings live in `$HOME/.projects-sync/config.toml`. Every field is
//! optional; the effective value for a run is picked with the precedence
//! CLI flag > environment variable > config file > built-in default.
//! Empty or whitespace-only values at any layer fall through to the next.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::remote::DEFAULT_REPO_LIMIT;
use crate::remote::api::DEFAULT_API_URL;
use crate::store::DEFAULT_DB_FILE;

const CONFIG_DIR_NAME: &str = ".projects-sync";
const CONFIG_FILE_NAME: &str = "config.toml";

const DB_ENV_VAR: &str = "PROJECTS_SYNC_DB";
const DEBUG_ENV_VAR: &str = "PROJECTS_SYNC_DEBUG";
const API_URL_ENV_VAR: &str = "PROJECTS_SYNC_API_URL";
const TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// Which remote source implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shell out to the GitHub CLI.
    #[default]
    Gh,
    /// Call the GitHub REST API with a token.
    Api,
}

/// Contents of the config file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// SQLite database location. Relative paths are relative to the working directory.
    pub database_path: Option<String>,
    /// Maximum number of repositories fetched per run.
    pub repo_limit: Option<usize>,
    pub backend: Option<Backend>,
    /// REST API base URL (API backend only).
    pub api_url: Option<String>,
    /// Token for the API backend.
    pub token: Option<String>,
    /// Print full error causes.
    pub debug: Option<bool>,
}

/// Values supplied on the command line for this invocation.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<PathBuf>,
    pub repo_limit: Option<usize>,
    pub backend: Option<Backend>,
    /// `--debug` can only turn debug output on.
    pub debug: bool,
}

/// Environment variables relevant to settings resolution.
#[derive(Debug, Clone, Default)]
pub struct EnvValues {
    pub database_path: Option<String>,
    pub debug: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
}

impl EnvValues {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            database_path: std::env::var(DB_ENV_VAR).ok(),
            debug: std::env::var(DEBUG_ENV_VAR).ok(),
            api_url: std::env::var(API_URL_ENV_VAR).ok(),
            token: TOKEN_ENV_VARS
                .iter()
                .find_map(|key| non_empty_trimmed(std::env::var(key).ok())),
        }
    }

    /// Debug flag from the environment alone.
    pub fn debug_enabled(&self) -> bool {
        self.debug.as_deref().is_some_and(parse_bool_flag)
    }
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub repo_limit: usize,
    pub backend: Backend,
    pub api_url: String,
    pub token: Option<String>,
    pub debug: bool,
}

impl SyncConfig {
    /// `$HOME/.projects-sync/config.toml`, or `None` if `$HOME` is unset.
    pub fn config_path() -> Option<PathBuf> {
        Some(Self::config_path_with_home(home_dir()?.as_path()))
    }

    fn config_path_with_home(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load the config file. A missing file (or unknown `$HOME`) yields defaults.
    ///
    /// Parse and I/O errors other than not-found are hard failures.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
            }
        }
    }

    /// Combine this file with CLI and environment values.
    pub fn resolve(&self, cli: &CliOverrides, env: &EnvValues) -> Result<Settings> {
        let database_path = cli
            .database_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| non_empty_trimmed(env.database_path.clone()).map(PathBuf::from))
            .or_else(|| non_empty_trimmed(self.database_path.clone()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));

        let repo_limit = cli
            .repo_limit
            .or(self.repo_limit)
            .unwrap_or(DEFAULT_REPO_LIMIT);
        if repo_limit == 0 {
            bail!("repo_limit must be at least 1");
        }

        let api_url = non_empty_trimmed(env.api_url.clone())
            .or_else(|| non_empty_trimmed(self.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token =
            non_empty_trimmed(env.token.clone()).or_else(|| non_empty_trimmed(self.token.clone()));

        let debug = cli.debug
            || match env.debug.as_deref() {
                Some(v) if !v.trim().is_empty() => parse_bool_flag(v),
                _ => self.debug.unwrap_or(false),
            };

        Ok(Settings {
            database_path,
            repo_limit,
            backend: cli.backend.or(self.backend).unwrap_or_default(),
            api_url,
            token,
            debug,
        })
    }
}

/// `1`, `true`, `yes` and `on` (any case) enable a flag.
pub fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Return the trimmed value if non-empty after trimming, otherwise `None`.
fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
