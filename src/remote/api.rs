//! Remote source backed by the GitHub REST API.
//!
//! Uses a blocking `reqwest` client with a token taken from configuration.
//! Repositories come from the search endpoint (`user:<login>`), which returns
//! private repositories when the token carries the `repo` scope and caps
//! results at 1000, the same ceiling as `gh search repos`.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Account, OwnerJson, RemoteSource, parse_scope_list};
use crate::model::{RemoteRepository, Visibility};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_PATH: &str = "/user";
const SEARCH_REPOS_PATH: &str = "/search/repositories";

/// Largest page size the search endpoint accepts.
const MAX_PER_PAGE: usize = 100;

/// The search endpoint serves no results past this many; later pages are HTTP 422.
const SEARCH_RESULT_CAP: usize = 1000;

const USER_AGENT: &str = concat!("projects-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    html_url: String,
    #[serde(default)]
    size: u64,
    owner: OwnerJson,
    #[serde(default = "default_visibility")]
    visibility: Visibility,
    #[serde(default)]
    created_at: String,
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

/// GitHub REST client.
///
/// The base URL is trimmed and stripped of trailing slashes so endpoint paths
/// can be appended directly.
pub struct GithubApi {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_get(&self, url: &str) -> Result<reqwest::blocking::RequestBuilder> {
        let token = self.token.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No GitHub token configured. Set GITHUB_TOKEN or `token` in the config file.")
        })?;
        Ok(self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(token))
    }

    fn fetch_search_page(
        &self,
        login: &str,
        per_page: usize,
        page: usize,
    ) -> Result<Vec<SearchItem>> {
        let url = self.url(SEARCH_REPOS_PATH);
        let query = format!("user:{login}");
        let per_page = per_page.to_string();
        let page = page.to_string();
        let resp = self
            .auth_get(&url)?
            .query(&[
                ("q", query.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .with_context(|| format!("failed to connect to GitHub at {url}"))?;
        let body = map_http_error(resp)?;
        let parsed: SearchResponse =
            parse_json(&body, "failed to parse repository search response")?;
        Ok(parsed.items)
    }
}

impl RemoteSource for GithubApi {
    fn resolve_account(&self) -> Result<Account> {
        let url = self.url(USER_PATH);
        let resp = self
            .auth_get(&url)?
            .send()
            .with_context(|| format!("failed to connect to GitHub at {url}"))?;

        // Fine-grained tokens send no scopes header; that reads as no scopes.
        let scopes = resp
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .map(parse_scope_list)
            .unwrap_or_default();

        let body = map_http_error(resp)?;
        let user: UserResponse = parse_json(&body, "failed to parse user response")?;
        Ok(Account {
            login: user.login,
            scopes,
        })
    }

    fn list_repositories(&self, login: &str, limit: usize) -> Result<Vec<RemoteRepository>> {
        if login.trim().is_empty() {
            anyhow::bail!("No user provided");
        }

        let limit = limit.min(SEARCH_RESULT_CAP);
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        let mut repos = Vec::new();
        let mut page = 1;
        while repos.len() < limit && (page - 1) * per_page < SEARCH_RESULT_CAP {
            let items = self.fetch_search_page(login, per_page, page)?;
            let short_page = items.len() < per_page;
            repos.extend(items.into_iter().map(|item| RemoteRepository {
                name: item.name,
                owner_id: item.owner.id,
                size_kb: item.size,
                url: item.html_url,
                visibility: item.visibility,
                created_at: item.created_at,
            }));
            if short_page {
                break;
            }
            page += 1;
        }
        repos.truncate(limit);
        Ok(repos)
    }
}

// ---------------------------------------------------------------------------
// HTTP error mapping
// ---------------------------------------------------------------------------

/// Return the body of a successful response, or a readable error otherwise.
fn map_http_error(resp: reqwest::blocking::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if status.is_success() {
        return Ok(body);
    }

    let detail = extract_error_message(&body);
    match status.as_u16() {
        401 => anyhow::bail!("GitHub rejected the token (HTTP 401): {detail}"),
        403 => anyhow::bail!("GitHub denied the request (HTTP 403): {detail}"),
        422 => anyhow::bail!("GitHub could not process the query: {detail}"),
        500..=599 => anyhow::bail!("GitHub server error (HTTP {status}): {detail}"),
        _ => anyhow::bail!("Unexpected response (HTTP {status}): {detail}"),
    }
}

fn parse_json<T: DeserializeOwned>(body: &str, context: &'static str) -> Result<T> {
    serde_json::from_str::<T>(body).context(context)
}

/// Prefer the `message` field of a GitHub error body; fall back to the raw
/// body, truncated.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(msg) = value.get("message").and_then(|m| m.as_str())
    {
        return msg.to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details provided".to_string();
    }
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
