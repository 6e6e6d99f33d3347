//! GitHub REST v3 client for PR metadata/files/contents/trees/comments.
//!
//! Endpoints used:
//! - GET  /repos/{repo}/pulls/{n}
//! - GET  /repos/{repo}/pulls/{n}/files        (field "patch" is unified diff)
//! - GET  /repos/{repo}/contents/{path}?ref=   (raw media type)
//! - GET  /repos/{repo}/git/trees/{ref}?recursive=1
//! - POST /repos/{repo}/pulls/{n}/comments     (inline, side=RIGHT)
//! - POST /repos/{repo}/issues/{n}/comments    (summary)
//!
//! Enterprise installs use `https://<host>/api/v3` as the base. All methods
//! run inside the shared retry helper with the client's policy; the run's
//! cancellation token is captured at construction time.

use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use resilience::{CancellationToken, RetryPolicy, retry};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::diff::{looks_like_binary_patch, parse_unified_diff};
use crate::errors::{PlatformError, PlatformResult};
use crate::types::*;

/// Public GitHub API base.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// GitHub caps the PR file listing at this many entries.
const FILE_LIST_CAP: usize = 3000;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,
    token: String,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl GitHubClient {
    /// Constructs a client.
    ///
    /// `base_api` is [`DEFAULT_API_BASE`] or an Enterprise `…/api/v3` base;
    /// `token` must be non-empty (remote calls are impossible without it).
    pub fn new(
        base_api: String,
        token: String,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> PlatformResult<Self> {
        if token.trim().is_empty() {
            return Err(PlatformError::Config(
                "missing platform token (set PLATFORM_TOKEN)".into(),
            ));
        }
        if !(base_api.starts_with("http://") || base_api.starts_with("https://")) {
            return Err(PlatformError::Config(format!(
                "invalid base api url: {base_api}"
            )));
        }
        let http = Client::builder()
            .user_agent("pr-reviewer/0.1")
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
            policy,
            cancel,
        })
    }

    /// Fetches PR metadata plus the parsed change set.
    pub async fn get_pr(&self, id: &PrId) -> PlatformResult<PrBundle> {
        let meta = self.get_meta(id).await?;
        let changes = self.get_changeset(id).await?;
        Ok(PrBundle { meta, changes })
    }

    /// Fetches PR metadata only (cheap; carries head/base SHAs).
    pub async fn get_meta(&self, id: &PrId) -> PlatformResult<PullRequest> {
        let url = format!("{}/repos/{}/pulls/{}", self.base_api, id.repo, id.number);
        let resp: GitHubPr = self.get_json(&url, "pr-meta").await?;

        Ok(PullRequest {
            id: id.clone(),
            title: resp.title,
            body: resp.body,
            author: resp.user.map(|u| u.login),
            state: resp.state,
            web_url: resp.html_url,
            created_at: resp.created_at,
            updated_at: resp.updated_at,
            head_sha: resp.head.sha,
            base_sha: resp.base.sha,
            head_branch: resp.head.r#ref,
            base_branch: resp.base.r#ref,
        })
    }

    /// Fetches the changed-file list and parses each patch into hunks.
    pub async fn get_changeset(&self, id: &PrId) -> PlatformResult<ChangeSet> {
        let mut files: Vec<GitHubPrFile> = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{}/pulls/{}/files?per_page=100&page={}",
                self.base_api, id.repo, id.number, page
            );
            let batch: Vec<GitHubPrFile> = self.get_json(&url, "pr-files").await?;
            let len = batch.len();
            files.extend(batch);
            if len < 100 || files.len() >= FILE_LIST_CAP {
                break;
            }
            page += 1;
        }

        let is_truncated = files.len() >= FILE_LIST_CAP;
        let mut changes = Vec::with_capacity(files.len());
        for f in files {
            let is_binary = f
                .patch
                .as_deref()
                .map(looks_like_binary_patch)
                .unwrap_or(true);
            let hunks = match &f.patch {
                Some(p) if !is_binary => parse_unified_diff(p),
                _ => Vec::new(),
            };
            let status = match f.status.as_str() {
                "added" => FileStatus::Added,
                "removed" => FileStatus::Removed,
                "renamed" => FileStatus::Renamed,
                _ => FileStatus::Modified,
            };
            changes.push(FileChange {
                path: f.filename,
                previous_path: f.previous_filename,
                status,
                is_binary,
                hunks,
                patch: f.patch,
            });
        }

        Ok(ChangeSet {
            files: changes,
            is_truncated,
        })
    }

    /// Fetches raw file text at a ref. `Ok(None)` on 404.
    pub async fn get_file(
        &self,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> PlatformResult<Option<String>> {
        let encoded: String = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url_owned = format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.base_api,
            repo,
            encoded,
            urlencoding::encode(git_ref)
        );
        let url = url_owned.as_str();
        let this = self;

        let out = retry(&self.policy, &self.cancel, "get-file", || async move {
            let resp = this
                .http
                .get(url)
                .bearer_auth(&this.token)
                .header("Accept", "application/vnd.github.raw+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .send()
                .await
                .map_err(PlatformError::from)?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Ok::<_, PlatformError>(None);
            }
            let resp = Self::check_status(resp, url).await?;
            let text = resp.text().await.map_err(PlatformError::from)?;
            Ok(Some(text))
        })
        .await?;
        Ok(out)
    }

    /// Lists all blob paths of a branch (recursive tree).
    pub async fn get_tree(&self, repo: &str, branch: &str) -> PlatformResult<Vec<TreeEntry>> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.base_api,
            repo,
            urlencoding::encode(branch)
        );
        let resp: GitHubTree = self.get_json(&url, "tree").await?;
        if resp.truncated {
            warn!("tree listing for {repo}@{branch} was truncated by the platform");
        }
        Ok(resp
            .tree
            .into_iter()
            .filter(|e| e.r#type == "blob")
            .map(|e| TreeEntry {
                path: e.path,
                size: e.size,
            })
            .collect())
    }

    /// Posts one inline review comment bound to a head-side line.
    pub async fn post_inline(
        &self,
        id: &PrId,
        commit_sha: &str,
        path: &str,
        line: u32,
        body: &str,
    ) -> PlatformResult<()> {
        let url = format!(
            "{}/repos/{}/pulls/{}/comments",
            self.base_api, id.repo, id.number
        );
        let payload = json!({
            "body": body,
            "commit_id": commit_sha,
            "path": path,
            "line": line,
            "side": "RIGHT",
        });
        self.post_json(&url, &payload, "post-inline").await
    }

    /// Posts one PR-level summary comment.
    pub async fn post_summary(&self, id: &PrId, body: &str) -> PlatformResult<()> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.base_api, id.repo, id.number
        );
        let payload = json!({ "body": body });
        self.post_json(&url, &payload, "post-summary").await
    }

    /// Collects the bodies of existing review + issue comments, so callers
    /// can enforce idempotency via hidden markers.
    pub async fn existing_comment_bodies(&self, id: &PrId) -> PlatformResult<Vec<String>> {
        let mut out = Vec::new();
        for kind in ["pulls", "issues"] {
            let url = format!(
                "{}/repos/{}/{}/{}/comments?per_page=100",
                self.base_api, id.repo, kind, id.number
            );
            let batch: Vec<GitHubComment> = self.get_json(&url, "existing-comments").await?;
            out.extend(batch.into_iter().map(|c| c.body));
        }
        Ok(out)
    }

    /* ----------------------------- internals ----------------------------- */

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        label: &str,
    ) -> PlatformResult<T> {
        let this = self;
        let out = retry(&self.policy, &self.cancel, label, || async move {
            debug!("GET {url}");
            let resp = this
                .http
                .get(url)
                .bearer_auth(&this.token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .send()
                .await
                .map_err(PlatformError::from)?;
            let resp = Self::check_status(resp, url).await?;
            resp.json::<T>()
                .await
                .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
        })
        .await?;
        Ok(out)
    }

    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
        label: &str,
    ) -> PlatformResult<()> {
        let this = self;
        retry(&self.policy, &self.cancel, label, || async move {
            debug!("POST {url}");
            let resp = this
                .http
                .post(url)
                .bearer_auth(&this.token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .json(payload)
                .send()
                .await
                .map_err(PlatformError::from)?;
            Self::check_status(resp, url).await?;
            Ok::<_, PlatformError>(())
        })
        .await?;
        Ok(())
    }

    /// Maps non-success statuses onto the error taxonomy, honoring GitHub's
    /// secondary rate limits (403 with an exhausted-quota header).
    async fn check_status(resp: Response, url: &str) -> PlatformResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let remaining = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        warn!("platform returned {status} for {url}");
        Err(match status.as_u16() {
            401 => PlatformError::Unauthorized,
            403 if remaining.as_deref() == Some("0") || retry_after.is_some() => {
                PlatformError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            403 => PlatformError::Forbidden,
            404 => PlatformError::NotFound(url.to_string()),
            429 => PlatformError::RateLimited {
                retry_after_secs: retry_after,
            },
            code @ 500..=599 => PlatformError::Server(code),
            code => PlatformError::HttpStatus(code),
        })
    }
}

/* --- GitHub response shapes (subset of fields we actually use) --- */

#[derive(Debug, Deserialize)]
struct GitHubPr {
    title: String,
    body: Option<String>,
    state: String,
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user: Option<GitHubUser>,
    head: GitHubRef,
    base: GitHubRef,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    sha: String,
    r#ref: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPrFile {
    filename: String,
    status: String,
    #[serde(default)]
    previous_filename: Option<String>,
    #[serde(default)]
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubTree {
    #[serde(default)]
    truncated: bool,
    tree: Vec<GitHubTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct GitHubTreeEntry {
    path: String,
    r#type: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    body: String,
}
