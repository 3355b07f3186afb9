pub mod github;
pub mod types;

pub use github::GitHubClient;
pub use types::{MergeWindow, PullRequestRecord, RepoId};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use types::{CheckRunResult, PullSummary, ReviewDecision};

/// GitHub caps `per_page` at 100.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub rejected credentials ({status}) for {url}")]
    Unauthorized { status: u16, url: String },

    #[error("GitHub token not found in config or environment")]
    MissingToken,

    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepo(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    #[error("Empty merge window: since {since} is after until {until}")]
    InvalidWindow {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("Invalid page size {0}, expected 1..=100")]
    InvalidPageSize(u32),

    #[error("Failed to write raw snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize raw snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read access to a repository's pull requests.
/// Implemented over HTTP by [`GitHubClient`].
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// One page (1-based) of closed PRs in API order. An empty page means
    /// there are no more.
    async fn list_closed_pulls(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullSummary>, ExtractError>;

    /// All reviews submitted on PR `number`.
    async fn list_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ReviewDecision>, ExtractError>;

    /// All check runs reported for commit `sha`.
    async fn list_check_runs(
        &self,
        repo: &RepoId,
        sha: &str,
    ) -> Result<Vec<CheckRunResult>, ExtractError>;
}

/// Parse `owner/repo` into its two segments.
pub fn parse_repo(raw: &str) -> Result<RepoId, ExtractError> {
    let invalid = || ExtractError::InvalidRepo(raw.to_string());
    let (owner, repo) = raw.trim().split_once('/').ok_or_else(invalid)?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(invalid());
    }

    Ok(RepoId {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

/// Walks the closed-PR listing page by page and attaches review and
/// check-run state to every merged PR inside the window.
pub struct Extractor<S> {
    source: S,
}

impl<S: PullRequestSource> Extractor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Fetch every merged PR in `window`, in API order.
    ///
    /// Requests run strictly one after another. Any API failure aborts the
    /// whole fetch.
    #[instrument(skip(self, repo, window), fields(repo = %repo))]
    pub async fn fetch_merged(
        &self,
        repo: &RepoId,
        window: &MergeWindow,
        per_page: u32,
    ) -> Result<Vec<PullRequestRecord>, ExtractError> {
        if per_page == 0 || per_page > MAX_PAGE_SIZE {
            return Err(ExtractError::InvalidPageSize(per_page));
        }

        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let pulls = self.source.list_closed_pulls(repo, page, per_page).await?;
            if pulls.is_empty() {
                debug!(page, "empty page, pagination done");
                break;
            }
            debug!(page, pulls = pulls.len(), "processing page");

            for pull in pulls {
                let Some(merged_at) = pull.merged_at else {
                    debug!(pr = pull.number, "skipping unmerged PR");
                    continue;
                };
                if !window.contains(merged_at) {
                    debug!(pr = pull.number, %merged_at, "skipping PR outside merge window");
                    continue;
                }

                let reviews = self.source.list_reviews(repo, pull.number).await?;
                let check_runs = self.source.list_check_runs(repo, &pull.head_sha).await?;
                debug!(
                    pr = pull.number,
                    reviews = reviews.len(),
                    check_runs = check_runs.len(),
                    "collected PR details"
                );

                records.push(PullRequestRecord {
                    number: pull.number,
                    title: pull.title,
                    author: pull.author,
                    created_at: pull.created_at,
                    merged_at: Some(merged_at),
                    head_sha: pull.head_sha,
                    reviews,
                    check_runs,
                });
            }

            page += 1;
        }

        Ok(records)
    }
}

/// Outcome of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub repo: RepoId,
    pub path: PathBuf,
    pub merged_prs: usize,
}

/// Fetch merged PRs for `repo` and write them as one raw snapshot under
/// `raw_dir`.
pub async fn run(
    config: &Config,
    repo: &RepoId,
    window: &MergeWindow,
    per_page: u32,
    raw_dir: &Path,
) -> Result<ExtractOutcome, ExtractError> {
    run_with_token(config.github_token(), config, repo, window, per_page, raw_dir).await
}

async fn run_with_token(
    token: Option<String>,
    config: &Config,
    repo: &RepoId,
    window: &MergeWindow,
    per_page: u32,
    raw_dir: &Path,
) -> Result<ExtractOutcome, ExtractError> {
    let token = token.ok_or(ExtractError::MissingToken)?;
    let extractor = Extractor::new(GitHubClient::new(token, &config.github));

    let records = extractor.fetch_merged(repo, window, per_page).await?;
    info!(repo = %repo, merged_prs = records.len(), "fetched merged PRs");

    let path = write_raw(raw_dir, &records, Utc::now())?;
    info!(path = %path.display(), "raw PR data saved");

    Ok(ExtractOutcome {
        repo: repo.clone(),
        path,
        merged_prs: records.len(),
    })
}

/// Write `records` as a pretty-printed JSON array to
/// `PRs_YYYYMMDD_HHMMSS.json` under `dir`, creating `dir` if needed.
pub fn write_raw(
    dir: &Path,
    records: &[PullRequestRecord],
    now: DateTime<Utc>,
) -> Result<PathBuf, ExtractError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(raw_file_name(now));
    let json = serde_json::to_string_pretty(records)?;
    fs::write(&path, json)?;
    Ok(path)
}

fn raw_file_name(now: DateTime<Utc>) -> String {
    format!("PRs_{}.json", now.format("%Y%m%d_%H%M%S"))
}
