use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{CheckRunResult, PullSummary, RepoId, ReviewDecision, ReviewState};
use super::{ExtractError, PullRequestSource};
use crate::config::GitHubConfig;

/// Page size for the per-PR reviews and check-runs listings.
const DETAIL_PAGE_SIZE: u32 = 100;

/// Login GitHub shows for deleted accounts, whose `user` comes back null.
const GHOST_LOGIN: &str = "ghost";

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct Head {
    sha: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    user: Option<User>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    head: Head,
}

#[derive(Deserialize)]
struct ReviewResponse {
    user: Option<User>,
    state: ReviewState,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    total_count: usize,
    check_runs: Vec<CheckRunResult>,
}

/// Thin client over the GitHub REST API, authenticated with a token.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    user_agent: String,
}

impl GitHubClient {
    /// Build a client from the resolved token and the `[github]` config section.
    pub fn new(token: String, config: &GitHubConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            user_agent: config.user_agent.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExtractError> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExtractError::Unauthorized {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.error_for_status()?.json::<T>().await?)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_closed_pulls(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullSummary>, ExtractError> {
        let path = format!("/repos/{}/{}/pulls", repo.owner, repo.repo);
        let query = [
            ("state", "closed".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let pulls: Vec<PullResponse> = self.get_json(&path, &query).await?;
        debug!(count = pulls.len(), "received pulls page");

        Ok(pulls
            .into_iter()
            .map(|pull| PullSummary {
                number: pull.number,
                title: pull.title,
                author: login_or_ghost(pull.user),
                created_at: pull.created_at,
                merged_at: pull.merged_at,
                head_sha: pull.head.sha,
            })
            .collect())
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<ReviewDecision>, ExtractError> {
        let path = format!("/repos/{}/{}/pulls/{}/reviews", repo.owner, repo.repo, number);
        let mut reviews = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [
                ("per_page", DETAIL_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: Vec<ReviewResponse> = self.get_json(&path, &query).await?;
            let batch_len = batch.len();
            reviews.extend(batch.into_iter().map(|review| ReviewDecision {
                reviewer: login_or_ghost(review.user),
                state: review.state,
            }));

            if batch_len < DETAIL_PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        debug!(count = reviews.len(), "received reviews");
        Ok(reviews)
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_check_runs(
        &self,
        repo: &RepoId,
        sha: &str,
    ) -> Result<Vec<CheckRunResult>, ExtractError> {
        let path = format!("/repos/{}/{}/commits/{}/check-runs", repo.owner, repo.repo, sha);
        let mut runs = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [
                ("per_page", DETAIL_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: CheckRunsResponse = self.get_json(&path, &query).await?;
            let batch_empty = batch.check_runs.is_empty();
            runs.extend(batch.check_runs);

            if batch_empty || runs.len() >= batch.total_count {
                break;
            }
            page += 1;
        }

        debug!(count = runs.len(), "received check runs");
        Ok(runs)
    }
}

fn login_or_ghost(user: Option<User>) -> String {
    user.map_or_else(|| GHOST_LOGIN.to_string(), |u| u.login)
}
