use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::ExtractError;

/// A merged pull request as stored in a raw snapshot.
/// Built from the pulls listing plus the reviews and check-runs endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// None for closed-but-unmerged PRs; those never reach a snapshot
    pub merged_at: Option<DateTime<Utc>>,
    /// Head commit the check runs were fetched for
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub reviews: Vec<ReviewDecision>,
    #[serde(default)]
    pub check_runs: Vec<CheckRunResult>,
}

/// One submitted review on a PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Reviewer's GitHub login
    pub reviewer: String,
    pub state: ReviewState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// One CI check run on the PR's head commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRunResult {
    pub name: String,
    /// queued, in_progress or completed
    pub status: String,
    /// success, failure, neutral, cancelled, skipped, timed_out, ...
    /// None while the run hasn't completed.
    pub conclusion: Option<String>,
}

impl CheckRunResult {
    pub fn passed(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }
}

/// One entry of the closed-pulls listing, before reviews and checks are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PullSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub head_sha: String,
}

/// Repository identifier in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Inclusive merge-date filter. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl MergeWindow {
    /// Build a window from CLI strings.
    ///
    /// A bare `YYYY-MM-DD` covers the whole UTC day: `since` starts at
    /// 00:00:00 and `until` ends at 23:59:59.999999999. RFC 3339
    /// timestamps are taken as exact instants.
    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self, ExtractError> {
        let since = since.map(|s| parse_bound(s, Bound::Start)).transpose()?;
        let until = until.map(|s| parse_bound(s, Bound::End)).transpose()?;

        if let (Some(since), Some(until)) = (since, until) {
            if since > until {
                return Err(ExtractError::InvalidWindow { since, until });
            }
        }

        Ok(Self { since, until })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| ts >= since) && self.until.map_or(true, |until| ts <= until)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>, ExtractError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ExtractError::InvalidDate(raw.to_string()))?;
    let time = match bound {
        Bound::Start => NaiveTime::from_hms_opt(0, 0, 0),
        Bound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999),
    }
    .ok_or_else(|| ExtractError::InvalidDate(raw.to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
