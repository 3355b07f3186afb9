use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

/// CSV header, in column order.
pub const CSV_HEADER: [&str; 10] = [
    "PRNum",
    "Title",
    "Author",
    "CreatedAt",
    "MergedAt",
    "Num_Reviewers",
    "CR_Passed",
    "Checks_Passed",
    "AllQualityGatesPassed",
    "TimeToMerge",
];

/// One output row per merged PR.
/// Field order must stay in step with [`CSV_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedRow {
    #[serde(rename = "PRNum")]
    pub pr_num: u64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "CreatedAt", serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "MergedAt", serialize_with = "serialize_timestamp")]
    pub merged_at: DateTime<Utc>,
    /// Distinct reviewer logins
    #[serde(rename = "Num_Reviewers")]
    pub num_reviewers: usize,
    /// At least one review, and every review is an approval
    #[serde(rename = "CR_Passed", serialize_with = "serialize_flag")]
    pub cr_passed: bool,
    /// Every check run succeeded; vacuously true with no runs
    #[serde(rename = "Checks_Passed", serialize_with = "serialize_flag")]
    pub checks_passed: bool,
    #[serde(rename = "AllQualityGatesPassed", serialize_with = "serialize_flag")]
    pub all_quality_gates_passed: bool,
    /// merged_at - created_at, never negative
    #[serde(rename = "TimeToMerge", serialize_with = "serialize_time_to_merge")]
    pub time_to_merge: Duration,
}

/// `2025-11-12 10:28:52`, UTC with the zone suffix dropped.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

pub fn format_flag(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

/// `D days HH:MM:SS`, with a fractional second part only when one exists.
///
/// Callers guarantee a non-negative duration.
pub fn format_time_to_merge(duration: &Duration) -> String {
    let total_seconds = duration.num_seconds();
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = format!("{} days {:02}:{:02}:{:02}", days, hours, minutes, seconds);

    let nanos = duration.subsec_nanos();
    if nanos > 0 {
        if nanos % 1_000 == 0 {
            out.push_str(&format!(".{:06}", nanos / 1_000));
        } else {
            out.push_str(&format!(".{:09}", nanos));
        }
    }
    out
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(format_flag(*flag))
}

fn serialize_time_to_merge<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_time_to_merge(duration))
}
