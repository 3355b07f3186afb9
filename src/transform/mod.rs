pub mod types;

pub use types::{TransformedRow, CSV_HEADER};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::extract::types::ReviewState;
use crate::extract::PullRequestRecord;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode JSON from {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("PR #{0} has no merged_at timestamp")]
    MissingMergedAt(u64),

    #[error("PR #{0} was merged before it was created")]
    NegativeTimeToMerge(u64),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A raw file that could not be transformed.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one pass over the raw directory.
#[derive(Debug, Clone, Default)]
pub struct TransformSummary {
    /// CSV files written, in processing order
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// Derive the output row for one merged PR.
pub fn transform_record(record: &PullRequestRecord) -> Result<TransformedRow, TransformError> {
    let merged_at = record
        .merged_at
        .ok_or(TransformError::MissingMergedAt(record.number))?;

    let time_to_merge = merged_at - record.created_at;
    if time_to_merge < chrono::Duration::zero() {
        return Err(TransformError::NegativeTimeToMerge(record.number));
    }

    let num_reviewers = record
        .reviews
        .iter()
        .map(|review| review.reviewer.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let cr_passed = !record.reviews.is_empty()
        && record
            .reviews
            .iter()
            .all(|review| review.state == ReviewState::Approved);
    let checks_passed = record.check_runs.iter().all(|run| run.passed());

    Ok(TransformedRow {
        pr_num: record.number,
        title: record.title.clone(),
        author: record.author.clone(),
        created_at: record.created_at,
        merged_at,
        num_reviewers,
        cr_passed,
        checks_passed,
        all_quality_gates_passed: cr_passed && checks_passed,
        time_to_merge,
    })
}

/// Transform every record, keeping input order. The first bad record fails
/// the whole batch.
pub fn transform_records(records: &[PullRequestRecord]) -> Result<Vec<TransformedRow>, TransformError> {
    records.iter().map(transform_record).collect()
}

/// Serialize rows as CSV, header first. No rows still yields the header.
pub fn write_csv<W: std::io::Write>(rows: &[TransformedRow], out: W) -> Result<(), TransformError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Output path for a raw file: `<stem>_transformed.csv` under `output_dir`.
pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}_transformed.csv", stem))
}

/// Read one raw snapshot and write its CSV into `output_dir`.
#[instrument(skip(input, output_dir), fields(input = %input.display()))]
pub fn transform_file(input: &Path, output_dir: &Path) -> Result<PathBuf, TransformError> {
    let contents = fs::read_to_string(input).map_err(|source| TransformError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let records: Vec<PullRequestRecord> =
        serde_json::from_str(&contents).map_err(|source| TransformError::Decode {
            path: input.to_path_buf(),
            source,
        })?;

    if records.is_empty() {
        warn!("no PRs in raw file, writing header only");
    }

    let rows = transform_records(&records)?;
    debug!(rows = rows.len(), "transformed records");

    let mut csv_bytes = Vec::new();
    write_csv(&rows, &mut csv_bytes)?;

    let out_path = output_path(input, output_dir);
    if let Err(e) = fs::write(&out_path, &csv_bytes) {
        // Never leave a truncated CSV behind for a file reported as skipped.
        let _ = fs::remove_file(&out_path);
        return Err(e.into());
    }
    Ok(out_path)
}

/// Transform every `*.json` file in `raw_dir`, in file-name order.
///
/// A file that fails is logged and recorded in the summary; the rest still
/// run. Only an unreadable `raw_dir` or uncreatable `processed_dir` is an
/// error.
pub fn process_raw_files(raw_dir: &Path, processed_dir: &Path) -> Result<TransformSummary, TransformError> {
    fs::create_dir_all(processed_dir)?;

    let entries = fs::read_dir(raw_dir).map_err(|source| TransformError::Read {
        path: raw_dir.to_path_buf(),
        source,
    })?;
    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            inputs.push(path);
        }
    }
    inputs.sort();
    info!(files = inputs.len(), raw_dir = %raw_dir.display(), "transforming raw files");

    let mut summary = TransformSummary::default();
    for input in inputs {
        match transform_file(&input, processed_dir) {
            Ok(out_path) => {
                info!(path = %out_path.display(), "transformed data saved");
                summary.written.push(out_path);
            }
            Err(e) => {
                error!(path = %input.display(), error = %e, "skipping raw file");
                summary.skipped.push(SkippedFile {
                    path: input,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::types::{CheckRunResult, ReviewDecision};
    use chrono::{DateTime, Utc};

    const SAMPLE_RAW: &str = include_str!("../../tests/fixtures/sample_raw.json");

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn review(reviewer: &str, state: ReviewState) -> ReviewDecision {
        ReviewDecision {
            reviewer: reviewer.to_string(),
            state,
        }
    }

    fn check(conclusion: &str) -> CheckRunResult {
        CheckRunResult {
            name: "build".to_string(),
            status: "completed".to_string(),
            conclusion: Some(conclusion.to_string()),
        }
    }

    fn record(reviews: Vec<ReviewDecision>, check_runs: Vec<CheckRunResult>) -> PullRequestRecord {
        PullRequestRecord {
            number: 1,
            title: "Add login".to_string(),
            author: "alice".to_string(),
            created_at: ts("2025-11-12T10:28:52Z"),
            merged_at: Some(ts("2025-11-12T10:30:13Z")),
            head_sha: "abc".to_string(),
            reviews,
            check_runs,
        }
    }

    fn sample_records() -> Vec<PullRequestRecord> {
        serde_json::from_str(SAMPLE_RAW).unwrap()
    }

    #[test]
    fn test_approved_and_passing_pr() {
        let row = transform_record(&record(
            vec![review("bob", ReviewState::Approved)],
            vec![check("success")],
        ))
        .unwrap();
        assert_eq!(types::format_time_to_merge(&row.time_to_merge), "0 days 00:01:21");
        assert!(row.cr_passed);
        assert!(row.checks_passed);
        assert!(row.all_quality_gates_passed);
        assert_eq!(row.num_reviewers, 1);
    }

    #[test]
    fn test_no_reviews_fails_code_review() {
        let row = transform_record(&record(vec![], vec![check("success")])).unwrap();
        assert!(!row.cr_passed);
        assert!(row.checks_passed);
        assert!(!row.all_quality_gates_passed);
        assert_eq!(row.num_reviewers, 0);
    }

    #[test]
    fn test_no_checks_pass_vacuously() {
        let row = transform_record(&record(vec![review("bob", ReviewState::Approved)], vec![])).unwrap();
        assert!(row.checks_passed);
        assert!(row.all_quality_gates_passed);
    }

    #[test]
    fn test_any_non_approval_fails_code_review() {
        let row = transform_record(&record(
            vec![
                review("bob", ReviewState::Approved),
                review("carol", ReviewState::ChangesRequested),
            ],
            vec![check("success")],
        ))
        .unwrap();
        assert!(!row.cr_passed);
        assert!(!row.all_quality_gates_passed);
    }

    #[test]
    fn test_failed_check_fails_gate() {
        let row = transform_record(&record(
            vec![review("bob", ReviewState::Approved)],
            vec![check("success"), check("failure")],
        ))
        .unwrap();
        assert!(row.cr_passed);
        assert!(!row.checks_passed);
        assert!(!row.all_quality_gates_passed);
    }

    #[test]
    fn test_reviewers_counted_once() {
        let row = transform_record(&record(
            vec![
                review("bob", ReviewState::Commented),
                review("bob", ReviewState::Approved),
                review("dave", ReviewState::Approved),
            ],
            vec![],
        ))
        .unwrap();
        assert_eq!(row.num_reviewers, 2);
    }

    #[test]
    fn test_unmerged_record_rejected() {
        let mut pr = record(vec![], vec![]);
        pr.merged_at = None;
        assert!(matches!(
            transform_record(&pr),
            Err(TransformError::MissingMergedAt(1))
        ));
    }

    #[test]
    fn test_merge_before_create_rejected() {
        let mut pr = record(vec![], vec![]);
        pr.merged_at = Some(ts("2025-11-12T10:00:00Z"));
        assert!(matches!(
            transform_record(&pr),
            Err(TransformError::NegativeTimeToMerge(1))
        ));
    }

    #[test]
    fn test_sample_dataset_invariants() {
        let records = sample_records();
        let rows = transform_records(&records).unwrap();
        assert_eq!(rows.len(), records.len());

        for (row, record) in rows.iter().zip(&records) {
            assert_eq!(row.pr_num, record.number);
            assert_eq!(
                row.all_quality_gates_passed,
                row.cr_passed && row.checks_passed
            );
            assert!(row.time_to_merge >= chrono::Duration::zero());
            assert_eq!(
                row.time_to_merge,
                record.merged_at.unwrap() - record.created_at
            );
        }

        // Fourth row: no reviews, all checks green.
        assert!(!rows[3].cr_passed);
        assert!(rows[3].checks_passed);
        assert!(!rows[3].all_quality_gates_passed);
    }

    #[test]
    fn test_write_csv_sample() {
        let rows = transform_records(&sample_records()).unwrap();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).unwrap();
        let csv_text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "PRNum,Title,Author,CreatedAt,MergedAt,Num_Reviewers,CR_Passed,Checks_Passed,AllQualityGatesPassed,TimeToMerge",
                "5,Add audit log export,alice,2025-11-12 10:28:52,2025-11-12 10:30:13,1,True,True,True,0 days 00:01:21",
                "4,\"Fix token refresh, retry once\",carol,2025-11-10 08:00:00,2025-11-11 09:15:30,2,False,False,False,1 days 01:15:30",
                "3,Bump dependencies,dependabot[bot],2025-11-05 12:00:00,2025-11-08 12:00:01,2,True,True,True,3 days 00:00:01",
                "2,Update README,dave,2025-11-03 16:45:00,2025-11-03 17:00:00,0,False,True,False,0 days 00:15:00",
            ]
        );
    }

    #[test]
    fn test_write_csv_empty_has_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        let csv_text = String::from_utf8(buf).unwrap();
        assert_eq!(csv_text.lines().collect::<Vec<_>>(), vec![CSV_HEADER.join(",")]);
    }

    #[test]
    fn test_output_path() {
        let path = output_path(Path::new("data/raw/PRs_20251112_103105.json"), Path::new("out"));
        assert_eq!(path, Path::new("out").join("PRs_20251112_103105_transformed.csv"));
    }

    #[test]
    fn test_transform_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("PRs_20251112_103105.json");
        fs::write(&input, SAMPLE_RAW).unwrap();
        let out_dir = dir.path().join("processed");
        fs::create_dir_all(&out_dir).unwrap();

        let first_path = transform_file(&input, &out_dir).unwrap();
        let first = fs::read(&first_path).unwrap();
        let second_path = transform_file(&input, &out_dir).unwrap();
        let second = fs::read(&second_path).unwrap();

        assert_eq!(first_path, second_path);
        assert_eq!(first, second);
    }

    #[test]
    fn test_process_raw_files_skips_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let raw_dir = dir.path().join("raw");
        let processed_dir = dir.path().join("processed");
        fs::create_dir_all(&raw_dir).unwrap();

        fs::write(raw_dir.join("PRs_a.json"), SAMPLE_RAW).unwrap();
        fs::write(raw_dir.join("PRs_b.json"), "{ not json").unwrap();
        fs::write(raw_dir.join("PRs_c.json"), "[]").unwrap();
        fs::write(raw_dir.join("notes.txt"), "ignored").unwrap();

        let summary = process_raw_files(&raw_dir, &processed_dir).unwrap();

        assert_eq!(
            summary.written,
            vec![
                processed_dir.join("PRs_a_transformed.csv"),
                processed_dir.join("PRs_c_transformed.csv"),
            ]
        );
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, raw_dir.join("PRs_b.json"));
        assert!(summary.skipped[0].reason.contains("decode JSON"));

        let empty = fs::read_to_string(processed_dir.join("PRs_c_transformed.csv")).unwrap();
        assert_eq!(empty.lines().count(), 1);
        assert!(!processed_dir.join("notes_transformed.csv").exists());
    }

    #[test]
    fn test_failed_transform_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("PRs_1.json");
        fs::write(&input, SAMPLE_RAW).unwrap();
        let out_path = transform_file(&input, dir.path()).unwrap();
        let good = fs::read(&out_path).unwrap();

        let mut records = sample_records();
        records[2].merged_at = None;
        fs::write(&input, serde_json::to_string(&records).unwrap()).unwrap();

        assert!(matches!(
            transform_file(&input, dir.path()),
            Err(TransformError::MissingMergedAt(3))
        ));
        assert_eq!(fs::read(&out_path).unwrap(), good);
    }

    #[test]
    fn test_failed_write_leaves_no_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("PRs_1.json");
        fs::write(&input, SAMPLE_RAW).unwrap();
        let missing_dir = dir.path().join("not-created");

        assert!(matches!(
            transform_file(&input, &missing_dir),
            Err(TransformError::Io(_))
        ));
        assert!(!output_path(&input, &missing_dir).exists());
    }

    #[test]
    fn test_process_missing_raw_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = process_raw_files(&dir.path().join("absent"), &dir.path().join("processed"));
        assert!(matches!(result, Err(TransformError::Read { .. })));
    }
}
