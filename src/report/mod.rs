use colored::Colorize;

use crate::extract::ExtractOutcome;
use crate::transform::TransformSummary;

/// Print the extraction outcome to the terminal.
pub fn print_extract(outcome: &ExtractOutcome) {
    print!("{}", render_extract(outcome));
}

/// Print the transformation outcome to the terminal.
pub fn print_transform(summary: &TransformSummary) {
    print!("{}", render_transform(summary));
}

/// ✔ Fetched 4 merged PRs from org/repo
///   → data/raw/PRs_20251112_103105.json
fn render_extract(outcome: &ExtractOutcome) -> String {
    format!(
        "{} Fetched {} merged PRs from {}\n  → {}\n",
        "✔".green().bold(),
        outcome.merged_prs,
        outcome.repo,
        outcome.path.display()
    )
}

/// ✔ Transformed 2 raw files
///   → data/processed/PRs_20251112_103105_transformed.csv
///
/// or, when some files failed:
///
/// ! Transformed 1 of 2 raw files, 1 skipped
///   → data/processed/PRs_a_transformed.csv
/// ✖ Skipped data/raw/PRs_broken.json: Failed to decode JSON ...
fn render_transform(summary: &TransformSummary) -> String {
    let mut out = String::new();

    let written = summary.written.len();
    let skipped = summary.skipped.len();
    if skipped == 0 {
        out.push_str(&format!(
            "{} Transformed {} raw files\n",
            "✔".green().bold(),
            written
        ));
    } else {
        out.push_str(&format!(
            "{} Transformed {} of {} raw files, {} skipped\n",
            "!".yellow().bold(),
            written,
            written + skipped,
            skipped
        ));
    }
    for path in &summary.written {
        out.push_str(&format!("  → {}\n", path.display()));
    }

    for file in &summary.skipped {
        out.push_str(&format!(
            "{} Skipped {}: {}\n",
            "✖".red().bold(),
            file.path.display(),
            file.reason
        ));
    }

    out
}
