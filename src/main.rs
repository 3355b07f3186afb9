mod config;
mod extract;
mod report;
mod transform;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

/// PR ETL — extracts merged GitHub Pull Requests with their review and
/// check-run state, then summarizes quality gates and time-to-merge as CSV.
#[derive(Parser, Debug)]
#[command(name = "pr-etl", version, about)]
struct Cli {
    /// Config file (optional; missing file means defaults)
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for raw JSON snapshots (overrides paths.raw_dir)
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Directory for transformed CSV files (overrides paths.processed_dir)
    #[arg(long, global = true)]
    processed_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract merged PRs, then transform every raw snapshot
    Run(ExtractArgs),
    /// Extract merged PRs into a raw JSON snapshot
    Extract(ExtractArgs),
    /// Transform every raw JSON snapshot into CSV
    Transform,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// GitHub repository in the format 'owner/repo'
    #[arg(long)]
    repo: String,

    /// Keep PRs merged on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    since: Option<String>,

    /// Keep PRs merged on or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    until: Option<String>,

    /// Number of PRs to fetch per page (max 100)
    #[arg(long = "per_page", visible_alias = "per-page", default_value_t = extract::MAX_PAGE_SIZE)]
    per_page: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(path = %cli.config.display(), "loading configuration");
    let config = config::Config::load(&cli.config)?;
    let raw_dir = cli.raw_dir.unwrap_or_else(|| config.paths.raw_dir.clone());
    let processed_dir = cli
        .processed_dir
        .unwrap_or_else(|| config.paths.processed_dir.clone());
    debug!(raw_dir = %raw_dir.display(), processed_dir = %processed_dir.display(), "resolved data directories");

    match cli.command {
        Command::Run(args) => {
            info!("starting PR data extraction");
            run_extract(&config, &args, &raw_dir).await?;
            info!("starting PR data transformation");
            run_transform(&raw_dir, &processed_dir)?;
            info!("data extraction and transformation complete");
        }
        Command::Extract(args) => run_extract(&config, &args, &raw_dir).await?,
        Command::Transform => run_transform(&raw_dir, &processed_dir)?,
    }

    Ok(())
}

async fn run_extract(
    config: &config::Config,
    args: &ExtractArgs,
    raw_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = extract::parse_repo(&args.repo)?;
    let window = extract::MergeWindow::parse(args.since.as_deref(), args.until.as_deref())?;
    debug!(since = ?window.since, until = ?window.until, per_page = args.per_page, "merge window");

    let outcome = extract::run(config, &repo, &window, args.per_page, raw_dir)
        .instrument(info_span!("pr_extract", repo = %repo))
        .await?;
    report::print_extract(&outcome);
    Ok(())
}

fn run_transform(raw_dir: &Path, processed_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let _span = info_span!("pr_transform", raw_dir = %raw_dir.display()).entered();

    let summary = transform::process_raw_files(raw_dir, processed_dir)?;
    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        "transformation complete"
    );
    report::print_transform(&summary);
    Ok(())
}
