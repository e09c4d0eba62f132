//! # snapdiff CLI - What changed since last time?
//!
//! Command-line front end for the snapdiff change detector.
//!
//! ## Usage
//! ```bash
//! # Record the current state (first run) or report changes since the last run
//! snapdiff run
//!
//! # Preview changes without updating the stored snapshot
//! snapdiff status
//!
//! # Machine-readable output
//! snapdiff run --json
//!
//! # Inspect the stored snapshot
//! snapdiff show --limit 20
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use snapdiff::{
    format_bytes, ChangeDetector, ChangeReporter, DetectorBuilder, DiffResult, FileSnapshotStore,
    FingerprintKind, JsonReporter, ProgressCallback, ProgressInfo, RenamePolicy, RunLock, Scanner,
    SnapshotStore, DEFAULT_HASH_THRESHOLD,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Name of the store directory created under the root by default
const DEFAULT_STORE_DIR: &str = ".snapdiff";

/// snapdiff - report added, modified, deleted and renamed files between runs
#[derive(Parser)]
#[command(name = "snapdiff")]
#[command(version)]
#[command(about = "Snapshot a directory tree and report what changed since the previous run")]
#[command(long_about = None)]
struct Cli {
    /// Directory to scan (defaults to current)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Snapshot store directory (defaults to <path>/.snapdiff)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Largest file size in bytes that is content-hashed
    #[arg(short, long, global = true, default_value_t = DEFAULT_HASH_THRESHOLD)]
    threshold: u64,

    /// Fingerprinting worker threads (defaults to CPU count)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Ignore patterns (gitignore syntax), repeatable
    #[arg(short, long, global = true)]
    ignore: Vec<String>,

    /// Only pair renames on content digests, never on size/mtime tags
    #[arg(long, global = true)]
    content_only_renames: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect changes, report them and store the new snapshot
    Run {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Show progress
        #[arg(long)]
        progress: bool,

        /// Limit listed paths per category
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show pending changes without storing a new snapshot
    #[command(alias = "st")]
    Status {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Limit listed paths per category
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Describe the stored snapshot
    Show {
        /// Limit listed records
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("snapdiff=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Run command
    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Resolved global options
struct Paths {
    root_path: PathBuf,
    store_path: PathBuf,
    default_store: bool,
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let root_path = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let (store_path, default_store) = match cli.store.clone() {
        Some(path) => (path, false),
        None => (root_path.join(DEFAULT_STORE_DIR), true),
    };
    let paths = Paths {
        root_path,
        store_path,
        default_store,
    };

    match cli.command {
        Commands::Run { json, progress, limit } => cmd_run(&cli, &paths, json, progress, limit),
        Commands::Status { json, limit } => cmd_status(&cli, &paths, json, limit),
        Commands::Show { limit } => cmd_show(&paths, limit),
    }
}

/// Open the store, creating the default one on first use
fn open_store(paths: &Paths) -> Result<FileSnapshotStore> {
    let store = if paths.default_store {
        FileSnapshotStore::create(&paths.store_path)
    } else {
        FileSnapshotStore::open(&paths.store_path)
    };
    store.with_context(|| format!("cannot use snapshot store {}", paths.store_path.display()))
}

fn build_detector(cli: &Cli, paths: &Paths, store: FileSnapshotStore) -> Result<ChangeDetector<FileSnapshotStore>> {
    let mut builder = DetectorBuilder::new().hash_threshold(cli.threshold);
    if let Some(workers) = cli.workers {
        builder = builder.parallel_workers(workers);
    }
    if cli.content_only_renames {
        builder = builder.rename_policy(RenamePolicy::ContentOnly);
    }
    builder
        .build(paths.root_path.clone(), store)
        .with_context(|| format!("cannot watch {}", paths.root_path.display()))
}

fn scan(cli: &Cli, paths: &Paths) -> Result<Vec<snapdiff::ScanEntry>> {
    let mut scanner = Scanner::new(paths.root_path.clone())
        .with_ignore_patterns(cli.ignore.clone())
        .with_exclude_dir(paths.store_path.clone());
    if let Some(workers) = cli.workers {
        scanner = scanner.with_parallel_workers(workers);
    }
    scanner
        .scan()
        .with_context(|| format!("failed to scan {}", paths.root_path.display()))
}

/// Detect, report and rotate
///
/// Holds the store's run lock so two invocations never interleave their
/// load and save.
fn cmd_run(cli: &Cli, paths: &Paths, json: bool, show_progress: bool, limit: Option<usize>) -> Result<()> {
    let store = open_store(paths)?;
    let _lock = RunLock::acquire(store.dir()).context("another run is in progress")?;
    let detector = build_detector(cli, paths, store)?;

    let start = Instant::now();
    let entries = scan(cli, paths)?;

    let bar = show_progress.then(|| progress_bar(entries.len() as u64));
    let callback = bar.clone().map(|pb| -> ProgressCallback {
        Arc::new(move |info: ProgressInfo| {
            pb.set_position(info.processed as u64);
            if let Some(item) = info.current_item {
                pb.set_message(item);
            }
            // Clear before the reporter prints
            if Some(info.processed) == info.total {
                pb.finish_and_clear();
            }
        })
    });

    let mut text = TextReporter { limit };
    let mut json_reporter = JsonReporter::new(std::io::stdout());
    let reporter: &mut dyn ChangeReporter = if json { &mut json_reporter } else { &mut text };

    let outcome = detector.run(&entries, reporter, callback);
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
    let summary = outcome.context("change detection failed")?;

    if !json {
        if summary.bootstrap {
            println!(
                "{} Recorded initial snapshot of {} files",
                "✓".green().bold(),
                summary.files_scanned.to_string().cyan()
            );
        } else {
            println!("{} Snapshot updated", "✓".green().bold());
        }
        if summary.metadata_fallbacks > 0 {
            println!(
                "  Metadata fingerprints: {}",
                summary.metadata_fallbacks.to_string().yellow()
            );
        }
        println!("  Time: {}", format_duration(round_ms(start.elapsed())).to_string().cyan());
    }

    Ok(())
}

/// Preview changes since the stored snapshot
fn cmd_status(cli: &Cli, paths: &Paths, json: bool, limit: Option<usize>) -> Result<()> {
    let store = open_store(paths)?;
    let has_snapshot = store.has_snapshot();
    let detector = build_detector(cli, paths, store)?;
    let entries = scan(cli, paths)?;

    let result = detector.preview(&entries, None).context("change detection failed")?;

    if json {
        JsonReporter::new(std::io::stdout()).report(&result)?;
        return Ok(());
    }

    if !has_snapshot {
        println!("{}", "No stored snapshot yet; every file is new".yellow());
    }
    TextReporter { limit }.report(&result)?;
    Ok(())
}

/// Summarize the stored snapshot
fn cmd_show(paths: &Paths, limit: usize) -> Result<()> {
    let store = FileSnapshotStore::open(&paths.store_path)
        .with_context(|| format!("no snapshot store at {}", paths.store_path.display()))?;
    let snapshot = store.load().context("failed to load snapshot")?;

    println!("{}", "Stored snapshot:".blue().bold());
    println!("  Location: {}", store.snapshot_path().display());
    println!("  Files: {}", snapshot.len().to_string().cyan());
    println!("  Size: {}", format_bytes(snapshot.total_size()).cyan());
    println!(
        "  Metadata fingerprints: {}",
        snapshot.metadata_fingerprint_count().to_string().cyan()
    );

    if snapshot.is_empty() {
        return Ok(());
    }

    println!();
    for record in snapshot.iter().take(limit) {
        let tag = match record.fingerprint.kind() {
            FingerprintKind::Content => record.fingerprint.short().dimmed(),
            FingerprintKind::Metadata => "metadata".yellow(),
        };
        println!(
            "  {:<10} {:>10}  {}",
            tag,
            format_bytes(record.size),
            record.rel_path
        );
    }
    if snapshot.len() > limit {
        println!("  ... and {} more", snapshot.len() - limit);
    }

    Ok(())
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn round_ms(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// Colored, human-readable listing of a result
struct TextReporter {
    limit: Option<usize>,
}

impl TextReporter {
    fn section<T>(&self, title: ColoredString, items: &[T], line: impl Fn(&T) -> String) {
        if items.is_empty() {
            return;
        }
        println!("\n{}", title);
        let shown = self.limit.unwrap_or(items.len());
        for item in items.iter().take(shown) {
            println!("  {}", line(item));
        }
        if items.len() > shown {
            println!("  ... and {} more", items.len() - shown);
        }
    }
}

impl ChangeReporter for TextReporter {
    fn report(&mut self, result: &DiffResult) -> snapdiff::Result<()> {
        let stats = result.stats();

        println!("{}", "Summary:".bold());
        if !stats.has_changes() {
            println!("  {}", "No changes".dimmed());
            return Ok(());
        }
        println!(
            "  Added: {} files ({})",
            stats.files_added.to_string().green(),
            format_bytes(stats.bytes_added).green()
        );
        println!(
            "  Modified: {} files ({})",
            stats.files_modified.to_string().yellow(),
            format_bytes(stats.bytes_modified).yellow()
        );
        println!(
            "  Deleted: {} files ({})",
            stats.files_deleted.to_string().red(),
            format_bytes(stats.bytes_deleted).red()
        );
        println!("  Renamed: {} files", stats.files_renamed.to_string().cyan());

        self.section("Added files:".green().bold(), &result.added, |r| {
            format!("+ {}", r.rel_path.green())
        });
        self.section("Modified files:".yellow().bold(), &result.modified, |m| {
            let delta = m.size_delta();
            let sign = if delta >= 0 { "+" } else { "-" };
            format!(
                "~ {} ({}{})",
                m.rel_path.yellow(),
                sign,
                format_bytes(delta.unsigned_abs())
            )
        });
        self.section("Deleted files:".red().bold(), &result.deleted, |r| {
            format!("- {}", r.rel_path.red())
        });
        self.section("Renamed files:".cyan().bold(), &result.renamed, |r| {
            let note = if r.fingerprint.is_metadata() { " (by size/mtime)".dimmed().to_string() } else { String::new() };
            format!("> {} -> {}{}", r.from, r.to.cyan(), note)
        });

        Ok(())
    }
}
