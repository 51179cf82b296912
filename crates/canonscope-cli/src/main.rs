use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use canonscope_catalog::{
    CatalogError, HarvestOptions, HarvestReport, Harvester, PageStore, RateLimitedClient,
    TabulateReport, tabulate,
};
use canonscope_core::metadata::{collect_tei, load_table, save_table};
use canonscope_core::{
    AppConfig, CanonError, CanonStatus, CanonSummary, Classifier, ExitCode, WorkMetadata, YearMatrix,
    write_summary,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "canonscope",
    about = "Harvest catalog reprint records and classify works by canonicity",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $CANONSCOPE_CONFIG or ~/.config/canonscope/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Collection language code, e.g. `fra`.
    #[arg(long, global = true, env = "CANONSCOPE_LANG")]
    lang: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output in JSON format.
    /// Also enabled by setting CANONSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the metadata table from TEI documents.
    Metadata {
        /// Directory of TEI files (default: paths.tei_dir).
        #[arg(long)]
        tei_dir: Option<PathBuf>,
    },

    /// Fetch and store catalog result pages for every work.
    Harvest {
        /// Skip works whose first page is already stored.
        #[arg(long)]
        resume: bool,
        /// Only harvest these work ids.
        #[arg(long = "work", action = clap::ArgAction::Append)]
        works: Vec<String>,
    },

    /// Read stored pages back into the reprint-count matrix.
    Tabulate,

    /// Classify works from the reprint-count matrix.
    Summarize,

    /// Run harvest, tabulate and summarize in sequence.
    Run {
        #[arg(long)]
        resume: bool,
        /// Rebuild the metadata table from TEI documents first.
        #[arg(long)]
        with_metadata: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err) as i32);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();
    let json_output = cli.json || std::env::var("CANONSCOPE_JSON").as_deref() == Ok("1");

    let config = load_config(cli.config.as_deref(), cli.lang.as_deref())?;
    let log_path = match cli.command {
        Commands::Config { .. } => None,
        _ => Some(config.log_path()),
    };
    init_tracing(cli.verbose, log_path.as_deref())?;

    match cli.command {
        // ── Metadata ───────────────────────────────────────────────────────

        Commands::Metadata { tei_dir } => {
            let works = metadata_stage(&config, tei_dir)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "works": works.len(), "table": config.metadata_path() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Wrote {} works to {}", works.len(), config.metadata_path().display());
            }
        }

        // ── Harvest ────────────────────────────────────────────────────────

        Commands::Harvest { resume, works } => {
            let reports = harvest_stage(&config, resume, &works).await?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": reports, "total": reports.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_harvest(&reports);
            }
        }

        // ── Tabulate ───────────────────────────────────────────────────────

        Commands::Tabulate => {
            let reports = tabulate_stage(&config)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": reports, "counts": config.counts_path() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_tabulate(&reports, &config.counts_path());
            }
        }

        // ── Summarize ──────────────────────────────────────────────────────

        Commands::Summarize => {
            let rows = summarize_stage(&config)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": rows, "summary": config.summary_path() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_summary(&rows, &config.summary_path());
            }
        }

        // ── Run ────────────────────────────────────────────────────────────

        Commands::Run { resume, with_metadata } => {
            if with_metadata {
                metadata_stage(&config, None)?;
            }
            let harvested = harvest_stage(&config, resume, &[]).await?;
            let tabulated = tabulate_stage(&config)?;
            let rows = summarize_stage(&config)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "harvest": harvested, "tabulate": tabulated, "summary": rows },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_harvest(&harvested);
                print_tabulate(&tabulated, &config.counts_path());
                print_summary(&rows, &config.summary_path());
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": config,
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
        },
    }

    Ok(())
}

// ─── Stages ─────────────────────────────────────────────────────────────────

fn metadata_stage(config: &AppConfig, tei_dir: Option<PathBuf>) -> Result<Vec<WorkMetadata>> {
    let dir = tei_dir.unwrap_or_else(|| config.tei_dir());
    let works = collect_tei(&dir)
        .with_context(|| format!("reading TEI documents from {}", dir.display()))?;
    if works.is_empty() {
        warn!("no TEI documents found in {}", dir.display());
    }

    let path = config.metadata_path();
    save_table(&path, &works).with_context(|| format!("writing {}", path.display()))?;
    info!("metadata table: {} works", works.len());
    Ok(works)
}

async fn harvest_stage(
    config: &AppConfig,
    resume: bool,
    only: &[String],
) -> Result<Vec<HarvestReport>> {
    let path = config.metadata_path();
    let mut works = load_table(&path).with_context(|| format!("reading {}", path.display()))?;
    if !only.is_empty() {
        if let Some(missing) = only.iter().find(|id| !works.iter().any(|w| &w.id == *id)) {
            bail!(CanonError::ConfigError(format!(
                "work {missing} is not in {}",
                path.display()
            )));
        }
        works.retain(|w| only.contains(&w.id));
    }

    let client = RateLimitedClient::from_config(&config.catalog).context("building HTTP client")?;
    let harvester = Harvester::new(
        client,
        PageStore::new(config.pages_dir()),
        config.locale()?,
        HarvestOptions {
            search_url: config.catalog.search_url.clone(),
            page_stride: config.catalog.page_stride,
            concurrency: config.catalog.concurrency,
            resume,
        },
    );
    Ok(harvester.harvest_all(&works).await)
}

fn tabulate_stage(config: &AppConfig) -> Result<Vec<TabulateReport>> {
    let metadata = load_metadata_if_present(config)?;
    let store = PageStore::new(config.pages_dir());
    let locale = config.locale()?;
    let (matrix, reports) = tabulate(&store, &metadata, &locale.hit_label)
        .with_context(|| format!("reading stored pages from {}", store.dir().display()))?;

    let path = config.counts_path();
    let file = create_output(&path)?;
    matrix
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(reports)
}

fn summarize_stage(config: &AppConfig) -> Result<Vec<CanonSummary>> {
    let counts = config.counts_path();
    let file = File::open(&counts).with_context(|| {
        format!("opening {} (run `canonscope tabulate` first)", counts.display())
    })?;
    let matrix =
        YearMatrix::read_csv(file).with_context(|| format!("reading {}", counts.display()))?;
    let metadata = load_metadata_if_present(config)?;

    let classifier = Classifier::new(config.target_window()?, config.canon.threshold);
    let rows = classifier.summarize(&matrix, &metadata);

    let path = config.summary_path();
    let file = create_output(&path)?;
    write_summary(BufWriter::new(file), &rows)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(rows)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>, lang: Option<&str>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().context("loading config")?,
    };
    if let Some(lang) = lang {
        config.lang = lang.to_string();
    }
    config.validate()?;
    Ok(config)
}

/// Stderr output at the `-v` level, plus warnings and errors copied to the
/// diagnostics log when one is given.
fn init_tracing(verbose: u8, log_path: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level);
    let file_layer = match log_path {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log(path)?))
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::WARN),
        ),
        None => None,
    };

    if tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
    Ok(())
}

fn load_metadata_if_present(config: &AppConfig) -> Result<Vec<WorkMetadata>> {
    let path = config.metadata_path();
    if !path.exists() {
        warn!("{} not found, works will have no author/title", path.display());
        return Ok(Vec::new());
    }
    load_table(&path).with_context(|| format!("reading {}", path.display()))
}

fn create_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

/// Open the diagnostics log for appending, so earlier stages' warnings survive.
fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_harvest(reports: &[HarvestReport]) {
    for r in reports {
        let total = r.total_hits.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
        let note = if r.skipped {
            "skipped".to_string()
        } else if !r.failed_offsets.is_empty() {
            format!("failed offsets {:?}", r.failed_offsets)
        } else {
            String::new()
        };
        println!("{:<16}  {total:>6} hits  {:>4} pages  {note}", r.work_id, r.pages_saved);
    }
    let pages: u32 = reports.iter().map(|r| r.pages_saved).sum();
    println!("Harvested {pages} pages for {} works", reports.len());
}

fn print_tabulate(reports: &[TabulateReport], counts: &Path) {
    for r in reports {
        let note = if r.no_results { "no results" } else { "" };
        println!(
            "{:<16}  {:>4} pages  {:>5} hits  {:>5} counted  {note}",
            r.work_id, r.pages_read, r.hits, r.counted
        );
    }
    println!("Wrote {}", counts.display());
}

fn print_summary(rows: &[CanonSummary], summary: &Path) {
    let high = rows.iter().filter(|r| r.canon_status == CanonStatus::High).count();
    for r in rows {
        println!(
            "{:<16}  {:>5}  {:>5}  {:<4}  {}: {}",
            r.work_id, r.total_counts, r.canon_counts, r.canon_status, r.author, r.title
        );
    }
    println!("{high} of {} works high; wrote {}", rows.len(), summary.display());
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CanonError>() {
            return match e {
                CanonError::UnknownLanguage(_)
                | CanonError::ConfigError(_)
                | CanonError::InvalidWindow { .. }
                | CanonError::TomlParse(_) => ExitCode::InvalidArgs,
                CanonError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    ExitCode::NotFound
                }
                CanonError::Io(_) => ExitCode::FileSystemError,
                _ => ExitCode::GeneralError,
            };
        }
        if let Some(e) = cause.downcast_ref::<CatalogError>() {
            return match e {
                CatalogError::Http(_) | CatalogError::RateLimit(..) => ExitCode::NetworkError,
                CatalogError::Store(_) => ExitCode::FileSystemError,
                _ => ExitCode::GeneralError,
            };
        }
        if let Some(e) = cause.downcast_ref::<std::io::Error>() {
            return if e.kind() == std::io::ErrorKind::NotFound {
                ExitCode::NotFound
            } else {
                ExitCode::FileSystemError
            };
        }
    }
    ExitCode::GeneralError
}
