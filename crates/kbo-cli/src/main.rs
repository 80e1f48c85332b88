mod logging;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbo_pipeline::{CancellationToken, RunSummary, ThrottlingSink};
use kbo_query::StructuredCriteria;
use kbo_store::Store;
use logging::LogArgs;
use progress::ProgressRenderer;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kbo", about = "Ingest and query the KBO company registry")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Loads a CSV export folder into an empty store (§4.13's fixed step order).
    FullImport(ImportArgs),
    /// Applies an insert/delete CSV export folder to an existing store.
    IncrementalImport(ImportArgs),
    /// Re-derives `company_document`, `company_locations` and the FTS index
    /// without reading any CSV files.
    RebuildCache(RebuildCacheArgs),
    /// Looks up a single company by its enterprise number.
    Lookup(LookupArgs),
    /// Ranked free-text search over the FTS index, or structured `LIKE`
    /// search when any of --name/--street/--house-number/--postal-code/--city is given.
    Search(SearchArgs),
}

#[derive(Debug, clap::Args)]
struct ImportArgs {
    /// Path to the SQLite database file; created if it doesn't exist.
    #[arg(long)]
    db: PathBuf,
    /// Path to the folder holding the KBO CSV export.
    #[arg(long)]
    folder: PathBuf,
    /// Restrict the run to these step names (comma-separated), keeping the
    /// fixed relative order of §4.13. Defaults to every step.
    #[arg(long, value_delimiter = ',')]
    files: Option<Vec<String>>,
}

#[derive(Debug, clap::Args)]
struct RebuildCacheArgs {
    #[arg(long)]
    db: PathBuf,
}

#[derive(Debug, clap::Args)]
struct LookupArgs {
    #[arg(long)]
    db: PathBuf,
    enterprise_number: String,
    #[arg(long)]
    language: Option<String>,
}

#[derive(Debug, clap::Args)]
struct SearchArgs {
    #[arg(long)]
    db: PathBuf,
    /// Free text; ignored when any structured field below is given.
    text: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    street: Option<String>,
    #[arg(long = "house-number")]
    house_number: Option<String>,
    #[arg(long = "postal-code")]
    postal_code: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long, default_value_t = 0)]
    skip: i64,
    #[arg(long, default_value_t = 10)]
    take: i64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log);

    let result = match cli.command {
        Command::FullImport(args) => run_import(args, false).await,
        Command::IncrementalImport(args) => run_import(args, true).await,
        Command::RebuildCache(args) => run_rebuild_cache(args).await,
        Command::Lookup(args) => run_lookup(args),
        Command::Search(args) => run_search(args),
    };

    if let Err(err) = result {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        std::process::exit(1);
    }
}

/// Runs `job` on a blocking thread, racing it against Ctrl-C; a signal
/// flips the shared `CancellationToken` so the engine stops after its
/// current step rather than being killed mid-transaction.
async fn run_cancellable<F>(job: F) -> Result<RunSummary>
where
    F: FnOnce(&CancellationToken) -> Result<RunSummary> + Send + 'static,
{
    let ct = CancellationToken::new();
    let ct_for_job = ct.clone();
    let mut handle = tokio::task::spawn_blocking(move || job(&ct_for_job));

    tokio::select! {
        result = &mut handle => result.context("import task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("received Ctrl-C, cancelling after the current step");
            ct.cancel();
            handle.await.context("import task panicked")?
        }
    }
}

async fn run_import(args: ImportArgs, incremental: bool) -> Result<()> {
    let db = args.db.clone();
    let folder = args.folder.clone();
    let files = args.files.clone();

    let summary = run_cancellable(move |ct| {
        let mut store = Store::open(&db).with_context(|| format!("opening {}", db.display()))?;
        store.init_schema()?;
        let mut sink = ThrottlingSink::new(ProgressRenderer::new());
        let summary = match files {
            Some(names) => {
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                kbo_import::import_files(&mut store, &folder, &refs, incremental, ct, &mut sink)?
            }
            None => kbo_import::full_import(&mut store, &folder, incremental, ct, &mut sink)?,
        };
        Ok(summary)
    })
    .await?;

    if summary.total_errors > 0 {
        tracing::warn!(errors = summary.total_errors, "import completed with row-level errors");
    }
    Ok(())
}

async fn run_rebuild_cache(args: RebuildCacheArgs) -> Result<()> {
    let db = args.db.clone();
    run_cancellable(move |ct| {
        let mut store = Store::open(&db).with_context(|| format!("opening {}", db.display()))?;
        store.init_schema()?;
        let mut sink = ThrottlingSink::new(ProgressRenderer::new());
        Ok(kbo_import::rebuild_cache(&mut store, ct, &mut sink)?)
    })
    .await?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_lookup(args: LookupArgs) -> Result<()> {
    let store = Store::open(&args.db).with_context(|| format!("opening {}", args.db.display()))?;
    let enterprise_number = kbo_ident::EnterpriseNumber::parse(&args.enterprise_number)
        .with_context(|| format!("{:?} is not a valid enterprise number", args.enterprise_number))?;
    match kbo_query::get_company(&store, enterprise_number, args.language.as_deref())? {
        Some(company) => print_json(&company),
        None => {
            eprintln!("no such enterprise: {}", args.enterprise_number);
            std::process::exit(1);
        }
    }
}

/// Structured search (any of name/street/house-number/postal-code/city) takes
/// precedence over free-text search, matching §6.3's "the simpler degenerate
/// path" framing: a caller supplying structured fields wants exact-ish
/// matching, not token ranking.
fn run_search(args: SearchArgs) -> Result<()> {
    let store = Store::open(&args.db).with_context(|| format!("opening {}", args.db.display()))?;
    let criteria = StructuredCriteria {
        name: args.name,
        street: args.street,
        house_number: args.house_number,
        postal_code: args.postal_code,
        city: args.city,
    };
    let has_structured_criteria = criteria.name.is_some()
        || criteria.street.is_some()
        || criteria.house_number.is_some()
        || criteria.postal_code.is_some()
        || criteria.city.is_some();

    let results = if has_structured_criteria {
        kbo_query::search_company_structured(&store, &criteria, args.language.as_deref(), args.skip, args.take)?
    } else {
        let text = args.text.as_deref().unwrap_or_default();
        kbo_query::search_company_fulltext(&store, text, args.language.as_deref(), args.skip, args.take)?
    };
    print_json(&results)
}
