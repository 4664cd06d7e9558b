use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rednote::browser;
use rednote::config::Config;
use rednote::crawler::detail::DetailExtractor;
use rednote::crawler::search::SearchCollector;
use rednote::pipeline::BatchProcessor;
use rednote::storage::{export, NoteStore, SqliteNoteStore};
use rednote::utils::read_links_from_file;

#[derive(Parser)]
#[command(
    name = "rednote",
    version,
    about = "Incremental note collector with politeness-aware batch processing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Configuration file (TOML); environment overrides apply on top
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a keyword and collect a fresh link list, then crawl it
    Search {
        /// Keyword to search for
        keyword: String,

        /// Number of scroll batches to harvest from the result feed
        #[arg(short, long, default_value = "2")]
        batches: u32,

        /// Stop after the link list, skip detail crawling
        #[arg(long, default_value = "false")]
        list_only: bool,
    },

    /// Process an existing link list through the detail pipeline
    Details {
        /// Link file, one note URL per line
        #[arg(short, long)]
        links: PathBuf,
    },

    /// Initialize the storage schema
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current item");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Search {
            keyword,
            batches,
            list_only,
        } => run_search(&config, &keyword, batches, list_only, cancel).await,
        Commands::Details { links } => run_details(&config, &links, cancel).await,
        Commands::Init => run_init(&config),
    }
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("rednote=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("rednote=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn run_init(config: &Config) -> Result<()> {
    let store = SqliteNoteStore::open(&config.storage.sqlite_path)
        .context("storage unreachable at startup")?;
    store.init_schema().context("schema initialization failed")?;
    println!(
        "Schema initialized at {}",
        config.storage.sqlite_path.display()
    );
    Ok(())
}

async fn run_search(
    config: &Config,
    keyword: &str,
    batches: u32,
    list_only: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let store = SqliteNoteStore::open(&config.storage.sqlite_path)
        .context("storage unreachable at startup")?;
    store.init_schema()?;

    let session = browser::connect(&config.browser).await?;
    browser::interactive_login(session.as_ref(), &config.browser).await?;

    let collector = SearchCollector::new(session.clone(), &store, &config.browser);
    let harvest = collector.run(keyword, batches).await?;

    let date = Local::now().format("%Y-%m-%d");
    let table_path = config.output.dir.join(format!("{keyword}_{date}.csv"));
    let links_path = config.output.dir.join(format!("{keyword}_{date}_links.txt"));
    export::write_summary_table(&harvest.summaries, &table_path)?;
    export::write_links(&harvest.links, &links_path)?;
    println!(
        "Collected {} notes; links written to {}",
        harvest.summaries.len(),
        links_path.display()
    );

    if list_only || harvest.links.is_empty() {
        return Ok(());
    }

    let extractor = DetailExtractor::new(
        session,
        config.loader.clone(),
        config.extract.clone(),
    );
    let processor = BatchProcessor::new(&extractor, &store, &config.politeness, cancel);
    let report = processor.process(&harvest.links).await;

    let detail_path = config
        .output
        .dir
        .join(format!("{keyword}_{date}_details.csv"));
    export::write_table(&report.records, &detail_path)?;
    println!(
        "Processed {} items: {} persisted, {} incomplete, {} recovery pauses",
        report.attempted, report.persisted, report.incomplete, report.recoveries
    );
    Ok(())
}

async fn run_details(config: &Config, links: &PathBuf, cancel: CancellationToken) -> Result<()> {
    let urls = read_links_from_file(links).await?;
    if urls.is_empty() {
        anyhow::bail!("link file {} contains no URLs", links.display());
    }

    let store = SqliteNoteStore::open(&config.storage.sqlite_path)
        .context("storage unreachable at startup")?;
    store.init_schema()?;

    let session = browser::connect(&config.browser).await?;
    browser::interactive_login(session.as_ref(), &config.browser).await?;

    let extractor = DetailExtractor::new(
        session,
        config.loader.clone(),
        config.extract.clone(),
    );
    let processor = BatchProcessor::new(&extractor, &store, &config.politeness, cancel);
    let report = processor.process(&urls).await;

    let date = Local::now().format("%Y-%m-%d_%H%M");
    let detail_path = config.output.dir.join(format!("details_{date}.csv"));
    export::write_table(&report.records, &detail_path)?;
    println!(
        "Processed {} items: {} persisted, {} incomplete, {} recovery pauses",
        report.attempted, report.persisted, report.incomplete, report.recoveries
    );
    Ok(())
}
