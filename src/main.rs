//! Case extractor CLI - walks the PJN portal's paginated search results and
//! persists one record per case.
//!
//! Requires a running chromedriver and, since the portal gates searches
//! behind a CAPTCHA, an operator at the keyboard: the extractor waits for
//! confirmation before submitting the search.

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use expedientes::{
    ExtractionSummary, Extractor, ExtractorOptions, JsonlSink, MemorySink, PostgresSink,
    RecordSink, SearchRequest, WebPortal,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract judicial case records from the PJN portal", long_about = None)]
struct Args {
    /// Party-name search term
    #[arg(short, long, default_value = "residuos")]
    search_term: String,

    /// Jurisdiction option value on the portal's select (10 = commercial)
    #[arg(short, long, default_value = "10")]
    jurisdiction: String,

    /// WebDriver server URL (chromedriver)
    #[arg(long, default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Run the browser headless (the CAPTCHA needs a visible window)
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Bounded wait for DOM markers, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    wait_ms: u64,

    /// Settle delay after advancing a page, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    page_delay_ms: u64,

    /// Maximum number of list pages to walk (0 = all)
    #[arg(long, default_value_t = 0)]
    max_pages: usize,

    /// Output file, one JSON record per line
    #[arg(short, long, default_value = "expedientes.jsonl")]
    output: PathBuf,

    /// Persist to Postgres (POSTGRES_URI) instead of the output file
    #[arg(long, default_value_t = false)]
    postgres: bool,

    /// Dry run - extract but keep records in memory only
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

async fn build_sink(args: &Args) -> Result<Box<dyn RecordSink + Send>> {
    if args.dry_run {
        warn!("DRY RUN MODE - records are extracted but not persisted");
        return Ok(Box::new(MemorySink::new()));
    }
    if args.postgres {
        let database_url = env::var("POSTGRES_URI").context("POSTGRES_URI must be set")?;
        let sink = PostgresSink::connect(&database_url).await?;
        info!("Connected to database");
        return Ok(Box::new(sink));
    }
    let sink = JsonlSink::open(&args.output)?;
    info!("Appending records to {}", args.output.display());
    Ok(Box::new(sink))
}

async fn scrape(
    portal: &WebPortal,
    sink: &mut Box<dyn RecordSink + Send>,
    args: &Args,
) -> Result<ExtractionSummary> {
    let request = SearchRequest {
        term: args.search_term.clone(),
        jurisdiction: args.jurisdiction.clone(),
    };
    portal.open_search(&request).await?;
    portal.submit_after_captcha().await?;

    let options = ExtractorOptions {
        page_delay: Duration::from_millis(args.page_delay_ms),
        max_pages: (args.max_pages > 0).then_some(args.max_pages),
    };
    Ok(Extractor::new(portal, sink, options).run().await)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting case extractor...");

    let mut sink = build_sink(&args).await?;

    let portal = WebPortal::connect(
        &args.webdriver_url,
        args.headless,
        Duration::from_millis(args.wait_ms),
    )
    .await
    .context("Failed to start browser session")?;

    // The session is scoped to this run: release it on every path before
    // reporting, including setup failures after the browser opened.
    let outcome = scrape(&portal, &mut sink, &args).await;
    if let Err(e) = portal.quit().await {
        warn!("Failed to close browser session cleanly: {e}");
    }

    let summary = outcome?;
    summary.log();

    if summary.fatal {
        std::process::exit(1);
    }
    Ok(())
}
