use anyhow::Result;
use coc_analyzer::{
    core::config::AnalyzerConfig,
    edgar::{EdgarApi, EdgarClient, RegistryCache},
    market::{MarketData, YahooFinance},
    oracle::OpenAiOracle,
    storage::{ResultStore, SledStore},
    Analyzer, BatchOrchestrator, BatchRun, CancelHandle, CompanyResult, ProgressTracker,
};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use tokio::sync::mpsc;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "coc-cli",
    about = "Change of control payouts as a share of market cap, from DEF 14A filings"
)]
struct Opt {
    /// Companies analyzed concurrently per group
    #[structopt(long)]
    batch_size: Option<usize>,

    /// Directory for the ticker cache and stored results
    #[structopt(long, parse(from_os_str))]
    data_dir: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Analyze one or more companies by name or ticker
    Analyze {
        #[structopt(required = true)]
        names: Vec<String>,
    },
    /// Show stored results ranked by percentage of market cap
    Leaderboard {
        #[structopt(long, default_value = "10")]
        limit: usize,
    },
    /// Download a fresh copy of the SEC company ticker list
    RefreshTickers,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    log::debug!("Logger initialized");

    let opt = Opt::from_args();
    let mut config = AnalyzerConfig::from_env()?;
    if let Some(batch_size) = opt.batch_size {
        config.batch_size = batch_size.max(1);
    }
    if let Some(data_dir) = opt.data_dir {
        config.data_dir = data_dir;
    }

    match opt.cmd {
        Command::Analyze { names } => analyze(&config, names).await,
        Command::Leaderboard { limit } => leaderboard(&config, limit).await,
        Command::RefreshTickers => refresh_tickers(&config).await,
    }
}

fn registry(config: &AnalyzerConfig, edgar: Arc<dyn EdgarApi>) -> Arc<RegistryCache> {
    Arc::new(RegistryCache::new(
        edgar,
        Some(config.tickers_cache_path()),
        config.registry_ttl,
    ))
}

async fn analyze(config: &AnalyzerConfig, names: Vec<String>) -> Result<()> {
    let oracle = Arc::new(OpenAiOracle::from_config(config)?);
    let edgar: Arc<dyn EdgarApi> = Arc::new(EdgarClient::new(&config.user_agent)?);
    let market: Arc<dyn MarketData> = Arc::new(YahooFinance::new()?);
    let store: Arc<dyn ResultStore> = Arc::new(SledStore::open(&config.store_path())?);

    let analyzer = Analyzer::new(edgar.clone(), registry(config, edgar), market, oracle)
        .with_store(store);
    let orchestrator = BatchOrchestrator::new(Arc::new(analyzer))
        .with_batch_size(config.batch_size)
        .with_group_pause(config.group_pause);

    let cancel = CancelHandle::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C! Finishing the current group...");
        handle.cancel();
    })?;

    let tracker = ProgressTracker::new(&names);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let display = tracker.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            display.apply(&update);
        }
    });

    let run = orchestrator.run_batch(names, &cancel, Some(tx)).await;
    progress_task.await?;
    tracker.finish();

    print_summary(&run);
    Ok(())
}

fn print_summary(run: &BatchRun) {
    println!();
    for item in &run.items {
        match &item.result {
            Some(result) => print_result(result),
            None => println!("{} {}", item.query.bold(), "cancelled".yellow()),
        }
    }

    let succeeded = run
        .items
        .iter()
        .filter(|i| i.result.as_ref().is_some_and(|r| r.error.is_none()))
        .count();
    println!(
        "\n{}",
        format!(
            "{} of {} companies analyzed successfully",
            succeeded,
            run.total()
        )
        .bold()
    );
    if run.cancelled {
        println!("{}", "Batch was cancelled before all companies ran".yellow());
    }
}

fn print_result(result: &CompanyResult) {
    let header = match &result.identity {
        Some(identity) => format!(
            "{} ({}) [{}]",
            identity.canonical_name, identity.ticker, result.query
        ),
        None => result.query.clone(),
    };

    if let Some(error) = &result.error {
        // Diagnostic detail stays in the logs.
        println!("{} {}", header.bold(), error.kind.to_string().red());
        if let Some(hint) = error.kind.hint() {
            println!("  {}", hint.yellow());
        }
        if let Some(filing) = &result.filing {
            println!("  Document: {}", filing.document_url.blue());
        }
        return;
    }

    let percentage = result.percentage.unwrap_or_default();
    println!(
        "{} {}",
        header.bold(),
        format!("{:.4}% of market cap", percentage).green().bold()
    );
    println!(
        "  Total payments: ${:.0}  Market cap: ${}",
        result.total_payments,
        result.market_cap.unwrap_or_default()
    );
    for payout in &result.payouts {
        println!("    {:<40} ${:.0}", payout.name, payout.amount);
    }
    if let Some(filing) = &result.filing {
        println!(
            "  DEF 14A filed {}: {}",
            filing.filing_date,
            filing.document_url.blue()
        );
    }
}

async fn leaderboard(config: &AnalyzerConfig, limit: usize) -> Result<()> {
    let store = SledStore::open(&config.store_path())?;
    let entries = store.top(limit).await?;
    if entries.is_empty() {
        println!("{}", "No results stored yet. Run `coc-cli analyze <NAME>` first.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:>4}  {:<8} {:<40} {:>10} {:>16}",
            "#", "Ticker", "Company", "% of cap", "Payments"
        )
        .bold()
    );
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:>4}  {:<8} {:<40} {:>10} {:>16}",
            rank + 1,
            entry.ticker.cyan(),
            entry.company_name,
            format!("{:.4}%", entry.percentage).green(),
            format!("${:.0}", entry.total_payments)
        );
    }
    Ok(())
}

async fn refresh_tickers(config: &AnalyzerConfig) -> Result<()> {
    let edgar: Arc<dyn EdgarApi> = Arc::new(EdgarClient::new(&config.user_agent)?);
    let registry = registry(config, edgar).refresh().await?;
    println!(
        "{} {} companies cached at {}",
        "Refreshed:".green(),
        registry.len(),
        config.tickers_cache_path().display()
    );
    Ok(())
}
