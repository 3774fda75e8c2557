use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use validator::Validate;

use restock_watcher::config::LoggingConfig;
use restock_watcher::content::{self, ScrapeOptions, DEFAULT_CHUNK_LENGTH};
use restock_watcher::extractor::Extractor;
use restock_watcher::models::{NewTarget, RenderingMode, Target, TargetEdit};
use restock_watcher::monitor::TargetMonitor;
use restock_watcher::notifier;
use restock_watcher::scheduler::MonitorScheduler;
use restock_watcher::scraper::WebScraper;
use restock_watcher::store::TargetStore;
use restock_watcher::AppConfig;

#[derive(Parser)]
#[command(name = "restock-watcher", version, about = "Watch product pages and email when they come back in stock")]
struct Cli {
    /// Target list location, overriding configuration
    #[arg(long, global = true)]
    targets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor every stored target until interrupted
    Run,
    /// Add a target to the list
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "static")]
        mode: RenderingMode,
        /// Text whose presence means "available"
        #[arg(long)]
        indicator: Option<String>,
        /// Element holding the stock text (rendered pages)
        #[arg(long)]
        selector: Option<String>,
        /// Seconds between checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Change fields of a stored target, found by id or name
    Edit {
        key: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        mode: Option<RenderingMode>,
        #[arg(long)]
        indicator: Option<String>,
        /// Element holding the stock text; an empty value clears it
        #[arg(long)]
        selector: Option<String>,
        /// Seconds between checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Remove a target by id or name
    Remove { key: String },
    /// Show stored targets and their last status
    List,
    /// Check one target now and store the result
    Check { key: String },
    /// Fetch a page and print its content in segments
    Scrape {
        url: String,
        #[arg(long, default_value = "static")]
        mode: RenderingMode,
        /// Print visible body text instead of markup
        #[arg(long)]
        clean: bool,
        #[arg(long, default_value_t = DEFAULT_CHUNK_LENGTH)]
        chunk_length: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.targets {
        config.scheduler.targets_path = path;
    }

    let _log_guard = init_tracing(&config.logging)?;

    let store = Arc::new(TargetStore::new(config.scheduler.targets_path.clone()));

    match cli.command {
        Command::Run => run(config, store).await,
        Command::Add {
            name,
            url,
            mode,
            indicator,
            selector,
            interval,
        } => {
            let request = NewTarget {
                name,
                url,
                rendering_mode: mode,
                stock_indicator: indicator,
                element_selector: selector,
                check_interval: Some(interval.unwrap_or(config.scheduler.default_check_interval)),
            };
            request.validate()?;

            let target = Target::new(request);
            if target.check_interval < config.scheduler.min_check_interval {
                bail!(
                    "check interval must be at least {}s",
                    config.scheduler.min_check_interval
                );
            }

            store.add(target.clone()).await?;
            println!("Added {} ({})", target.name, target.id);
            Ok(())
        }
        Command::Edit {
            key,
            name,
            url,
            mode,
            indicator,
            selector,
            interval,
        } => {
            let edit = TargetEdit {
                name,
                url,
                rendering_mode: mode,
                stock_indicator: indicator,
                element_selector: selector,
                check_interval: interval,
            };
            if edit.is_empty() {
                bail!("Nothing to change; pass at least one field");
            }
            edit.validate()?;
            if let Some(interval) = edit.check_interval {
                if interval < config.scheduler.min_check_interval {
                    bail!(
                        "check interval must be at least {}s",
                        config.scheduler.min_check_interval
                    );
                }
            }

            let target = store
                .find(&key)
                .await?
                .with_context(|| format!("No target named or identified by '{}'", key))?;
            match store.update(&target.id, |t| t.apply_edit(edit)).await? {
                Some(updated) => println!("Updated {} ({})", updated.name, updated.id),
                None => bail!("Target '{}' was removed while editing", key),
            }
            Ok(())
        }
        Command::Remove { key } => {
            match store.remove(&key).await? {
                Some(target) => println!("Removed {} ({})", target.name, target.id),
                None => bail!("No target named or identified by '{}'", key),
            }
            Ok(())
        }
        Command::List => {
            let targets = store.try_load().await?;
            if targets.is_empty() {
                println!("No targets stored in {}", store.path().display());
            }
            for target in targets {
                let last_checked = target
                    .last_checked
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  {:<30} {:<13} every {:>5}s  last checked {}  {}",
                    target.id, target.name, target.status, target.check_interval, last_checked, target.url
                );
            }
            Ok(())
        }
        Command::Check { key } => {
            let target = store
                .find(&key)
                .await?
                .with_context(|| format!("No target named or identified by '{}'", key))?;

            let scheduler = build_scheduler(&config, store)?;
            let outcome = scheduler.run_now(&target).await?;
            println!("{}: {}", target.name, outcome.status);
            if let Some(error) = outcome.error {
                println!("  error: {}", error);
            }
            if let Some(image_url) = outcome.image_url {
                println!("  image: {}", image_url);
            }
            Ok(())
        }
        Command::Scrape {
            url,
            mode,
            clean,
            chunk_length,
        } => {
            let scraper = WebScraper::new(config.scraper.clone())?;
            let result = content::scrape(&scraper, &url, &ScrapeOptions { mode, clean }).await?;

            let chunks = result.chunks(chunk_length);
            let total = chunks.len();
            for (index, chunk) in chunks.iter().enumerate() {
                println!("--- segment {}/{} ---", index + 1, total);
                println!("{}", chunk);
            }
            Ok(())
        }
    }
}

async fn run(config: AppConfig, store: Arc<TargetStore>) -> Result<()> {
    info!("Starting Restock Watcher...");

    let targets = store.load().await;
    if targets.is_empty() {
        warn!(path = %store.path().display(), "No targets to monitor");
    }

    let scheduler = build_scheduler(&config, store)?;
    scheduler.start(targets).await;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    scheduler.shutdown().await;

    Ok(())
}

fn build_scheduler(config: &AppConfig, store: Arc<TargetStore>) -> Result<MonitorScheduler> {
    let scraper = Arc::new(WebScraper::new(config.scraper.clone())?);
    let notifier = notifier::from_config(&config.notifications.smtp)?;
    info!("Restock alerts go to the {} notifier", notifier.name());

    let monitor = Arc::new(TargetMonitor::new(
        scraper,
        Extractor::new(config.scraper.element_wait()),
        notifier,
    ));

    Ok(MonitorScheduler::new(monitor, store, config.scheduler.clone()))
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("restock_watcher=info"))?;

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}
