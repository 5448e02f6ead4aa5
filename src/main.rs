use catalog_scraper::catalog::Catalog;
use catalog_scraper::config::ScraperConfig;
use catalog_scraper::jobs;
use catalog_scraper::server::{self, AppState};
use catalog_scraper::spiders::{SpiderKind, SpiderOverrides};
use clap::{Parser, Subcommand};
use env_logger::Env;
use futures::future::join_all;
use std::error::Error;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        address: String,
    },
    /// Run a single spider to completion
    Run {
        /// Spider type (amazon, product_page)
        #[arg(short, long)]
        spider: String,

        /// Replace the spider's start URL
        #[arg(long)]
        start_url: Option<String>,
    },
    /// Dispatch the daily spider set
    RunDaily {
        /// Specific spider type to run
        #[arg(long = "type")]
        spider_type: Option<String>,

        /// Run all available spiders
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let env = Env::default()
        .filter_or("RUST_LOG", "info")
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::init_from_env(env);

    let config = Arc::new(load_config(cli.config.as_deref())?);
    let catalog = Catalog::connect(&config.database_url).await?;

    match cli.command {
        Commands::Serve { address } => {
            println!("Starting server on {}", address);
            let state = AppState { config, catalog };
            server::serve(&address, state).await?;
            Ok(())
        }
        Commands::Run { spider, start_url } => {
            let kind = SpiderKind::from_str(&spider)?;
            let overrides = SpiderOverrides {
                start_urls: start_url.map(|url| vec![url]),
            };

            log::info!("Running spider '{}'...", kind.display_name());
            let start = Instant::now();

            let stats = jobs::run_spider(config, catalog, kind, overrides).await?;

            log::info!("Scrape completed in {:?}", start.elapsed());
            println!(
                "Dispatched {} request(s), scraped {} item(s) ({} duplicate(s) dropped, {} failed)",
                stats.requests_dispatched,
                stats.items_scraped,
                stats.requests_dropped,
                stats.requests_failed
            );
            Ok(())
        }
        Commands::RunDaily { spider_type, all } => {
            let kinds: Vec<SpiderKind> = if all {
                SpiderKind::available()
            } else if let Some(value) = spider_type {
                vec![SpiderKind::from_str(&value)?]
            } else {
                vec![SpiderKind::Amazon]
            };

            println!("Dispatching jobs for {} spider(s)...", kinds.len());
            let mut handles = Vec::with_capacity(kinds.len());
            for kind in kinds {
                println!("Dispatching {} spider...", kind.display_name());
                let (_, handle) = jobs::dispatch(
                    Arc::clone(&config),
                    catalog.clone(),
                    kind,
                    SpiderOverrides::default(),
                );
                handles.push(handle);
            }

            // Keep the process alive until the dispatched jobs finish.
            join_all(handles).await;
            println!("Daily spider jobs completed.");
            Ok(())
        }
    }
}

fn load_config(path: Option<&str>) -> Result<ScraperConfig, Box<dyn Error + Send + Sync>> {
    match path {
        Some(path) => {
            println!("Loading configuration from: {}", path);
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
            let config = serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?;
            Ok(config)
        }
        None => Ok(ScraperConfig::default()),
    }
}
