#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ingredient_harvest_lib::application::{ConflictQueryEngine, HarvestDriver, persist_report};
use ingredient_harvest_lib::domain::HarvestReport;
use ingredient_harvest_lib::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, HttpClient, SqliteIngredientRepository,
    init_logging_with_config,
};

#[derive(Parser, Debug)]
#[command(
    name = "ingredient-harvest",
    version,
    about = "Harvest cosmetic ingredient lists and look up ingredient conflicts"
)]
struct Cli {
    /// Configuration file (JSON); defaults to the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// SQLite database URL override
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog, extract ingredients and store them
    Harvest(HarvestArgs),
    /// Load conflict pairs from a JSON array of definitions
    ImportConflicts { file: PathBuf },
    /// Conflict pairs live across the given products
    Conflicts {
        #[arg(required = true)]
        products: Vec<String>,
    },
    /// Most used ingredients
    Top {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Ingredients of products matching a LIKE pattern
    Product { name: String },
    /// Products listing an ingredient matching a LIKE pattern
    Ingredient { name: String },
    /// Products whose name contains the text
    Search { text: String },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Listing (category or search) URL to crawl
    #[arg(long)]
    listing_url: Option<String>,

    /// Root of the page cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Pause after each live fetch, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Skip the database; only report what was extracted
    #[arg(long)]
    no_persist: bool,

    /// Write the failure records as JSON to this file
    #[arg(long)]
    failures_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config()?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(url) = &cli.database {
        config.database.url = url.clone();
    }
    init_logging_with_config(config.logging.clone())?;

    match cli.command {
        Command::Harvest(args) => run_harvest(config, args).await,
        Command::ImportConflicts { file } => {
            let db = open_database(&config).await?;
            let inserted = ConflictQueryEngine::new(db.pool().clone()).import_file(&file).await?;
            println!("Imported {} new conflict pairs from {}", inserted, file.display());
            db.close().await;
            Ok(())
        }
        Command::Conflicts { products } => {
            let db = open_database(&config).await?;
            let selection: BTreeSet<String> = products.into_iter().collect();
            let conflicts = ConflictQueryEngine::new(db.pool().clone())
                .conflicts_for(&selection)
                .await?;
            if conflicts.is_empty() {
                println!("No conflicts among {} products", selection.len());
            }
            for conflict in conflicts {
                println!(
                    "{:<32} {:<32} {:>2}  {}",
                    conflict.first, conflict.second, conflict.severity, conflict.note
                );
            }
            db.close().await;
            Ok(())
        }
        Command::Top { limit } => {
            let db = open_database(&config).await?;
            let repo = SqliteIngredientRepository::new(db.pool().clone());
            for usage in repo.top_ingredients(limit).await? {
                println!("{:>6}  {}", usage.product_count, usage.name);
            }
            db.close().await;
            Ok(())
        }
        Command::Product { name } => {
            let db = open_database(&config).await?;
            let repo = SqliteIngredientRepository::new(db.pool().clone());
            print_lines(repo.ingredients_of_product(&name).await?);
            db.close().await;
            Ok(())
        }
        Command::Ingredient { name } => {
            let db = open_database(&config).await?;
            let repo = SqliteIngredientRepository::new(db.pool().clone());
            print_lines(repo.products_with_ingredient(&name).await?);
            db.close().await;
            Ok(())
        }
        Command::Search { text } => {
            let db = open_database(&config).await?;
            let repo = SqliteIngredientRepository::new(db.pool().clone());
            for product in repo.search_products(&text).await? {
                match product.brand {
                    Some(brand) => println!("{}  ({})", product.name, brand),
                    None => println!("{}", product.name),
                }
            }
            db.close().await;
            Ok(())
        }
        Command::InitConfig => {
            manager.save_config(&config).await?;
            println!("Configuration written to {}", manager.config_path().display());
            Ok(())
        }
    }
}

async fn open_database(config: &AppConfig) -> Result<DatabaseConnection> {
    let db = DatabaseConnection::from_config(&config.database).await?;
    db.migrate().await?;
    Ok(db)
}

async fn run_harvest(mut config: AppConfig, args: HarvestArgs) -> Result<()> {
    if let Some(url) = args.listing_url {
        config.harvest.listing_url = url;
    }
    if let Some(dir) = args.cache_dir {
        config.harvest.cache_dir = dir;
    }
    if let Some(cooldown) = args.cooldown_ms {
        config.harvest.cooldown_ms = cooldown;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, stopping after the current product");
            interrupt.cancel();
        }
    });

    let client = HttpClient::from_harvest_config(&config.harvest)?;
    let driver = HarvestDriver::new(client, &config.harvest, &config.parsing)?.with_cancellation(cancel);
    let listing_url = config.harvest.listing_url.clone();
    info!("📁 Cache directory: {}", config.harvest.cache_dir.display());

    let report = if args.no_persist {
        driver.harvest(&listing_url).await?
    } else {
        let db = open_database(&config).await?;
        let repo = SqliteIngredientRepository::new(db.pool().clone());
        let report = if config.harvest.persist_incrementally {
            driver.harvest_into(&listing_url, &repo).await?
        } else {
            let report = driver.harvest(&listing_url).await?;
            persist_report(&repo, &report).await?;
            report
        };
        db.close().await;
        report
    };

    print_report(&report, driver.fetcher().live_fetch_count());

    if let Some(path) = args.failures_out {
        let content = serde_json::to_string_pretty(&report.failures)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write failure records to {:?}", path))?;
        println!("Failure records written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &HarvestReport, live_fetches: u64) {
    println!("Run {}", report.run_id);
    println!("  results announced : {}", report.total_results);
    println!("  pages visited     : {}", report.pages_visited.len());
    println!("  products harvested: {}", report.products.len());
    println!("  distinct ingredients: {}", report.distinct_ingredient_count());
    println!("  network fetches   : {}", live_fetches);
    if report.interrupted {
        println!("  interrupted before completion; re-run to resume from the cache");
    }

    if !report.failures.is_empty() {
        println!("Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  {}", failure);
        }
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
