//! Circulars CLI
//!
//! Queries the circular API and runs new-circular checks from the shell.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use circulars::{
    checker::CircularCheckerGroup,
    config::load_config,
    error::{AppError, Result},
    models::{Category, Circular, Config, SearchQuery},
    services::CircularApi,
    storage::build_store,
};
use serde::Serialize;

/// Circulars - school circular client and notifier
#[derive(Parser, Debug)]
#[command(name = "circulars", version, about = "School circular client and new-circular checker")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "circulars.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the category names the API knows about
    Categories,

    /// Show the latest circular of a category
    Latest {
        /// Category name or numeric id
        category: Category,
    },

    /// List the circulars of a category, newest first
    List {
        /// Category name or numeric id
        category: Category,

        /// Keep only the first N circulars
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Search circulars by title, or by id for a 4-digit query
    Search {
        query: String,

        /// Number of results to ask for
        #[arg(short, long, default_value_t = 1)]
        amount: u32,
    },

    /// List the page image URLs of a circular
    Images {
        /// Circular download URL
        url: String,
    },

    /// Run one check cycle and print new circulars per category
    Check {
        /// Category to check (repeatable; defaults to [checker].categories)
        #[arg(short = 'C', long = "category")]
        categories: Vec<Category>,
    },

    /// Check repeatedly until interrupted
    Watch {
        /// Category to check (repeatable; defaults to [checker].categories)
        #[arg(short = 'C', long = "category")]
        categories: Vec<Category>,

        /// Seconds between cycles (defaults to [checker].poll_interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Print the stored cursor of a category
    Cursor {
        #[arg(short = 'C', long = "category", default_value = "all")]
        category: Category,
    },

    /// Write the default configuration to the config path
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging from the verbosity flag and `[logging]`.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build a group for the requested categories, falling back to the configured ones.
async fn build_group(config: &Config, categories: Vec<Category>) -> Result<CircularCheckerGroup> {
    let categories = if categories.is_empty() {
        config
            .checker
            .categories
            .iter()
            .map(|c| Category::from_input(c))
            .collect()
    } else {
        categories
    };

    let mut group = CircularCheckerGroup::new();
    for category in categories {
        group.create(config, category).await?;
    }
    log::info!("Checking {} categories", group.len());
    Ok(group)
}

/// Serialize results keyed by category key, in a stable order.
async fn run_cycle(
    group: &mut CircularCheckerGroup,
    limit: usize,
) -> Result<BTreeMap<String, Vec<Circular>>> {
    let results = group.check_concurrent(limit).await?;
    Ok(results
        .into_iter()
        .map(|(category, circulars)| (category.key(), circulars))
        .collect())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Command::InitConfig { .. } => Config::default(),
        _ => load_config(&cli.config)?,
    };
    init_logging(cli.verbose, &config.logging.level);

    match cli.command {
        Command::Categories => {
            let api = CircularApi::new(&config.api)?;
            print_json(&api.categories().await?.to_vec())?;
        }

        Command::Latest { category } => {
            let api = CircularApi::new(&config.api)?;
            print_json(&api.latest(&category).await?)?;
        }

        Command::List { category, limit } => {
            let api = CircularApi::new(&config.api)?;
            print_json(&api.list(&category, limit).await?)?;
        }

        Command::Search { query, amount } => {
            let api = CircularApi::new(&config.api)?;
            let query = SearchQuery::parse(&query)?;
            let found = api.search(&query, amount).await?;
            print_json(&found.map(|r| r.into_vec()))?;
        }

        Command::Images { url } => {
            let api = CircularApi::new(&config.api)?;
            print_json(&api.get_images(&url).await?)?;
        }

        Command::Check { categories } => {
            config.validate()?;
            let mut group = build_group(&config, categories).await?;
            let results = run_cycle(&mut group, config.checker.max_concurrent).await?;
            print_json(&results)?;
        }

        Command::Watch {
            categories,
            interval,
        } => {
            config.validate()?;
            let interval =
                Duration::from_secs(interval.unwrap_or(config.checker.poll_interval_secs).max(1));
            let mut group = build_group(&config, categories).await?;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            log::info!("Watching every {}s; press Ctrl-C to stop", interval.as_secs());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Interrupted, stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match run_cycle(&mut group, config.checker.max_concurrent).await {
                            Ok(results) => {
                                let found: BTreeMap<_, _> = results
                                    .into_iter()
                                    .filter(|(_, circulars)| !circulars.is_empty())
                                    .collect();
                                if !found.is_empty() {
                                    print_json(&found)?;
                                }
                            }
                            Err(e) if e.is_unavailable() => {
                                log::warn!("Check skipped: {}", e);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }

        Command::Cursor { category } => {
            let store = build_store(&config.cache)?;
            store.provision().await?;
            let key = category.key();
            match store.get(&key).await? {
                Some(id) => println!("{key}: {id}"),
                None => println!("{key}: (none)"),
            }
        }

        Command::InitConfig { force } => {
            if cli.config.exists() && !force {
                log::warn!(
                    "Config already exists at {}. Use --force to overwrite.",
                    cli.config.display()
                );
                return Ok(());
            }
            if let Some(parent) = cli.config.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&cli.config, config.to_toml()?)?;
            log::info!("Wrote default configuration to {}", cli.config.display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            let store = build_store(&config.cache)?;
            log::info!("✓ Cache backend: {}", store.describe());

            let configured = config.checker.categories.iter().map(|c| Category::from_input(c));
            for category in configured.filter(|c| !matches!(c, Category::Name(_))) {
                category
                    .validate(&[])
                    .map_err(|e| AppError::config(format!("checker.categories: {e}")))?;
            }
            log::info!("All validations passed!");
        }
    }

    Ok(())
}

