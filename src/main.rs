use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use shopsync::cli::args::{Cli, Commands};
use shopsync::cli::commands;
use shopsync::config::{ColorSetting, Config};
use shopsync::storage::{KeyValueStorage, SqliteStorage};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config);

    match config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {},
    }

    let format = cli.output.unwrap_or(config.general.default_output);
    let storage: Arc<dyn KeyValueStorage> =
        Arc::new(SqliteStorage::open().context("Failed to open queue database")?);

    let output = match cli.command {
        Commands::Run(args) => commands::run(&config, storage, &args, format).await?,
        Commands::Status => {
            let queue = commands::open_offline(&config, storage).await;
            commands::status(&queue, format)?
        },
        Commands::List(args) => {
            let queue = commands::open_offline(&config, storage).await;
            commands::list(&queue, &args, format)?
        },
        Commands::Add(args) => {
            let queue = commands::open_offline(&config, storage).await;
            commands::add(&queue, args, format).await?
        },
        Commands::Retry(args) => {
            let queue = commands::open_offline(&config, storage).await;
            commands::retry(&queue, args, format).await?
        },
        Commands::Remove { id } => {
            let queue = commands::open_offline(&config, storage).await;
            commands::remove(&queue, &id, format).await?
        },
        Commands::Clear { force } => {
            let queue = commands::open_offline(&config, storage).await;
            commands::clear(&queue, force, format).await?
        },
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
