use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hlo_cli::commands::{analyze, blocks, csv, game, import};
use hlo_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(hlo_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = hlo_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Import) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let summary = import::run(&mut db)?;
            eprintln!(
                "Imported {} games, {} log rows, {} answers",
                summary.games, summary.logs, summary.answers
            );
        }
        Some(Commands::Game { id, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            game::run(&db, &config, *id, *json)?;
        }
        Some(Commands::Analyze(args)) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let written = analyze::run(&db, &config, args)?;
            eprintln!(
                "Wrote {} reports to {}",
                written.len(),
                config.output_dir.display()
            );
        }
        Some(Commands::Csv { separator }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            csv::run(&db, &config, separator)?;
        }
        Some(Commands::Blocks { id, until }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            blocks::run(&db, *id, until)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
