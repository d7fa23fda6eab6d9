mod args;

use std::{
    fs::{self, OpenOptions},
    path::Path,
};

use anyhow::{Context, Result};
use clap::Parser;
use gamelog_core::{
    config::{self, AppConfig},
    GameLibrary, GameMapping,
};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::args::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    config::ensure_default_config()?;
    let mut config = AppConfig::load()?;
    if let Some(store) = args.store {
        config.store_path = store;
    }
    init_logging(&config.log_dir)?;

    let mut library = GameLibrary::from_config(&config)
        .with_context(|| format!("failed to open {}", config.store_path.display()))?;
    let loaded = library.load().context("failed to load games")?;
    tracing::debug!(store = %library.path().display(), loaded, "Library ready");

    match args.command {
        Command::Add {
            title,
            platform,
            status,
        } => {
            let game = library.add(&title, &platform, status.as_deref())?;
            print_json(&game)?;
        }
        Command::Update {
            id,
            status,
            rating,
            review,
        } => {
            let game = library.update(id, status.as_deref(), rating, review.as_deref())?;
            print_json(&game)?;
        }
        Command::List { status } => {
            let games: Vec<GameMapping> = library.get_all(Some(status.as_str()));
            print_json(&games)?;
        }
        Command::Show { id } => {
            let game = library.get_by_id(id)?;
            print_json(&game)?;
        }
        Command::Stats => {
            for (status, count) in library.status_counts() {
                println!("{status}: {count}");
            }
            println!("Total: {}", library.len());
        }
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("gamelog.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
