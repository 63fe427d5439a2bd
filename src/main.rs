use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod feed;
mod jobs;
mod models;
mod services;
mod text;

#[cfg(test)]
mod testing;

use app::App;
use config::Config;

#[derive(Parser)]
#[command(name = "quick-brew", version, about = "Headline ingestion and summary pipeline")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and seed the configured categories
    Init,
    /// Fetch new articles for every configured category
    Ingest,
    /// Summarize the newest unsummarized articles
    Summarize,
    /// Top up and rebuild every category's feed cache
    Keeper,
    /// Print one page of a category's feed
    Feed {
        slug: String,
        #[arg(long)]
        cursor: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print a single summarized story
    Story { id: i64 },
    /// Print store and per-category counters
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let app = App::new(config).await.context("opening store")?;

    let success = match cli.command {
        Command::Init => {
            let seeded = app.init().await?;
            print_json(&serde_json::json!({ "seeded": seeded }))?;
            true
        }
        Command::Ingest => {
            let report = app.ingest().await.context("ingest run failed to start")?;
            print_json(&report)?;
            true
        }
        Command::Summarize => match app.summarize().await.context("summarize run failed")? {
            Some(report) => {
                print_json(&report)?;
                report.fail == 0
            }
            None => true,
        },
        Command::Keeper => {
            let report = app.keeper().await.context("keeper run failed to start")?;
            print_json(&report)?;
            report.is_complete()
        }
        Command::Feed {
            slug,
            cursor,
            limit,
        } => match app.feed(&slug, cursor, limit).await? {
            Some(page) => {
                print_json(&page)?;
                true
            }
            None => {
                eprintln!("unknown category: {}", slug);
                false
            }
        },
        Command::Story { id } => match app.story(id).await? {
            Some(story) => {
                print_json(&story)?;
                true
            }
            None => {
                eprintln!("story not found: {}", id);
                false
            }
        },
        Command::Stats => {
            print_json(&app.stats().await?)?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
