//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod ingest;
mod init;
mod issues;
mod jobs;
mod serve;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::repository::DbContext;

#[derive(Parser)]
#[command(name = "timebrowser")]
#[command(about = "Newspaper archive ingestion and browse API")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides TIMEBROWSER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Start the API server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3030)
        #[arg(default_value = "127.0.0.1:3030")]
        bind: String,
    },

    /// Ingest a PDF as one newspaper issue
    Ingest {
        /// PDF file to ingest
        file: PathBuf,
        /// Newspaper name (created if unknown)
        #[arg(short, long)]
        newspaper: String,
        /// Publication date (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date)]
        date: NaiveDate,
        /// Idempotency key (default: derived from newspaper, date and file name)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List ingest jobs
    Jobs {
        /// Only jobs in this status (pending, processing, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// List issues, newest first
    Issues {
        /// Only issues of this newspaper ID
        #[arg(short, long)]
        newspaper: Option<String>,
        /// Earliest publication date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Latest publication date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Maximum number of issues to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD ({})", e))
}

/// Open the configured database.
fn open_db(settings: &Settings) -> anyhow::Result<DbContext> {
    tracing::debug!("Opening database {}", settings.display_database_url());
    Ok(DbContext::from_url(&settings.database_url())?)
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
        Commands::Ingest {
            file,
            newspaper,
            date,
            key,
        } => ingest::cmd_ingest(&settings, &file, &newspaper, date, key).await,
        Commands::Jobs { status, limit } => {
            jobs::cmd_jobs(&settings, status.as_deref(), limit).await
        }
        Commands::Issues {
            newspaper,
            from,
            to,
            limit,
        } => issues::cmd_issues(&settings, newspaper.as_deref(), from, to, limit).await,
    }
}
