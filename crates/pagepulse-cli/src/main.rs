//! pagepulse - command-line dashboard for pagepulse web analytics.
//!
//! Logs in against a pagepulse backend, manages tracked sites and prints
//! per-site analytics. Expired access tokens are refreshed transparently.

mod commands;
mod format;
mod report;

use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pagepulse_core::ApiError;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "pagepulse.log";

#[derive(Parser)]
#[command(name = "pagepulse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Web analytics dashboard in your terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL (overrides PAGEPULSE_API_BASE and the config file)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Keep tokens in memory only; nothing is written to disk or keychain
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Also write logs to a daily rotating file in the cache directory
    #[arg(long, global = true)]
    pub log_file: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        /// Username (prompted for when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create an account and log in
    Signup {
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// List your sites
    Sites {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a site and print its embed snippet
    AddSite {
        /// Domain to track, e.g. example.com
        domain: String,
    },

    /// Print the tracker embed snippet for a site
    Snippet { site_id: String },

    /// Show the analytics dashboard for a site
    Dashboard {
        /// Site ID (defaults to the last one viewed)
        site_id: Option<String>,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Only the last N days, ending today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<i64>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the configured backend and session state
    Status,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard must be
/// kept alive for the file writer to flush.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Turn API failures into something a user can act on
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Unauthorized { .. }) | Some(ApiError::NoRefreshToken) => {
            "Not logged in or session expired. Run `pagepulse login`.".to_string()
        }
        Some(ApiError::Network(e)) => format!("Could not reach the server: {e}"),
        _ => format!("{err:#}"),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = if cli.log_file {
        pagepulse_core::Config::default().cache_dir().ok()
    } else {
        None
    };
    let _guard = init_tracing(log_dir);
    info!("pagepulse starting");

    if let Err(e) = commands::run(cli).await {
        eprintln!("Error: {}", describe_error(&e));
        std::process::exit(1);
    }
}
