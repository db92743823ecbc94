//! `bioface`: login-limited web gateway with a face-detection relay.
//!
//! # Usage
//!
//! ```text
//! bioface serve                        # listen on the configured address
//! bioface serve --port 8080            # override the port
//! bioface -c bioface.toml serve        # explicit config file
//! bioface status                       # weekly login usage per user
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bioface::auth::{JsonFileStore, UserStore, Users};
use bioface::config::Config;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bioface",
    version,
    about = "Login-limited web gateway with a face-detection relay"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Override bind host.
        #[arg(long)]
        host: Option<String>,

        /// Override bind port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show this week's logins for every user in the store.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            bioface::gateway::run_gateway(config).await
        }
        Commands::Status => cmd_status(&config),
    }
}

/// `RUST_LOG` wins; otherwise info for this crate.
fn setup_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bioface=info,tower_http=warn"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn cmd_status(config: &Config) -> Result<()> {
    if !config.users_file.exists() {
        println!(
            "No user store at {} (created on first `bioface serve`)",
            config.users_file.display()
        );
        return Ok(());
    }

    let store = JsonFileStore::open(&config.users_file, &Users::new())?;
    let users = store.load()?;
    let policy = config.login_policy();
    let now = chrono::Local::now().naive_local();

    println!("User store:   {}", store.path().display());
    println!("Week starts:  {}", policy.week_start(now).format("%Y-%m-%d %H:%M:%S"));
    println!("Weekly limit: {}", policy.weekly_limit());
    println!();
    println!("{:<24} {:>10} {:>10}", "USER", "THIS WEEK", "REMAINING");
    for (username, record) in &users {
        let used = policy.logins_this_week(record, now);
        println!(
            "{:<24} {:>10} {:>10}",
            username,
            used,
            policy.remaining_after(used)
        );
    }
    Ok(())
}
