//! Audio Vault CLI
//!
//! Command-line front-end for backing up and restoring a music library.
//!
//! # Usage
//!
//! ```bash
//! # Log in (opens the loopback listener when the redirect target is local)
//! audiovault login
//!
//! # Write an encrypted snapshot of the library
//! audiovault export --out library.json
//!
//! # Replay a snapshot into the logged-in account
//! audiovault restore library.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "audiovault")]
#[command(about = "Back up and restore a music library")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a login and wait for the authorization redirect
    Login,

    /// Finish a login from a pasted redirect address
    Complete {
        /// The full address the browser was redirected to
        url: String,
    },

    /// Show whether a login is stored and when it expires
    Status,

    /// Remove stored credentials
    Logout,

    /// Write a snapshot of the library to a file
    Export {
        /// Output file (defaults to a name derived from the account and time)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write the payload unencrypted
        #[arg(long)]
        plain: bool,

        /// Read the passphrase from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,
    },

    /// Replay a snapshot into the logged-in account
    Restore {
        /// Export file, encrypted or plain
        file: PathBuf,

        /// Always create playlists, even when a matching one exists
        #[arg(long)]
        no_reuse: bool,

        /// Read the passphrase from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;
    debug!("Loaded configuration from {:?}", config.config_path);

    let session = commands::Session::open(config);

    match cli.command {
        Commands::Login => session.login().await,
        Commands::Complete { url } => session.complete(&url).await,
        Commands::Status => session.status().await,
        Commands::Logout => session.logout().await,
        Commands::Export {
            out,
            plain,
            passphrase_env,
        } => session.export(out, plain, passphrase_env.as_deref()).await,
        Commands::Restore {
            file,
            no_reuse,
            passphrase_env,
        } => session.restore(&file, !no_reuse, passphrase_env.as_deref()).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
