use std::path::PathBuf;

use anyhow::Result;
use chatsync_cli::cli::{resolve_config, run_watch, WatchOptions};
use chatsync_core::tracing_setup::init_tracing_with_service;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "Watch a recent-conversations list stay in sync")]
struct Cli {
    /// Path to JSON config file (debounceMs, fetchTimeoutMs, retry)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed an in-memory store from a fixture and print the list as it changes
    Watch {
        /// Fixture JSON with users and messages
        #[arg(long, short = 'f')]
        fixture: PathBuf,

        /// User to sign in as
        #[arg(long, short = 'u')]
        user: String,

        /// How long to keep watching
        #[arg(long, default_value_t = 3_000)]
        for_ms: u64,

        /// Log out this long after starting
        #[arg(long)]
        logout_after_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_service("chatsync-cli");

    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch {
            fixture,
            user,
            for_ms,
            logout_after_ms,
        } => {
            run_watch(
                config,
                WatchOptions {
                    fixture,
                    user,
                    for_ms,
                    logout_after_ms,
                },
            )
            .await
        }
    }
}
