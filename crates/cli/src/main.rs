//! Bookstall CLI - Database migrations and seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session store)
//! bookstall-cli migrate
//!
//! # Seed reference data and demo accounts
//! bookstall-cli seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed payment methods, demo books and accounts

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bookstall-cli")]
#[command(author, version, about = "Bookstall CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data and demo accounts
    Seed {
        /// Also insert demo books and demo accounts
        #[arg(long, default_value_t = true)]
        demo_data: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { demo_data } => commands::seed::run(demo_data).await?,
    }
    Ok(())
}
