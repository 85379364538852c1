//! Boho Baha CLI - Database management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront database migrations
//! boho-cli migrate
//!
//! # List migrations and whether they are applied
//! boho-cli migrate --status
//!
//! # Use an explicit database instead of STOREFRONT_DATABASE_URL
//! boho-cli migrate --database-url postgres://localhost/boho_storefront
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "boho-cli")]
#[command(author, version, about = "Boho Baha storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate {
        /// Only report which migrations are applied
        #[arg(long)]
        status: bool,

        /// Database URL (defaults to `STOREFRONT_DATABASE_URL`)
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::migrate::MigrationError> {
    match cli.command {
        Commands::Migrate {
            status: true,
            database_url,
        } => commands::migrate::status(database_url).await,
        Commands::Migrate {
            status: false,
            database_url,
        } => commands::migrate::run(database_url).await,
    }
}
