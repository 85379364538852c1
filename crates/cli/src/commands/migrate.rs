//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending storefront migrations
//! boho-cli migrate
//!
//! # Show which migrations have been applied
//! boho-cli migrate --status
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/` and are
//! embedded into the binary at compile time.

use std::collections::HashSet;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::Migrator;

static MIGRATOR: Migrator = sqlx::migrate!("../storefront/migrations");

const DATABASE_URL_VARS: [&str; 2] = ["STOREFRONT_DATABASE_URL", "DATABASE_URL"];

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Resolve the database URL, preferring an explicit argument over the environment.
fn database_url(explicit: Option<String>) -> Result<SecretString, MigrationError> {
    explicit
        .or_else(|| {
            DATABASE_URL_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
        })
        .filter(|url| !url.trim().is_empty())
        .map(SecretString::from)
        .ok_or(MigrationError::MissingDatabaseUrl)
}

async fn connect(explicit_url: Option<String>) -> Result<PgPool, MigrationError> {
    let _ = dotenvy::dotenv();
    let url = database_url(explicit_url)?;

    tracing::info!("Connecting to storefront database...");
    Ok(PgPool::connect(url.expose_secret()).await?)
}

/// Apply all pending storefront migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn run(explicit_url: Option<String>) -> Result<(), MigrationError> {
    let pool = connect(explicit_url).await?;

    tracing::info!(available = MIGRATOR.iter().count(), "Running storefront migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}

/// Log each known migration and whether it has been applied.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing or the database is
/// unreachable.
pub async fn status(explicit_url: Option<String>) -> Result<(), MigrationError> {
    let pool = connect(explicit_url).await?;

    // The bookkeeping table doesn't exist until the first run.
    let applied: HashSet<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(&pool)
            .await
            .map(|versions| versions.into_iter().collect())
            .unwrap_or_default();

    for migration in MIGRATOR.iter() {
        let state = if applied.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        tracing::info!(
            version = migration.version,
            description = %migration.description,
            state,
            "Migration"
        );
    }
    Ok(())
}
