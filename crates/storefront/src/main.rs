//! Boho Baha storefront server.
//!
//! Serves the checkout endpoints, receives payment webhooks and runs the
//! email outbox worker in the same process.
//!
//! # Architecture
//!
//! - Axum web framework, Askama templates for the result pages
//! - Stripe-compatible REST API for checkout sessions and payment intents
//! - `PostgreSQL` for orders and the email outbox
//! - SMTP (lettre) for email delivery from the outbox

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boho_storefront::config::{ConfigError, StorefrontConfig};
use boho_storefront::db::{self, PgOrderRepository, PgOutboxRepository};
use boho_storefront::payments::{PaymentError, StripeClient};
use boho_storefront::routes;
use boho_storefront::services::{EmailError, OutboxWorker, SmtpMailer};
use boho_storefront::state::AppState;

/// Reasons the server fails to start.
#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to create payment client: {0}")]
    Payments(#[from] PaymentError),
    #[error("failed to create mailer: {0}")]
    Mailer(#[from] EmailError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = StorefrontConfig::from_env()?;

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "boho_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Storefront exited with error");
        return Err(e);
    }
    Ok(())
}

async fn run(config: StorefrontConfig) -> Result<(), StartupError> {
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p boho-cli -- migrate

    let orders = Arc::new(PgOrderRepository::new(pool.clone()));
    let outbox = Arc::new(PgOutboxRepository::new(pool));
    let payments = Arc::new(StripeClient::new(&config.stripe)?);
    let mailer = Arc::new(SmtpMailer::new(&config.email)?);
    let outbox_notify = Arc::new(Notify::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = OutboxWorker::new(
        outbox.clone(),
        mailer,
        outbox_notify.clone(),
        config.outbox.clone(),
    )
    .spawn(shutdown_rx);

    let addr = config.socket_addr();
    let state = AppState::new(config, payments, orders, outbox, outbox_notify);

    let app = routes::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("storefront listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the worker whether or not the server exited cleanly
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Outbox worker panicked");
    }

    served?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
