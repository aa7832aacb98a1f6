//! Sweeper Entry Point
//!
//! Connects to the IAM database, applies migrations and garbage-collects
//! revoked or expired refresh tokens and used or expired confirmation
//! rows. Runs once, or every `SWEEP_INTERVAL_SECS` seconds when set.
//! Uses `anyhow` for startup errors; engine errors are `iam::IamError`.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use iam::application::SweepUseCase;
use iam::{IamConfig, IamContext, PgIamStore};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sweeper=info,iam=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    tracing::info!("Migrations completed");

    let interval = env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .map(|raw| raw.parse::<u64>())
        .transpose()
        .context("SWEEP_INTERVAL_SECS must be a whole number of seconds")?
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    // Sweeping signs nothing, so the default config is enough
    let ctx = IamContext::new(
        Arc::new(PgIamStore::new(pool.clone())),
        Arc::new(IamConfig::default()),
    );
    let sweep = SweepUseCase::new(ctx);

    let Some(period) = interval else {
        sweep.execute().await?;
        pool.close().await;
        return Ok(());
    };

    tracing::info!(interval_secs = period.as_secs(), "Sweeping periodically");
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed round is logged by the engine; try again next tick
                let _ = sweep.execute().await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    pool.close().await;
    Ok(())
}
