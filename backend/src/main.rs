use std::sync::Arc;

use anyhow::Context;
use mockable::DefaultClock;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use aportes_backend::app;
use aportes_backend::auth::TokenKeys;
use aportes_backend::config::AppConfig;
use aportes_backend::db::PgStore;
use aportes_backend::logging::{init_logging, LoggingConfig};
use aportes_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let state = AppState::new(
        PgStore::new(pool),
        Arc::new(DefaultClock),
        TokenKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl_minutes),
        config.page_size,
    );
    let app = app::create_app(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Aportes backend running at http://{}/", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
