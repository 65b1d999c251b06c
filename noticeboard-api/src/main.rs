//! # Noticeboard API Server
//!
//! Session-backed bulletin-board administration backend: post and user
//! CRUD with a two-phase confirm workflow, role-scoped listings, CSV
//! import/export, and profile-image uploads.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p noticeboard-api
//! ```

use noticeboard_api::{
    app::{build_router, AppState},
    config::Config,
};
use noticeboard_shared::db::migrations::run_migrations;
use noticeboard_shared::db::pool::{create_pool, DatabaseConfig};
use noticeboard_shared::redis::{RedisClient, RedisConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noticeboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Noticeboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;

    let redis = RedisClient::new(RedisConfig::from_env()?).await?;

    let state = AppState::new(pool, redis, config.clone());
    state.images.ensure_dirs().await?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
