use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use user_service::passwords::Argon2Passwords;
use user_service::store::{InMemoryUserStore, PgUserStore, UserStore};
use user_service::{build_router, load_service_config, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;

    let users: Arc<dyn UserStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(
            PgUserStore::connect(url)
                .await
                .context("Failed to connect to Postgres")?,
        ),
        None => {
            warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let addr = SocketAddr::from((config.host, config.port));
    let state = AppState::new(config, users, Arc::new(Argon2Passwords::new()))?;
    let app = build_router(state);

    info!(%addr, "starting user-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
