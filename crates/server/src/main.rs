use std::{net::SocketAddr, sync::Arc};

use server::{
    auth::AuthConfig,
    build_router,
    config::{load_settings, prepare_database_url},
    AppState,
};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    if settings.jwt_secret == server::config::Settings::default().jwt_secret {
        warn!("using the built-in development JWT secret; set JWT_SECRET outside development");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState::new(
        storage,
        AuthConfig {
            secret: settings.jwt_secret,
            ttl_seconds: settings.token_ttl_seconds,
        },
    );
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
