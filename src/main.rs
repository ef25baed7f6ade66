use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use morphx::config::{Cli, Config};
use morphx::state::AppState;
use morphx::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.uses_dev_secret() {
        tracing::warn!("SECRET_KEY is not set; using the development default");
    }
    if let Some(url) = &config.remote.url {
        tracing::info!("Remote storage configured at {} (not used by this server)", url);
    }

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());
    std::fs::create_dir_all(state.media.dir())?;
    tracing::info!("Uploads directory: {}", state.media.dir().display());

    state.auth().ensure_admin()?;

    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
