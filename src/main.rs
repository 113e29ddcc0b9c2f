use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use babyvision::auth::session;
use babyvision::config::{Cli, Config};
use babyvision::state::AppState;
use babyvision::{db, email, routes};

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

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    match session::purge_expired(&pool) {
        Ok(0) => {}
        Ok(n) => tracing::info!(removed = n, "Purged expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Could not purge expired sessions"),
    }

    // Install the branded auth email templates
    email::bootstrap::run(&pool, &config.email);

    if config.email.api_key.is_none() {
        tracing::warn!("RESEND_API_KEY not set; email endpoints will fail");
    }
    if config.revenuecat.api_key.is_none() {
        tracing::warn!("REVENUECAT_SECRET_API_KEY not set; voucher redemption will fail");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = routes::app(AppState::new(pool, config));

    // Start server
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
