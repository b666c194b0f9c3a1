use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use guidepost::config::{Cli, Command, Config};
use guidepost::state::AppState;
use guidepost::{db, legacy, routes};

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
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Guide and upload directories must exist before anything is served
    std::fs::create_dir_all(config.guides_path())?;
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());

    if let Some(Command::Import { users, reactions }) = &cli.command {
        legacy::run(
            &state.credentials,
            &state.reactions,
            users.as_deref(),
            reactions.as_deref(),
        )?;
        return Ok(());
    }

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
