use refmatch::{create_router, AppState, Config, Result};

use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the application
    refmatch::init()?;

    // Load configuration and fail fast on missing paths
    let config = Config::from_env()?;

    // Load the encoder and build the reference index; any failure here
    // prevents the server from starting
    let state = AppState::load(config)?;

    // Build our application with routes
    let app = create_router(&state.config).with_state(state.clone());

    // Set up the server
    let addr = state.config.bind_addr;
    let listener = TcpListener::bind(addr).await?;
    log::info!("server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
