mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use dotenv::dotenv;
use taxchat::providers::factory;
use taxchat::router::ModelRouter;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env when there is one
    dotenv().ok();

    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let general = factory::get_provider(settings.general.into_config())?;
    let document = factory::get_provider(settings.document.into_config())?;
    info!(
        general = general.model(),
        document = document.model(),
        "configured models"
    );

    // Create app state
    let state = state::AppState::new(ModelRouter::new(general, document));

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    // Run server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
