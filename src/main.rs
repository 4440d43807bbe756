//! Server: reads settings from the environment (and `.env`), connects the store, serves the dashboard.

use hospital_admin::{app, connect_store, AppState, Catalog, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hospital_admin=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let store = connect_store(&settings).await?;
    let state = AppState::new(store, Catalog::hospital()?)
        .with_session_limits(settings.session_capacity, settings.session_idle);

    let listener = TcpListener::bind(settings.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state, settings.body_limit)).await?;
    Ok(())
}
