use std::error::Error;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use logsift::server::{AppState, router};
use logsift::settings::{DEFAULT_CONFIG_FILE, Settings};
use logsift::store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let settings = Settings::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = match &settings.store.path {
        Some(path) => {
            info!(%path, "opening store");
            Store::open(path)?
        }
        None => {
            info!("no store path configured, using an in-memory store");
            Store::open_in_memory()?
        }
    };

    let listener = TcpListener::bind(&settings.server.bind).await?;
    info!(bind = %settings.server.bind, dialect = ?settings.compiler.dialect, "logsift listening");
    axum::serve(listener, router(AppState::new(store, settings))).await?;
    Ok(())
}
