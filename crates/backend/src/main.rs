pub mod handlers;
pub mod routes;
pub mod shared;
pub mod system;
pub mod usecases;

use std::net::SocketAddr;
use std::sync::Arc;

use shared::google_sheets::{GoogleSheetsClient, SheetClient};
use system::scheduler::LoadScheduler;
use system::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use axum::http::{header, Method};
    use axum::middleware;
    use tokio::net::TcpListener;
    use tower_http::cors::{Any, CorsLayer};

    system::tracing::initialize()?;

    // Конфигурация: config.toml + переменные окружения, проверка до старта
    let config = shared::config::load_config()?;
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let key = config.service_account_key()?;
    tracing::info!("Google service account: {}", key.client_email);
    let sheet: Arc<dyn SheetClient> = Arc::new(GoogleSheetsClient::new(&config.sheets, key)?);

    let state = Arc::new(AppState::new(config, sheet)?);

    if let Some(expr) = &state.config.schedule.cron {
        let scheduler = LoadScheduler::new(
            expr,
            state.config.timezone.local_tz()?,
            state.load_tenders.clone(),
        )?;
        tokio::spawn(scheduler.run_loop());
    } else {
        tracing::info!("No load schedule configured, loads run on demand only");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::configure_routes(state.clone())
        .layer(middleware::from_fn(system::middleware::request_logger))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;

    tracing::info!("Attempting to bind server to http://{}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            tracing::info!("Server successfully bound to {}", addr);
            listener
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!("Error: Port {} is already in use", addr.port());
            } else {
                tracing::error!("Failed to bind to {}. Error: {}", addr, e);
            }
            return Err(e.into());
        }
    };

    axum::serve(listener, app).await?;

    Ok(())
}
