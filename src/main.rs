use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usvg::fontdb;

use skyvision::config::Args;
use skyvision::server::{AppState, router};
use skyvision::source::FlightSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyvision=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut fontdb = fontdb::Database::new();
    fontdb.load_system_fonts();
    let mut usvg_options = usvg::Options::default();
    usvg_options.fontdb = Arc::new(fontdb);

    let state = AppState {
        source: FlightSource::from_location(&args.flights),
        usvg_options: Arc::new(usvg_options),
    };
    info!("serving flights from {}", args.flights);

    let app = router(state);

    let addr = args.socket_addr();
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
