use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use aidlink_api::AppStateInner;
use aidlink_store::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aidlink=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let data_dir = std::env::var("AIDLINK_DATA_DIR").unwrap_or_else(|_| "data".into());
    let host = std::env::var("AIDLINK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AIDLINK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Shared state
    let state = Arc::new(AppStateInner {
        store: FileStore::new(&data_dir),
    });

    let app = aidlink_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("AidLink store listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
