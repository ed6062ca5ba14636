use todoboard::config::{self, AppConfig};
use todoboard::http::routes::todos::AppState;
use todoboard::http::routing;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let wiring = config::wire(&config, false).await?;
    let router = routing::app(AppState { service: wiring.service }, wiring.store);

    let addr = config.bind_addr;
    tracing::info!(%addr, backend = %config.describe_backend(), "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::ctrl_c;
    let _ = ctrl_c().await;
    tracing::info!("shutdown");
}
