use std::net::SocketAddr;

use be_dm_service::init_dm_service;

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dm_router = match init_dm_service() {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("Failed to initialize DM service: {:#}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let result = axum::serve(
        http_listener,
        dm_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await;

    if let Err(e) = result {
        tracing::error!("HTTP server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
