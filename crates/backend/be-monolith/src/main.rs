use std::net::SocketAddr;

use dotenv::dotenv;
use sentry::ClientInitGuard;
use tokio::sync::watch;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();

    let _sentry = init_sentry();
    init_tracing()?;

    let config = be_monolith::ServerConfig {
        http_addr: http_addr(std::env::var("HTTP_ADDR").ok())?,
        shutdown: shutdown_on_ctrl_c(),
    };

    be_monolith::run_server(config).await
}

/// Error reporting is only wired up for release builds with `SENTRY_DSN` set.
fn init_sentry() -> Option<ClientInitGuard> {
    if cfg!(debug_assertions) {
        return None;
    }
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty())?;
    let debug = std::env::var("SENTRY_DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.0,
            send_default_pii: false,
            debug,
            ..Default::default()
        },
    )))
}

fn log_filter(app_level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("be_dm_service", app_level)
        .with_target("be_twitter_client", app_level)
        .with_target("be_monolith", app_level)
        .with_target("tower_http", app_level)
        .with_target("hyper", LevelFilter::OFF)
}

fn init_tracing() -> Result<(), BoxError> {
    let app_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .with(log_filter(app_level))
        .try_init()?;
    Ok(())
}

fn http_addr(raw: Option<String>) -> Result<SocketAddr, BoxError> {
    let raw = raw.unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
    raw.parse()
        .map_err(|e| format!("HTTP_ADDR '{raw}' is not a socket address: {e}").into())
}

fn shutdown_on_ctrl_c() -> watch::Receiver<()> {
    let (tx, rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            return;
        }
        tracing::info!("Received CTRL+C, stopping the DM service");
        let _ = tx.send(());
    });
    rx
}
