use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_twitter_client::TwitterApi;
use tower::ServiceBuilder;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod recipients;
pub mod service;
pub mod session;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

use service::AppState;

pub fn create_router<T: TwitterApi>(state: Arc<AppState<T>>) -> Result<Router> {
    let mut send_route = Router::new().route("/", post(handlers::send_dm::<T>));

    if let Some(limit) = state.config.send_rate_limit {
        let send_governor = GovernorConfigBuilder::default()
            .per_second(limit.period_secs)
            .burst_size(limit.burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .context("Invalid DM send rate limit")?;
        send_route = send_route.layer(GovernorLayer::new(Arc::new(send_governor)));
    }

    let page_routes = Router::new()
        .route("/", get(handlers::home::<T>))
        .route("/logout", get(handlers::logout::<T>))
        .route("/health", get(handlers::health));

    Ok(send_route
        .merge(page_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state))
}

pub fn init_dm_service() -> Result<Router> {
    debug!("Initializing DM service");

    let state = Arc::new(AppState::from_env().context("Failed to create DM service state")?);

    create_router(state)
}

pub use config::{DmServiceConfig, SendRateLimit};
pub use dispatch::{DeliveryFailure, DispatchOutcome};
pub use error::DmError;
pub use types::{HomeResponse, SendDmRequest, SendDmResponse, SendStatus};
