use be_twitter_client::{TwitterApi, TwitterClient, TwitterConfig};

use crate::cache::CachingTwitter;
use crate::config::DmServiceConfig;
use crate::error::DmError;
use crate::session::SessionStore;

pub struct AppState<T> {
    pub api: CachingTwitter<T>,
    pub sessions: SessionStore,
    pub config: DmServiceConfig,
}

impl<T: TwitterApi> AppState<T> {
    pub fn new(api: T, config: DmServiceConfig) -> Self {
        Self {
            api: CachingTwitter::new(api, config.cache_ttl),
            sessions: SessionStore::new(
                config.session_ttl,
                config.pending_auth_ttl,
                config.max_sessions,
            ),
            config,
        }
    }
}

impl AppState<TwitterClient> {
    pub fn from_env() -> Result<Self, DmError> {
        let config = DmServiceConfig::from_env()?;
        let twitter_config = TwitterConfig::from_env()
            .map_err(|e| DmError::Config(format!("Twitter client config: {e}")))?;
        let client = TwitterClient::new(twitter_config)
            .map_err(|e| DmError::Config(format!("Failed to build Twitter client: {e}")))?;
        Ok(Self::new(client, config))
    }
}
