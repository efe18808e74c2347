use std::time::Duration;

use be_twitter_client::{
    AccessCredential, AccessGrant, RequestToken, TwitterApi, TwitterError, TwitterList,
};
use moka::sync::Cache;
use tracing::trace;

const MAX_CACHED_USERS: u64 = 10_000;
const MAX_CACHED_LISTS: u64 = 50_000;

/// Wraps a [`TwitterApi`] and memoizes the read-only list lookups per user.
///
/// Sends and OAuth calls always go through to the inner client. A zero TTL
/// turns caching off.
pub struct CachingTwitter<T> {
    inner: T,
    lists: Option<Cache<String, Vec<TwitterList>>>,
    members: Option<Cache<(String, String), Vec<String>>>,
}

impl<T: TwitterApi> CachingTwitter<T> {
    pub fn new(inner: T, ttl: Duration) -> Self {
        let enabled = !ttl.is_zero();
        Self {
            inner,
            lists: enabled.then(|| {
                Cache::builder()
                    .max_capacity(MAX_CACHED_USERS)
                    .time_to_live(ttl)
                    .build()
            }),
            members: enabled.then(|| {
                Cache::builder()
                    .max_capacity(MAX_CACHED_LISTS)
                    .time_to_live(ttl)
                    .build()
            }),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: TwitterApi> TwitterApi for CachingTwitter<T> {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, TwitterError> {
        self.inner.request_token(callback_url).await
    }

    fn authorize_url(&self, request_token: &RequestToken) -> String {
        self.inner.authorize_url(request_token)
    }

    async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessGrant, TwitterError> {
        self.inner.access_token(request_token, verifier).await
    }

    async fn screen_name(&self, credential: &AccessCredential) -> Result<String, TwitterError> {
        self.inner.screen_name(credential).await
    }

    async fn owned_lists(
        &self,
        credential: &AccessCredential,
    ) -> Result<Vec<TwitterList>, TwitterError> {
        let Some(cache) = &self.lists else {
            return self.inner.owned_lists(credential).await;
        };
        if let Some(lists) = cache.get(&credential.token) {
            trace!("Owned lists served from cache");
            return Ok(lists);
        }
        let lists = self.inner.owned_lists(credential).await?;
        cache.insert(credential.token.clone(), lists.clone());
        Ok(lists)
    }

    async fn list_members(
        &self,
        credential: &AccessCredential,
        list_id: &str,
    ) -> Result<Vec<String>, TwitterError> {
        let Some(cache) = &self.members else {
            return self.inner.list_members(credential, list_id).await;
        };
        let key = (credential.token.clone(), list_id.to_string());
        if let Some(members) = cache.get(&key) {
            trace!(list_id, "List members served from cache");
            return Ok(members);
        }
        let members = self.inner.list_members(credential, list_id).await?;
        cache.insert(key, members.clone());
        Ok(members)
    }

    async fn send_direct_message(
        &self,
        credential: &AccessCredential,
        screen_name: &str,
        text: &str,
    ) -> Result<(), TwitterError> {
        self.inner
            .send_direct_message(credential, screen_name, text)
            .await
    }
}
