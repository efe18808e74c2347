use std::future::Future;

use crate::error::TwitterError;
use crate::types::{AccessCredential, AccessGrant, RequestToken, TwitterList};

/// The subset of the Twitter API the DM service relies on.
///
/// Every call returns a `Result` so expected failures (unknown recipient,
/// recipient not following) are plain values for the caller to classify.
pub trait TwitterApi: Send + Sync + 'static {
    /// Starts the OAuth handshake; Twitter will redirect back to `callback_url`.
    fn request_token(
        &self,
        callback_url: &str,
    ) -> impl Future<Output = Result<RequestToken, TwitterError>> + Send;

    /// URL the user visits to approve the request token.
    fn authorize_url(&self, request_token: &RequestToken) -> String;

    fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> impl Future<Output = Result<AccessGrant, TwitterError>> + Send;

    /// Screen name of the user owning `credential`.
    fn screen_name(
        &self,
        credential: &AccessCredential,
    ) -> impl Future<Output = Result<String, TwitterError>> + Send;

    /// Lists owned by or subscribed to by the authenticated user.
    fn owned_lists(
        &self,
        credential: &AccessCredential,
    ) -> impl Future<Output = Result<Vec<TwitterList>, TwitterError>> + Send;

    /// Screen names of every member of `list_id`.
    fn list_members(
        &self,
        credential: &AccessCredential,
        list_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, TwitterError>> + Send;

    fn send_direct_message(
        &self,
        credential: &AccessCredential,
        screen_name: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), TwitterError>> + Send;
}
