use be_twitter_client::{AccessCredential, RequestToken, TwitterApi, TwitterError};
use tracing::{info, warn};

use crate::session::SessionRecord;
use crate::types::HomeQuery;

/// Where a session is in the OAuth handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    AwaitingCallback(RequestToken),
    Authenticated(AccessCredential),
}

pub fn auth_state(record: &SessionRecord) -> AuthState {
    match (credential(record), &record.request_token) {
        (Some(credential), _) => AuthState::Authenticated(credential),
        (None, Some(pending)) => AuthState::AwaitingCallback(pending.clone()),
        (None, None) => AuthState::Anonymous,
    }
}

/// The access credential, only when both token halves are present and non-empty.
pub fn credential(record: &SessionRecord) -> Option<AccessCredential> {
    let token = record.access_token.as_deref().filter(|t| !t.is_empty())?;
    let secret = record
        .access_token_secret
        .as_deref()
        .filter(|s| !s.is_empty())?;
    Some(AccessCredential {
        token: token.to_string(),
        token_secret: secret.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Authorization was denied")]
    Denied,
    #[error("No pending authorization for this session")]
    NoPendingRequest,
    #[error("Callback token does not match the pending request")]
    TokenMismatch,
    #[error("Callback is missing oauth_verifier")]
    MissingVerifier,
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] TwitterError),
}

impl CallbackError {
    /// Text shown to the user on the anonymous home page.
    pub fn user_message(&self) -> &'static str {
        match self {
            CallbackError::Denied => "Twitter authorization was cancelled.",
            _ => "Twitter authorization failed, please try again.",
        }
    }
}

/// Issues a request token, remembers it in the session and returns the URL
/// the user must visit.
pub async fn begin_authorization<T: TwitterApi>(
    api: &T,
    record: &mut SessionRecord,
    callback_url: &str,
) -> Result<String, TwitterError> {
    let request_token = api.request_token(callback_url).await?;
    let url = api.authorize_url(&request_token);
    record.request_token = Some(request_token);
    Ok(url)
}

/// Completes the handshake after Twitter redirects back.
///
/// The pending request token is consumed whether or not the exchange
/// succeeds, so a failure returns the session to the anonymous state.
pub async fn complete_authorization<T: TwitterApi>(
    api: &T,
    record: &mut SessionRecord,
    query: &HomeQuery,
) -> Result<(), CallbackError> {
    let pending = record.request_token.take();

    if query.denied.is_some() {
        return Err(CallbackError::Denied);
    }
    let pending = pending.ok_or(CallbackError::NoPendingRequest)?;
    let verifier = query
        .oauth_verifier
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(CallbackError::MissingVerifier)?;
    if let Some(token) = &query.oauth_token {
        if *token != pending.token {
            return Err(CallbackError::TokenMismatch);
        }
    }

    let grant = api.access_token(&pending, verifier).await?;
    record.set_credential(grant.credential);
    record.screen_name = grant.screen_name;

    info!(screen_name = ?record.screen_name, "Twitter authorization completed");
    Ok(())
}

/// Display name of the signed-in user, fetched at most once per session.
pub async fn cached_screen_name<T: TwitterApi>(
    api: &T,
    record: &mut SessionRecord,
) -> Option<String> {
    if record.screen_name.is_some() {
        return record.screen_name.clone();
    }
    let credential = credential(record)?;
    match api.screen_name(&credential).await {
        Ok(name) => {
            record.screen_name = Some(name.clone());
            Some(name)
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch screen name");
            None
        }
    }
}
