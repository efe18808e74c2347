use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header::{HOST, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use be_twitter_client::TwitterApi;
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::auth::{self, AuthState};
use crate::config::DmServiceConfig;
use crate::dispatch::DispatchOutcome;
use crate::error::{DmError, FieldErrors};
use crate::pipeline;
use crate::service::AppState;
use crate::session::{Session, expired_session_cookie};
use crate::types::{HomeQuery, HomeResponse, SendDmRequest, SendDmResponse, SendStatus};

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

const LISTS_UNAVAILABLE: &str = "Could not load your Twitter lists, please try again later.";

/// Home state for the form, and the OAuth callback target.
pub async fn home<T: TwitterApi>(
    State(state): State<Arc<AppState<T>>>,
    mut session: Session,
    headers: HeaderMap,
    Query(query): Query<HomeQuery>,
) -> Result<Response, DmError> {
    let secure = state.config.cookie_secure;
    let mut auth_error = None;

    if query.is_callback() {
        match auth::complete_authorization(&state.api, &mut session.record, &query).await {
            Ok(()) => {
                state.sessions.rotate(&mut session);
                let cookie = state.sessions.commit(&session, secure);
                return Ok(with_cookie(Redirect::to("/"), cookie));
            }
            Err(e) => {
                warn!(error = %e, "Twitter authorization failed");
                auth_error = Some(e.user_message().to_string());
            }
        }
    }

    let body = match auth::auth_state(&session.record) {
        AuthState::Authenticated(credential) => {
            let me_username = auth::cached_screen_name(&state.api, &mut session.record).await;
            let (lists, lists_error) = match state.api.owned_lists(&credential).await {
                Ok(lists) => (lists, None),
                Err(e) => {
                    warn!(error = %e, "Failed to fetch owned lists");
                    (Vec::new(), Some(LISTS_UNAVAILABLE.to_string()))
                }
            };
            HomeResponse {
                authenticated: true,
                me_username,
                auth_url: None,
                auth_error: None,
                lists,
                lists_error,
            }
        }
        AuthState::AwaitingCallback(pending) => {
            anonymous_home(state.api.authorize_url(&pending), auth_error)
        }
        AuthState::Anonymous => {
            let callback_url = callback_url(&state.config, &headers)?;
            let auth_url =
                auth::begin_authorization(&state.api, &mut session.record, &callback_url).await?;
            anonymous_home(auth_url, auth_error)
        }
    };

    let cookie = state.sessions.commit(&session, secure);
    Ok(with_cookie(Json(body), cookie))
}

fn anonymous_home(auth_url: String, auth_error: Option<String>) -> HomeResponse {
    HomeResponse {
        authenticated: false,
        me_username: None,
        auth_url: Some(auth_url),
        auth_error,
        lists: Vec::new(),
        lists_error: None,
    }
}

fn callback_url(config: &DmServiceConfig, headers: &HeaderMap) -> Result<String, DmError> {
    if let Some(url) = &config.callback_url {
        return Ok(url.clone());
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            DmError::Config("no Host header to derive the callback URL, set DM_CALLBACK_URL".into())
        })?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    Ok(format!("{scheme}://{host}/"))
}

// ---------------------------------------------------------------------------
// POST /
// ---------------------------------------------------------------------------

/// Sends one direct message to every resolved recipient.
pub async fn send_dm<T: TwitterApi>(
    State(state): State<Arc<AppState<T>>>,
    session: Session,
    payload: Result<Json<SendDmRequest>, JsonRejection>,
) -> Result<Json<SendDmResponse>, DmError> {
    let credential = auth::credential(&session.record);

    // The auth gate answers before the body is looked at.
    let request = match payload {
        Ok(Json(request)) => request,
        Err(_) if credential.is_none() => return Err(DmError::AuthRequired),
        Err(rejection) => {
            let mut fields = FieldErrors::new();
            fields.insert("body", rejection.body_text());
            return Err(DmError::Validation(fields));
        }
    };

    let outcome = pipeline::process_submission(&state.api, credential.as_ref(), &request).await?;
    let messages = outcome.messages();

    match outcome {
        DispatchOutcome::AllSucceeded => Ok(Json(SendDmResponse {
            status: SendStatus::Sent,
            messages,
            failures: IndexMap::new(),
        })),
        DispatchOutcome::PartialFailure(failures) => Ok(Json(SendDmResponse {
            status: SendStatus::PartialFailure,
            messages,
            failures: failures
                .into_iter()
                .map(|(recipient, failure)| (recipient, failure.reason().to_string()))
                .collect(),
        })),
        DispatchOutcome::AuthRequired => Err(DmError::AuthRequired),
        DispatchOutcome::ValidationFailed(fields) => Err(DmError::Validation(fields)),
    }
}

// ---------------------------------------------------------------------------
// GET /logout
// ---------------------------------------------------------------------------

pub async fn logout<T: TwitterApi>(
    State(state): State<Arc<AppState<T>>>,
    session: Session,
) -> Response {
    state.sessions.delete(&session.id);
    info!("Session logged out");

    let cookie = expired_session_cookie(state.config.cookie_secure);
    with_cookie(Redirect::to("/"), Some(cookie))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub async fn health() -> StatusCode {
    StatusCode::OK
}

fn with_cookie(response: impl IntoResponse, cookie: Option<String>) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::SendRateLimit;
    use crate::session::SessionRecord;
    use crate::testing::{FakeTwitter, credential};

    const SESSION_ID: &str = "test-session";

    fn test_state(api: FakeTwitter) -> Arc<AppState<FakeTwitter>> {
        Arc::new(AppState::new(api, DmServiceConfig::default()))
    }

    fn router(state: Arc<AppState<FakeTwitter>>) -> axum::Router {
        crate::create_router(state).unwrap()
    }

    fn signed_in(state: &AppState<FakeTwitter>) -> String {
        let mut record = SessionRecord::default();
        record.set_credential(credential());
        state.sessions.save(SESSION_ID, record);
        format!("dm_session={SESSION_ID}")
    }

    fn post_json(body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).header(HOST, "dm.test");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("response sets the session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(test_state(FakeTwitter::default()));

        let response = app.oneshot(get("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unauthenticated_send_is_rejected_without_calls() {
        let state = test_state(FakeTwitter::default());
        let app = router(state.clone());

        let body = json!({"users_source": "Manual", "users": "@alice", "dmtext": "hi"});
        let response = app.oneshot(post_json(body, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "You need to authenticate first!"
        );
        assert_eq!(state.api.inner().total_calls(), 0);
    }

    #[tokio::test]
    async fn unauthenticated_malformed_body_is_still_auth_error() {
        let app = router(test_state(FakeTwitter::default()));

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_manual_send() {
        let state = test_state(FakeTwitter::default());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let body = json!({"users_source": "Manual", "users": "@alice, @bob", "dmtext": "hi"});
        let response = app.oneshot(post_json(body, Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "sent");
        assert_eq!(body["messages"], json!(["Message was sent"]));
        assert_eq!(state.api.inner().sent_to(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn partial_failure_lists_each_failed_recipient() {
        let state = test_state(
            FakeTwitter::default()
                .failing_send("ghost", 34)
                .failing_send("stranger", 150),
        );
        let cookie = signed_in(&state);
        let app = router(state);

        let body = json!({
            "users_source": "Manual",
            "users": "@friend, @ghost, @stranger",
            "dmtext": "hi"
        });
        let response = app.oneshot(post_json(body, Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "partial_failure");
        assert_eq!(body["failures"]["ghost"], "does not exist");
        assert_eq!(
            body["messages"],
            json!([
                "User ghost does not exist",
                "User stranger is not following you"
            ])
        );
    }

    #[tokio::test]
    async fn invalid_submission_reports_fields() {
        let state = test_state(FakeTwitter::default());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let body = json!({"users_source": "Manual", "users": "foo@bar", "dmtext": ""});
        let response = app.oneshot(post_json(body, Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(
            body["fields"]["users"],
            "foo@bar are not valid Twitter usernames"
        );
        assert_eq!(body["fields"]["dmtext"], "This field is required.");
        assert!(state.api.inner().sent_to().is_empty());
    }

    #[tokio::test]
    async fn list_lookup_failure_is_bad_gateway() {
        let state = test_state(FakeTwitter::default());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let body = json!({"users_source": "List", "lists": ["404"], "dmtext": "hi"});
        let response = app.oneshot(post_json(body, Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.api.inner().sent_to().is_empty());
    }

    #[tokio::test]
    async fn anonymous_home_starts_authorization() {
        let state = test_state(FakeTwitter::default());
        let app = router(state.clone());

        let response = app.oneshot(get("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("dm_session="));
        let body = json_body(response).await;
        assert_eq!(body["authenticated"], false);
        assert!(
            body["auth_url"]
                .as_str()
                .unwrap()
                .contains("oauth_token=req")
        );
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn successful_callback_signs_the_user_in() {
        let state = test_state(FakeTwitter::default().with_list("1", &["x", "y"]));
        let app = router(state.clone());

        let response = app.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = session_cookie(&response);

        let response = app
            .clone()
            .oneshot(get("/?oauth_token=req&oauth_verifier=v", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/");
        let signed_in_cookie = session_cookie(&response);
        assert_ne!(signed_in_cookie, cookie);

        let stale = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(json_body(stale).await["authenticated"], false);

        let response = app
            .oneshot(get("/", Some(&signed_in_cookie)))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["me_username"], "me");
        assert_eq!(body["lists"][0]["id"], "1");
        assert_eq!(body["lists"][0]["member_count"], 2);
    }

    #[tokio::test]
    async fn refreshing_while_awaiting_callback_reuses_the_request_token() {
        let state = test_state(FakeTwitter::default());
        let app = router(state.clone());

        let first = app.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = session_cookie(&first);
        let first_url = json_body(first).await["auth_url"].clone();

        let second = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert!(second.headers().get(SET_COOKIE).is_none());

        assert_eq!(json_body(second).await["auth_url"], first_url);
        assert_eq!(state.api.inner().request_token_calls(), 1);
    }

    #[tokio::test]
    async fn cookieless_visits_cannot_grow_the_store_without_bound() {
        let config = DmServiceConfig {
            max_sessions: 16,
            ..Default::default()
        };
        let state = Arc::new(AppState::new(FakeTwitter::default(), config));
        let app = router(state.clone());

        for _ in 0..100 {
            let response = app.clone().oneshot(get("/", None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(state.sessions.len() <= 16);
    }

    #[tokio::test]
    async fn list_failure_degrades_the_home_page() {
        let state = test_state(FakeTwitter::default().failing_lists());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let response = app.oneshot(get("/", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["lists"], json!([]));
        assert!(body["lists_error"].is_string());
        let record = state.sessions.load(SESSION_ID).unwrap();
        assert_eq!(record.screen_name.as_deref(), Some("me"));
    }

    #[tokio::test]
    async fn request_in_flight_during_logout_does_not_restore_the_session() {
        let state = test_state(FakeTwitter::default());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
        let mut in_flight = state.sessions.open(&headers);
        in_flight.record.screen_name = Some("me".into());

        let response = app.oneshot(get("/logout", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        assert_eq!(state.sessions.commit(&in_flight, false), None);
        assert_eq!(state.sessions.load(SESSION_ID), None);
    }

    #[tokio::test]
    async fn failed_callback_surfaces_auth_error() {
        let state = test_state(FakeTwitter::default().failing_exchange());
        let app = router(state);

        let response = app.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = session_cookie(&response);

        let response = app
            .oneshot(get("/?oauth_token=req&oauth_verifier=v", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(
            body["auth_error"],
            "Twitter authorization failed, please try again."
        );
        assert!(body["auth_url"].is_string());
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let state = test_state(FakeTwitter::default());
        let cookie = signed_in(&state);
        let app = router(state.clone());

        let response = app.oneshot(get("/logout", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=0"));
        assert_eq!(state.sessions.load(SESSION_ID), None);
    }

    #[test]
    fn configured_callback_url_is_used() {
        let config = DmServiceConfig {
            callback_url: Some("https://dm.example.com/".into()),
            ..Default::default()
        };

        let url = callback_url(&config, &HeaderMap::new()).unwrap();
        assert_eq!(url, "https://dm.example.com/");
    }

    #[test]
    fn callback_url_from_forwarded_host() {
        let config = DmServiceConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("dm.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        assert_eq!(
            callback_url(&config, &headers).unwrap(),
            "https://dm.example.com/"
        );
        assert!(callback_url(&config, &HeaderMap::new()).is_err());
    }

    #[tokio::test]
    async fn sends_are_rate_limited_per_client() {
        let config = DmServiceConfig {
            send_rate_limit: Some(SendRateLimit {
                period_secs: 60,
                burst: 1,
            }),
            ..Default::default()
        };
        let app = router(Arc::new(AppState::new(FakeTwitter::default(), config)));

        let request = || {
            let mut request = post_json(json!({}), None);
            request
                .headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
            request
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        let second = app.oneshot(request()).await.unwrap();

        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
