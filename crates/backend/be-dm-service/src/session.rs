//! Typed, server-side session storage keyed by a cookie.
//!
//! Handlers load the [`Session`] through its extractor at the start of a
//! request and explicitly [`SessionStore::commit`] or [`SessionStore::delete`]
//! it before responding.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use be_twitter_client::{AccessCredential, RequestToken, TwitterApi};
use moka::Expiry;
use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use tracing::debug;

use crate::auth;
use crate::service::AppState;

pub const SESSION_COOKIE: &str = "dm_session";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    /// Cached display name of the authenticated user.
    pub screen_name: Option<String>,
    /// Present only between issuing the authorization URL and the callback.
    pub request_token: Option<RequestToken>,
}

impl SessionRecord {
    pub fn is_empty(&self) -> bool {
        *self == SessionRecord::default()
    }

    pub fn set_credential(&mut self, credential: AccessCredential) {
        self.access_token = Some(credential.token);
        self.access_token_secret = Some(credential.token_secret);
    }
}

/// Signed-in sessions live for the idle TTL since last use. Sessions that
/// only hold a pending request token get the much shorter pending TTL.
struct SessionExpiry {
    idle_ttl: Duration,
    pending_ttl: Duration,
}

impl SessionExpiry {
    fn ttl_for(&self, record: &SessionRecord) -> Duration {
        if auth::credential(record).is_some() {
            self.idle_ttl
        } else {
            self.pending_ttl.min(self.idle_ttl)
        }
    }
}

impl Expiry<String, SessionRecord> for SessionExpiry {
    fn expire_after_create(
        &self,
        _id: &String,
        record: &SessionRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(record))
    }

    fn expire_after_read(
        &self,
        _id: &String,
        record: &SessionRecord,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(record))
    }

    fn expire_after_update(
        &self,
        _id: &String,
        record: &SessionRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl_for(record))
    }
}

pub struct SessionStore {
    sessions: Cache<String, SessionRecord>,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, pending_ttl: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .expire_after(SessionExpiry {
                    idle_ttl,
                    pending_ttl,
                })
                .build(),
        }
    }

    /// Loads the session named by the request cookie, or starts a new one.
    ///
    /// Unknown or expired ids are never reused, so a client cannot pick its
    /// own session id.
    pub fn open(&self, headers: &HeaderMap) -> Session {
        if let Some(id) = session_id_from_headers(headers) {
            if let Some(record) = self.load(&id) {
                return Session {
                    id,
                    record,
                    is_new: false,
                };
            }
        }
        Session::fresh()
    }

    pub fn load(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.get(id)
    }

    pub fn save(&self, id: &str, record: SessionRecord) {
        self.sessions.insert(id.to_string(), record);
    }

    pub fn delete(&self, id: &str) {
        self.sessions.invalidate(id);
    }

    /// Number of live sessions, after pending evictions have been applied.
    pub fn len(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the session to a fresh id and forgets the old one.
    pub fn rotate(&self, session: &mut Session) {
        self.delete(&session.id);
        session.id = new_session_id();
        session.is_new = true;
    }

    /// Persists the session at the end of a request.
    ///
    /// Returns the `Set-Cookie` value when the client does not hold the
    /// session id yet. Empty sessions are not stored. An existing session that
    /// was deleted while the request ran (by logout or expiry) stays deleted.
    pub fn commit(&self, session: &Session, secure: bool) -> Option<String> {
        if session.record.is_empty() {
            self.delete(&session.id);
            return None;
        }

        if session.is_new {
            self.save(&session.id, session.record.clone());
            return Some(session_cookie(&session.id, secure));
        }

        let record = session.record.clone();
        let result = self
            .sessions
            .entry(session.id.clone())
            .and_compute_with(|existing| match existing {
                Some(_) => Op::Put(record),
                None => Op::Nop,
            });
        if let CompResult::StillNone(_) = result {
            debug!("Session ended while the request ran, not saving it");
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub record: SessionRecord,
    is_new: bool,
}

impl Session {
    fn fresh() -> Self {
        Self {
            id: new_session_id(),
            record: SessionRecord::default(),
            is_new: true,
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl<T: TwitterApi> FromRequestParts<Arc<AppState<T>>> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<T>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.sessions.open(&parts.headers))
    }
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
