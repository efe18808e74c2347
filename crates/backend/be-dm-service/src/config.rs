use std::time::Duration;

use crate::error::DmError;

const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 14;
const DEFAULT_PENDING_AUTH_TTL_SECS: u64 = 60 * 10;
const DEFAULT_MAX_SESSIONS: u64 = 100_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_SEND_BURST: u64 = 5;

/// Per client IP: one request is replenished every `period_secs`, with at
/// most `burst` requests available at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRateLimit {
    pub period_secs: u64,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct DmServiceConfig {
    /// Absolute URL Twitter redirects to after authorization. When unset the
    /// URL is derived from the incoming request's `Host` header.
    pub callback_url: Option<String>,
    /// Idle lifetime of a signed-in session.
    pub session_ttl: Duration,
    /// Lifetime of a session that only holds a pending request token.
    pub pending_auth_ttl: Duration,
    pub max_sessions: u64,
    pub cookie_secure: bool,
    pub cache_ttl: Duration,
    pub send_rate_limit: Option<SendRateLimit>,
}

impl Default for DmServiceConfig {
    fn default() -> Self {
        Self {
            callback_url: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            pending_auth_ttl: Duration::from_secs(DEFAULT_PENDING_AUTH_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
            cookie_secure: false,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            send_rate_limit: None,
        }
    }
}

impl DmServiceConfig {
    pub fn from_env() -> Result<Self, DmError> {
        let env = |name: &str| std::env::var(name).ok();

        let callback_url = env("DM_CALLBACK_URL").filter(|s| !s.is_empty());
        if let Some(url) = &callback_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DmError::Config(format!(
                    "DM_CALLBACK_URL '{url}' must be an absolute http(s) URL"
                )));
            }
        }

        let max_sessions = parse_u64(
            "DM_MAX_SESSIONS",
            env("DM_MAX_SESSIONS"),
            DEFAULT_MAX_SESSIONS,
        )?;
        if max_sessions == 0 {
            return Err(DmError::Config("DM_MAX_SESSIONS must be positive".into()));
        }

        Ok(Self {
            callback_url,
            session_ttl: Duration::from_secs(parse_u64(
                "DM_SESSION_TTL_SECS",
                env("DM_SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )?),
            pending_auth_ttl: Duration::from_secs(parse_u64(
                "DM_PENDING_AUTH_TTL_SECS",
                env("DM_PENDING_AUTH_TTL_SECS"),
                DEFAULT_PENDING_AUTH_TTL_SECS,
            )?),
            max_sessions,
            cookie_secure: env("DM_COOKIE_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cache_ttl: Duration::from_secs(parse_u64(
                "DM_CACHE_TTL_SECS",
                env("DM_CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?),
            send_rate_limit: send_rate_limit(env("DM_SEND_PERIOD_SECS"), env("DM_SEND_BURST"))?,
        })
    }
}

/// Rate limiting is on only when `DM_SEND_PERIOD_SECS` is set.
fn send_rate_limit(
    period: Option<String>,
    burst: Option<String>,
) -> Result<Option<SendRateLimit>, DmError> {
    if period.is_none() {
        return Ok(None);
    }
    let period_secs = parse_u64("DM_SEND_PERIOD_SECS", period, 1)?;
    let burst = parse_u64("DM_SEND_BURST", burst, DEFAULT_SEND_BURST)?;
    if period_secs == 0 || burst == 0 {
        return Err(DmError::Config(
            "DM_SEND_PERIOD_SECS and DM_SEND_BURST must be positive".into(),
        ));
    }
    let burst = u32::try_from(burst)
        .map_err(|_| DmError::Config(format!("DM_SEND_BURST '{burst}' is too large")))?;

    Ok(Some(SendRateLimit { period_secs, burst }))
}

fn parse_u64(name: &str, raw: Option<String>, default: u64) -> Result<u64, DmError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| DmError::Config(format!("{name} '{raw}' is not a valid number"))),
        None => Ok(default),
    }
}
