//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Twitter v1.1 API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;

/// Everything except the RFC 3986 unreserved characters gets encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Application identity issued by Twitter.
#[derive(Debug, Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

/// A token pair, either a temporary request token or a user access token.
#[derive(Debug, Clone, Copy)]
pub struct TokenPair<'a> {
    pub token: &'a str,
    pub secret: &'a str,
}

/// Per-request values that must be unique, split out so signing is testable.
#[derive(Debug, Clone)]
pub struct Nonce {
    pub value: String,
    pub timestamp: i64,
}

impl Nonce {
    pub fn generate() -> Self {
        Self {
            value: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Builds the signature base string from the method, the URL without query,
/// and every request parameter (oauth, query and form body).
pub fn signature_base_string(method: &str, base_url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&normalized)
    )
}

pub fn sign(base_string: &str, consumer_secret: &str, token_secret: Option<&str>) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or(""))
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Produces the value of the `Authorization` header for one request.
///
/// `oauth_extra` carries protocol parameters such as `oauth_callback` or
/// `oauth_verifier`; `request_params` are the query/form parameters that are
/// sent separately but still take part in the signature.
pub fn authorization_header(
    consumer: &Consumer,
    token: Option<TokenPair<'_>>,
    method: &str,
    base_url: &str,
    oauth_extra: &[(&str, &str)],
    request_params: &[(&str, &str)],
    nonce: &Nonce,
) -> String {
    let timestamp = nonce.timestamp.to_string();

    let mut oauth_params: Vec<(&str, &str)> = vec![
        ("oauth_consumer_key", consumer.key.as_str()),
        ("oauth_nonce", nonce.value.as_str()),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_version", "1.0"),
    ];
    if let Some(token) = token {
        oauth_params.push(("oauth_token", token.token));
    }
    oauth_params.extend_from_slice(oauth_extra);

    let mut all_params = oauth_params.clone();
    all_params.extend_from_slice(request_params);

    let base = signature_base_string(method, base_url, &all_params);
    let signature = sign(&base, &consumer.secret, token.map(|t| t.secret));

    oauth_params.push(("oauth_signature", signature.as_str()));
    oauth_params.sort();

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {fields}")
}
