use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_twitter_client::TwitterError;
use serde::Serialize;

/// Per-field validation messages, keyed by the submitted field name.
pub type FieldErrors = BTreeMap<&'static str, String>;

pub const AUTH_REQUIRED_MESSAGE: &str = "You need to authenticate first!";

#[derive(Debug, thiserror::Error)]
pub enum DmError {
    #[error("{}", AUTH_REQUIRED_MESSAGE)]
    AuthRequired,

    #[error("Invalid submission: {}", summarize(.0))]
    Validation(FieldErrors),

    #[error("Twitter error: {0}")]
    Twitter(#[from] TwitterError),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl IntoResponse for DmError {
    fn into_response(self) -> Response {
        let (status, error, fields) = match self {
            DmError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                AUTH_REQUIRED_MESSAGE.to_string(),
                None,
            ),
            DmError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "validation_failed".to_string(),
                Some(fields),
            ),
            DmError::Twitter(ref e) => {
                tracing::error!(error = %e, "Twitter request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Twitter request failed".to_string(),
                    None,
                )
            }
            DmError::Config(ref msg) => {
                tracing::error!(error = %msg, "DM service misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (status, axum::Json(ErrorBody { error, fields })).into_response()
    }
}
