use serde::Deserialize;
use thiserror::Error;

/// Twitter error code for "Sorry, that page does not exist" / unknown user.
pub const CODE_USER_NOT_FOUND: u32 = 34;
/// Twitter error code returned when the recipient does not follow the sender.
pub const CODE_NOT_FOLLOWING: u32 = 150;

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Twitter API returned {status}: {}", describe(.errors))]
    Api { status: u16, errors: Vec<ApiErrorDetail> },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

impl TwitterError {
    /// Builds an [`TwitterError::Api`] from a non-success response body.
    ///
    /// Bodies that are not the usual `{"errors": [...]}` document still yield
    /// an `Api` error, just without any codes.
    pub fn from_response(status: u16, body: &str) -> Self {
        let errors = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.errors)
            .unwrap_or_default();
        TwitterError::Api { status, errors }
    }

    pub fn error_codes(&self) -> Vec<u32> {
        match self {
            TwitterError::Api { errors, .. } => errors.iter().map(|e| e.code).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_code(&self, code: u32) -> bool {
        matches!(self, TwitterError::Api { errors, .. } if errors.iter().any(|e| e.code == code))
    }
}

fn describe(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
