//! Form-level validation of a DM submission.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FieldErrors;
use crate::recipients::{self, ListSelection, RecipientBatch, RecipientSource, ResolveError};
use crate::types::SendDmRequest;

/// Legacy Twitter DM length limit.
pub const MAX_MESSAGE_CHARS: usize = 140;

/// `@` followed by a letter and at least one more letter or digit.
static HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@([A-Za-z][A-Za-z0-9]+)$").expect("handle pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUsernames(pub Vec<String>);

impl fmt::Display for InvalidUsernames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} are not valid Twitter usernames", self.0.join(", "))
    }
}

/// Splits on commas, trims each piece and drops the empty ones.
pub fn split_tokens(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Returns the handle without its `@` when `token` is a well-formed mention.
pub fn parse_handle(token: &str) -> Option<&str> {
    HANDLE
        .captures(token)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses the free-text recipients field.
///
/// Every offending token is reported, verbatim, so the user can fix them all
/// at once.
pub fn parse_recipients(raw: &str) -> Result<RecipientBatch, InvalidUsernames> {
    let mut batch = RecipientBatch::new();
    let mut invalid = Vec::new();

    for token in split_tokens(raw) {
        match parse_handle(token) {
            Some(handle) => {
                batch.insert(handle);
            }
            None => invalid.push(token.to_string()),
        }
    }

    if invalid.is_empty() {
        Ok(batch)
    } else {
        Err(InvalidUsernames(invalid))
    }
}

/// Message text, guaranteed non-blank and within [`MAX_MESSAGE_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        if text.trim().is_empty() {
            return Err("This field is required.");
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err("Message is too long");
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsersSource {
    Manual,
    List,
}

impl UsersSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Manual" => Some(UsersSource::Manual),
            "List" => Some(UsersSource::List),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub source: Option<RecipientSource>,
    pub body: MessageBody,
}

/// Validates every field of a submission and reports all problems together.
///
/// Source emptiness is checked here as well as in the resolver so the user
/// sees it alongside any message error.
pub fn validate_submission(request: &SendDmRequest) -> Result<ValidatedSubmission, FieldErrors> {
    let mut errors = FieldErrors::new();

    let source = match request.users_source.as_deref().and_then(UsersSource::parse) {
        Some(UsersSource::Manual) => {
            match parse_recipients(request.users.as_deref().unwrap_or_default()) {
                Ok(batch) => Some(RecipientSource::Manual(batch)),
                Err(invalid) => {
                    errors.insert("users", invalid.to_string());
                    None
                }
            }
        }
        Some(UsersSource::List) => Some(RecipientSource::List(
            request.lists.iter().cloned().collect::<ListSelection>(),
        )),
        None => None,
    };

    if !errors.contains_key("users") {
        if let Err(ResolveError::Invalid { field, message }) =
            recipients::check_source(source.as_ref())
        {
            errors.insert(field, message.to_string());
        }
    }

    let body = match MessageBody::parse(request.dmtext.as_deref().unwrap_or_default()) {
        Ok(body) => Some(body),
        Err(message) => {
            errors.insert("dmtext", message.to_string());
            None
        }
    };

    match body {
        Some(body) if errors.is_empty() => Ok(ValidatedSubmission { source, body }),
        _ => Err(errors),
    }
}
