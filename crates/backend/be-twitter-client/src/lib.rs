//! Minimal Twitter REST v1.1 client for the DM service.
//!
//! Requests are signed with OAuth 1.0a (HMAC-SHA1). The [`TwitterApi`] trait
//! is the seam the service depends on, so tests can substitute a fake.

pub mod api;
pub mod client;
pub mod error;
pub mod oauth;
pub mod types;

pub use api::TwitterApi;
pub use client::{TwitterClient, TwitterConfig};
pub use error::{ApiErrorDetail, CODE_NOT_FOLLOWING, CODE_USER_NOT_FOUND, TwitterError};
pub use types::{AccessCredential, AccessGrant, RequestToken, TwitterList};
