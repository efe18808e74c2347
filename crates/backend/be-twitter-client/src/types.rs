use serde::{Deserialize, Serialize};

/// Temporary token issued at the start of the OAuth handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub token: String,
    pub token_secret: String,
}

/// A user's access token pair. Both halves are required to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &self.token)
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Result of exchanging a request token and verifier.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub credential: AccessCredential,
    pub screen_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwitterList {
    pub id: String,
    pub name: String,
    pub member_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUser {
    pub screen_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiList {
    pub id_str: String,
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
}

impl From<ApiList> for TwitterList {
    fn from(list: ApiList) -> Self {
        Self {
            id: list.id_str,
            name: list.name,
            member_count: list.member_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembersPage {
    #[serde(default)]
    pub users: Vec<ApiUser>,
    #[serde(default)]
    pub next_cursor_str: Option<String>,
}
