use be_twitter_client::TwitterList;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /`.
#[derive(Debug, Default, Deserialize)]
pub struct SendDmRequest {
    #[serde(default)]
    pub users_source: Option<String>,
    #[serde(default)]
    pub users: Option<String>,
    #[serde(default, deserialize_with = "list_ids")]
    pub lists: Vec<String>,
    #[serde(default)]
    pub dmtext: Option<String>,
}

/// List ids arrive as strings from most clients, but a bare JSON number is
/// what Twitter itself reports, so accept both.
fn list_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListId {
        Text(String),
        Number(u64),
    }

    let ids = Vec::<ListId>::deserialize(deserializer)?;
    Ok(ids
        .into_iter()
        .map(|id| match id {
            ListId::Text(s) => s,
            ListId::Number(n) => n.to_string(),
        })
        .collect())
}

/// Query string of `GET /`, populated when Twitter redirects back.
#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub denied: Option<String>,
}

impl HomeQuery {
    pub fn is_callback(&self) -> bool {
        self.oauth_verifier.is_some() || self.denied.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_error: Option<String>,
    pub lists: Vec<TwitterList>,
    /// Set when the user's lists could not be fetched; `lists` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lists_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    PartialFailure,
}

#[derive(Debug, Serialize)]
pub struct SendDmResponse {
    pub status: SendStatus,
    /// User-facing lines, one per failed recipient or a single success line.
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub failures: IndexMap<String, String>,
}
