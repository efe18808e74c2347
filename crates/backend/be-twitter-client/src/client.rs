use std::env;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::TwitterApi;
use crate::error::TwitterError;
use crate::oauth::{self, Consumer, Nonce, TokenPair};
use crate::types::{
    AccessCredential, AccessGrant, ApiList, ApiUser, MembersPage, RequestToken, TwitterList,
};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MEMBERS_PAGE_SIZE: &str = "5000";

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl TwitterConfig {
    pub fn from_env() -> Result<Self, TwitterError> {
        let consumer_key = env::var("TWITTER_CONSUMER_KEY")
            .map_err(|_| TwitterError::MissingEnvVar("TWITTER_CONSUMER_KEY"))?;
        let consumer_secret = env::var("TWITTER_CONSUMER_SECRET")
            .map_err(|_| TwitterError::MissingEnvVar("TWITTER_CONSUMER_SECRET"))?;
        let api_base =
            env::var("TWITTER_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        url::Url::parse(&api_base).map_err(|e| {
            TwitterError::Config(format!("TWITTER_API_BASE '{api_base}' is not a valid URL: {e}"))
        })?;

        let timeout_secs = match env::var("TWITTER_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                TwitterError::Config(format!("TWITTER_TIMEOUT_SECS '{raw}' is not a number"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            consumer_key,
            consumer_secret,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub struct TwitterClient {
    consumer: Consumer,
    api_base: String,
    http: reqwest::Client,
}

impl TwitterClient {
    pub fn new(config: TwitterConfig) -> Result<Self, TwitterError> {
        let http = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent("be-dm-service")
            .build()
            .map_err(|e| TwitterError::HttpClient(e.to_string()))?;

        Ok(Self {
            consumer: Consumer {
                key: config.consumer_key,
                secret: config.consumer_secret,
            },
            api_base: config.api_base,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Sends one signed request and returns the body of a successful response.
    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        token: Option<TokenPair<'_>>,
        oauth_extra: &[(&str, &str)],
        params: &[(&str, &str)],
    ) -> Result<String, TwitterError> {
        let url = self.url(path);
        let header = oauth::authorization_header(
            &self.consumer,
            token,
            method.as_str(),
            &url,
            oauth_extra,
            params,
            &Nonce::generate(),
        );

        debug!(%method, path, "Calling Twitter API");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(AUTHORIZATION, header);
        request = if method == Method::GET {
            request.query(params)
        } else {
            request.form(params)
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TwitterError::from_response(status.as_u16(), &body));
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: &AccessCredential,
        params: &[(&str, &str)],
    ) -> Result<T, TwitterError> {
        let body = self
            .signed_request(Method::GET, path, Some(token_pair(credential)), &[], params)
            .await?;
        serde_json::from_str(&body)
            .map_err(|e| TwitterError::InvalidResponse(format!("{path}: {e}")))
    }
}

fn token_pair(credential: &AccessCredential) -> TokenPair<'_> {
    TokenPair {
        token: &credential.token,
        secret: &credential.token_secret,
    }
}

/// Parses the form-encoded bodies returned by the `oauth/*` endpoints.
fn parse_token_response(body: &str) -> Result<(String, String, Option<String>), TwitterError> {
    let mut token = None;
    let mut secret = None;
    let mut screen_name = None;

    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            "screen_name" => screen_name = Some(value.into_owned()),
            _ => {}
        }
    }

    match (token, secret) {
        (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
            Ok((token, secret, screen_name))
        }
        _ => Err(TwitterError::InvalidResponse(
            "missing oauth_token or oauth_token_secret".into(),
        )),
    }
}

impl TwitterApi for TwitterClient {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, TwitterError> {
        let body = self
            .signed_request(
                Method::POST,
                "/oauth/request_token",
                None,
                &[("oauth_callback", callback_url)],
                &[],
            )
            .await?;
        let (token, token_secret, _) = parse_token_response(&body)?;
        Ok(RequestToken {
            token,
            token_secret,
        })
    }

    fn authorize_url(&self, request_token: &RequestToken) -> String {
        format!(
            "{}?oauth_token={}",
            self.url("/oauth/authorize"),
            oauth::percent_encode(&request_token.token)
        )
    }

    async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessGrant, TwitterError> {
        let body = self
            .signed_request(
                Method::POST,
                "/oauth/access_token",
                Some(TokenPair {
                    token: &request_token.token,
                    secret: &request_token.token_secret,
                }),
                &[("oauth_verifier", verifier)],
                &[],
            )
            .await?;
        let (token, token_secret, screen_name) = parse_token_response(&body)?;
        Ok(AccessGrant {
            credential: AccessCredential {
                token,
                token_secret,
            },
            screen_name,
        })
    }

    async fn screen_name(&self, credential: &AccessCredential) -> Result<String, TwitterError> {
        let user: ApiUser = self
            .get_json(
                "/1.1/account/verify_credentials.json",
                credential,
                &[("skip_status", "true"), ("include_entities", "false")],
            )
            .await?;
        Ok(user.screen_name)
    }

    async fn owned_lists(
        &self,
        credential: &AccessCredential,
    ) -> Result<Vec<TwitterList>, TwitterError> {
        let lists: Vec<ApiList> = self
            .get_json("/1.1/lists/list.json", credential, &[])
            .await?;
        Ok(lists.into_iter().map(TwitterList::from).collect())
    }

    async fn list_members(
        &self,
        credential: &AccessCredential,
        list_id: &str,
    ) -> Result<Vec<String>, TwitterError> {
        let mut members = Vec::new();
        let mut cursor = "-1".to_string();

        loop {
            let page: MembersPage = self
                .get_json(
                    "/1.1/lists/members.json",
                    credential,
                    &[
                        ("list_id", list_id),
                        ("count", MEMBERS_PAGE_SIZE),
                        ("cursor", cursor.as_str()),
                        ("skip_status", "true"),
                    ],
                )
                .await?;

            members.extend(page.users.into_iter().map(|u| u.screen_name));

            match page.next_cursor_str {
                Some(next) if next != "0" && next != cursor => cursor = next,
                _ => break,
            }
        }

        debug!(list_id, count = members.len(), "Fetched list members");
        Ok(members)
    }

    async fn send_direct_message(
        &self,
        credential: &AccessCredential,
        screen_name: &str,
        text: &str,
    ) -> Result<(), TwitterError> {
        self.signed_request(
            Method::POST,
            "/1.1/direct_messages/new.json",
            Some(token_pair(credential)),
            &[],
            &[("screen_name", screen_name), ("text", text)],
        )
        .await?;
        Ok(())
    }
}
