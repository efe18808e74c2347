//! In-memory [`TwitterApi`] used by the unit and router tests.

use std::collections::HashMap;

use be_twitter_client::{
    AccessCredential, AccessGrant, RequestToken, TwitterApi, TwitterError, TwitterList,
};
use parking_lot::Mutex;

pub fn credential() -> AccessCredential {
    AccessCredential {
        token: "access-token".into(),
        token_secret: "access-secret".into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RequestToken,
    AccessToken,
    ScreenName,
    OwnedLists,
    ListMembers(String),
    Send(String),
}

#[derive(Default)]
pub struct FakeTwitter {
    lists: HashMap<String, Vec<String>>,
    send_failures: HashMap<String, u32>,
    exchange_fails: bool,
    lists_fail: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeTwitter {
    pub fn with_list(mut self, id: &str, members: &[&str]) -> Self {
        self.lists.insert(
            id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Sending to `recipient` fails with the given Twitter error code.
    pub fn failing_send(mut self, recipient: &str, code: u32) -> Self {
        self.send_failures.insert(recipient.to_string(), code);
        self
    }

    pub fn failing_exchange(mut self) -> Self {
        self.exchange_fails = true;
        self
    }

    pub fn failing_lists(mut self) -> Self {
        self.lists_fail = true;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(to) => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn send_attempts_for(&self, recipient: &str) -> usize {
        self.sent_to().iter().filter(|to| *to == recipient).count()
    }

    pub fn list_member_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListMembers(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn owned_list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::OwnedLists)
            .count()
    }

    pub fn request_token_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::RequestToken)
            .count()
    }

    pub fn screen_name_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::ScreenName)
            .count()
    }
}

fn api_error(status: u16, code: u32) -> TwitterError {
    TwitterError::from_response(
        status,
        &format!(r#"{{"errors":[{{"code":{code},"message":"fake"}}]}}"#),
    )
}

impl TwitterApi for FakeTwitter {
    async fn request_token(&self, _callback_url: &str) -> Result<RequestToken, TwitterError> {
        self.record(Call::RequestToken);
        Ok(RequestToken {
            token: "req".into(),
            token_secret: "req-secret".into(),
        })
    }

    fn authorize_url(&self, request_token: &RequestToken) -> String {
        format!(
            "https://twitter.test/oauth/authorize?oauth_token={}",
            request_token.token
        )
    }

    async fn access_token(
        &self,
        _request_token: &RequestToken,
        _verifier: &str,
    ) -> Result<AccessGrant, TwitterError> {
        self.record(Call::AccessToken);
        if self.exchange_fails {
            return Err(api_error(401, 32));
        }
        Ok(AccessGrant {
            credential: credential(),
            screen_name: Some("me".into()),
        })
    }

    async fn screen_name(&self, _credential: &AccessCredential) -> Result<String, TwitterError> {
        self.record(Call::ScreenName);
        Ok("me".into())
    }

    async fn owned_lists(
        &self,
        _credential: &AccessCredential,
    ) -> Result<Vec<TwitterList>, TwitterError> {
        self.record(Call::OwnedLists);
        if self.lists_fail {
            return Err(api_error(429, 88));
        }
        let mut lists: Vec<TwitterList> = self
            .lists
            .iter()
            .map(|(id, members)| TwitterList {
                id: id.clone(),
                name: format!("List {id}"),
                member_count: members.len() as u64,
            })
            .collect();
        lists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(lists)
    }

    async fn list_members(
        &self,
        _credential: &AccessCredential,
        list_id: &str,
    ) -> Result<Vec<String>, TwitterError> {
        self.record(Call::ListMembers(list_id.to_string()));
        self.lists
            .get(list_id)
            .cloned()
            .ok_or_else(|| api_error(404, 34))
    }

    async fn send_direct_message(
        &self,
        _credential: &AccessCredential,
        screen_name: &str,
        _text: &str,
    ) -> Result<(), TwitterError> {
        self.record(Call::Send(screen_name.to_string()));
        match self.send_failures.get(screen_name) {
            Some(code) => Err(api_error(403, *code)),
            None => Ok(()),
        }
    }
}
