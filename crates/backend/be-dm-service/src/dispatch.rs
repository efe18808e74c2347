use be_twitter_client::{
    AccessCredential, CODE_NOT_FOLLOWING, CODE_USER_NOT_FOUND, TwitterApi, TwitterError,
};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::error::FieldErrors;
use crate::recipients::RecipientBatch;
use crate::validation::MessageBody;

pub const SUCCESS_MESSAGE: &str = "Message was sent";

/// Why a single recipient did not get the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    DoesNotExist,
    NotFollowing,
    Unknown,
}

impl DeliveryFailure {
    pub fn classify(err: &TwitterError) -> Self {
        if err.has_code(CODE_USER_NOT_FOUND) {
            DeliveryFailure::DoesNotExist
        } else if err.has_code(CODE_NOT_FOLLOWING) {
            DeliveryFailure::NotFollowing
        } else {
            DeliveryFailure::Unknown
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryFailure::DoesNotExist => "does not exist",
            DeliveryFailure::NotFollowing => "is not following you",
            DeliveryFailure::Unknown => "unknown error",
        }
    }

    pub fn message_for(&self, recipient: &str) -> String {
        match self {
            DeliveryFailure::DoesNotExist => format!("User {recipient} does not exist"),
            DeliveryFailure::NotFollowing => format!("User {recipient} is not following you"),
            DeliveryFailure::Unknown => {
                format!("Unknown error when sending message to {recipient}")
            }
        }
    }
}

/// Result of one submission, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    AllSucceeded,
    PartialFailure(IndexMap<String, DeliveryFailure>),
    AuthRequired,
    ValidationFailed(FieldErrors),
}

impl DispatchOutcome {
    /// One user-visible line per failure, or the success line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            DispatchOutcome::AllSucceeded => vec![SUCCESS_MESSAGE.to_string()],
            DispatchOutcome::PartialFailure(failures) => failures
                .iter()
                .map(|(recipient, failure)| failure.message_for(recipient))
                .collect(),
            DispatchOutcome::AuthRequired => vec![crate::error::AUTH_REQUIRED_MESSAGE.to_string()],
            DispatchOutcome::ValidationFailed(fields) => fields.values().cloned().collect(),
        }
    }
}

/// Sends `body` to every recipient, one attempt each, in order.
///
/// A failed recipient never stops the remaining sends.
pub async fn dispatch<T: TwitterApi>(
    api: &T,
    credential: &AccessCredential,
    recipients: &RecipientBatch,
    body: &MessageBody,
) -> DispatchOutcome {
    let mut failures = IndexMap::new();

    for recipient in recipients.iter() {
        if let Err(e) = api
            .send_direct_message(credential, recipient, body.as_str())
            .await
        {
            let failure = DeliveryFailure::classify(&e);
            warn!(
                recipient,
                reason = failure.reason(),
                error = %e,
                "Direct message not delivered"
            );
            failures.insert(recipient.to_string(), failure);
        }
    }

    info!(
        attempted = recipients.len(),
        failed = failures.len(),
        "Direct message batch finished"
    );

    if failures.is_empty() {
        DispatchOutcome::AllSucceeded
    } else {
        DispatchOutcome::PartialFailure(failures)
    }
}
