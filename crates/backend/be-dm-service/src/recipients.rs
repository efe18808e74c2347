use be_twitter_client::{AccessCredential, TwitterApi, TwitterError};
use indexmap::IndexSet;
use tracing::debug;

/// Ordered set of recipient screen names, stored without the leading `@`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientBatch(IndexSet<String>);

impl RecipientBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the name was already present.
    pub fn insert(&mut self, screen_name: impl Into<String>) -> bool {
        self.0.insert(screen_name.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RecipientBatch {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The Twitter list ids picked in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelection(IndexSet<String>);

impl ListSelection {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ListSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|id| Into::<String>::into(id).trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSource {
    Manual(RecipientBatch),
    List(ListSelection),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: &'static str,
    },
    #[error("list lookup failed: {0}")]
    Lookup(#[from] TwitterError),
}

fn missing_source() -> ResolveError {
    ResolveError::Invalid {
        field: "users_source",
        message: "Specify a valid user source",
    }
}

/// Rejects a missing source or an empty selection without touching the network.
pub fn check_source(source: Option<&RecipientSource>) -> Result<(), ResolveError> {
    match source {
        None => Err(missing_source()),
        Some(RecipientSource::Manual(batch)) if batch.is_empty() => Err(ResolveError::Invalid {
            field: "users",
            message: "Specify at least one user",
        }),
        Some(RecipientSource::List(selection)) if selection.is_empty() => {
            Err(ResolveError::Invalid {
                field: "lists",
                message: "Specify at least one list",
            })
        }
        Some(_) => Ok(()),
    }
}

/// Produces the final recipient set for one submission.
///
/// Manual batches pass through untouched. List selections are expanded by
/// fetching each list's members and taking the union, so someone who is in
/// two selected lists appears once.
pub async fn resolve<T: TwitterApi>(
    api: &T,
    credential: &AccessCredential,
    source: Option<RecipientSource>,
) -> Result<RecipientBatch, ResolveError> {
    check_source(source.as_ref())?;

    let selection = match source {
        Some(RecipientSource::List(selection)) => selection,
        Some(RecipientSource::Manual(batch)) => return Ok(batch),
        None => return Err(missing_source()),
    };

    let mut recipients = RecipientBatch::new();
    for list_id in selection.iter() {
        let members = api.list_members(credential, list_id).await?;
        debug!(list_id, members = members.len(), "Resolved list members");
        recipients.0.extend(members);
    }

    if recipients.is_empty() {
        return Err(ResolveError::Invalid {
            field: "lists",
            message: "The selected lists have no members",
        });
    }

    Ok(recipients)
}
