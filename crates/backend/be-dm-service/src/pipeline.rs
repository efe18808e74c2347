use be_twitter_client::{AccessCredential, TwitterApi};
use tracing::debug;

use crate::dispatch::{self, DispatchOutcome};
use crate::error::{DmError, FieldErrors};
use crate::recipients::{self, ResolveError};
use crate::types::SendDmRequest;
use crate::validation;

/// Runs one DM submission through auth gate, validation, resolution and
/// dispatch.
///
/// Only a failed list lookup is returned as `Err`; every other result,
/// including per-recipient delivery failures, is a [`DispatchOutcome`].
pub async fn process_submission<T: TwitterApi>(
    api: &T,
    credential: Option<&AccessCredential>,
    request: &SendDmRequest,
) -> Result<DispatchOutcome, DmError> {
    let Some(credential) = credential else {
        debug!("Rejecting DM submission from unauthenticated session");
        return Ok(DispatchOutcome::AuthRequired);
    };

    let submission = match validation::validate_submission(request) {
        Ok(submission) => submission,
        Err(fields) => return Ok(DispatchOutcome::ValidationFailed(fields)),
    };

    let recipients = match recipients::resolve(api, credential, submission.source).await {
        Ok(recipients) => recipients,
        Err(ResolveError::Invalid { field, message }) => {
            let mut fields = FieldErrors::new();
            fields.insert(field, message.to_string());
            return Ok(DispatchOutcome::ValidationFailed(fields));
        }
        Err(ResolveError::Lookup(e)) => return Err(DmError::Twitter(e)),
    };

    Ok(dispatch::dispatch(api, credential, &recipients, &submission.body).await)
}
