use async_graphql::{Context, Object, Result};
use rand::distr::{Alphanumeric, SampleString};
use tracing::info;

use confhub_common::{canonical_email, AttendanceStatus};
use confhub_store::{save_conference, DynStore};

use super::types::{AttendeeInput, ConferenceInput, GqlSavedConference};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Persist one conference aggregate — location, conference, speaker set
    /// and links, and any requested speaker removals. All or nothing.
    async fn save_conference(
        &self,
        ctx: &Context<'_>,
        input: ConferenceInput,
    ) -> Result<GqlSavedConference> {
        let store = ctx.data_unchecked::<DynStore>();
        let aggregate = save_conference(store.as_ref(), &input.into_save()).await?;
        Ok(GqlSavedConference(aggregate))
    }

    /// Mark the attendee as attending. Returns a confirmation token for the
    /// client to display; the token is not persisted.
    async fn attend(&self, ctx: &Context<'_>, input: AttendeeInput) -> Result<String> {
        let store = ctx.data_unchecked::<DynStore>();
        let email = canonical_email(&input.attendee_email);
        store
            .update_attendance(input.conference_id, &email, AttendanceStatus::Attended)
            .await?;
        info!(conference_id = input.conference_id, "attendee registered");
        Ok(confirmation_token())
    }

    /// Withdraw the attendee. Returns the persisted status code.
    async fn withdraw(&self, ctx: &Context<'_>, input: AttendeeInput) -> Result<i32> {
        let store = ctx.data_unchecked::<DynStore>();
        let email = canonical_email(&input.attendee_email);
        let status = store
            .update_attendance(input.conference_id, &email, AttendanceStatus::Withdrawn)
            .await?;
        info!(conference_id = input.conference_id, "attendee withdrawn");
        Ok(status.code())
    }
}

const CONFIRMATION_TOKEN_LEN: usize = 10;

fn confirmation_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), CONFIRMATION_TOKEN_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_tokens_are_alphanumeric_and_fixed_length() {
        let token = confirmation_token();
        assert_eq!(token.len(), CONFIRMATION_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        // Two draws colliding would be a broken RNG.
        assert_ne!(token, confirmation_token());
    }
}
