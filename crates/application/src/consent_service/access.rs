use std::str::FromStr;

use consentry_core::{ActorIdentity, AppResult};
use consentry_domain::{
    AccessDecision, DataAccessAttempt, PatientPin, Permission, RecordCategory,
    evaluate_access_across,
};

use super::{AccessCheckInput, ConsentService};
use crate::ConsentQuery;

impl ConsentService {
    /// Evaluates one access attempt against every grant the provider holds
    /// for the patient. Grants read past expiry are settled first.
    pub async fn check_access(
        &self,
        actor: &ActorIdentity,
        input: AccessCheckInput,
    ) -> AppResult<AccessDecision> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentAccessCheck)?;

        let patient_pin = PatientPin::new(input.patient_pin)?;
        let attempt = DataAccessAttempt {
            category: RecordCategory::from_str(input.category.as_str())?,
            episode_id: input
                .episode_id
                .map(|episode_id| episode_id.trim().to_owned())
                .filter(|episode_id| !episode_id.is_empty()),
            recorded_at: input.recorded_at,
        };

        let now = self.clock.now();
        let stored = self
            .grant_repository
            .list_consents(ConsentQuery {
                patient_pin: Some(patient_pin),
                requester_id: Some(actor.subject().to_owned()),
                ..ConsentQuery::default()
            })
            .await?;
        let consents = self.settle_all(actor, stored, now).await?;

        Ok(evaluate_access_across(consents.iter(), &attempt, now))
    }
}
