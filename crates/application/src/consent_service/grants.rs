use std::str::FromStr;

use chrono::Duration;
use consentry_core::{ActorIdentity, AppError, AppResult};
use consentry_domain::{AuditAction, Consent, ConsentId, ConsentStatus, PatientPin, Permission};

use super::{ConsentListFilter, ConsentService};
use crate::expiry::{CONSENT_RESOURCE_TYPE, ExpiryOutcome};
use crate::{AuditEvent, ConsentQuery};

/// Window used by the expiring-consents view when the caller names none.
const DEFAULT_EXPIRING_WITHIN_MINUTES: u32 = 24 * 60;

/// Widest window accepted by the expiring-consents view.
const MAX_EXPIRING_WITHIN_MINUTES: u32 = 7 * 24 * 60;

impl ConsentService {
    /// Lists grants the actor is party to, with lazily settled expiry.
    pub async fn list_consents(
        &self,
        actor: &ActorIdentity,
        filter: ConsentListFilter,
    ) -> AppResult<Vec<Consent>> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRead)?;

        let status = filter
            .status
            .as_deref()
            .map(ConsentStatus::from_str)
            .transpose()?;
        let patient_pin = filter.patient_pin.map(PatientPin::new).transpose()?;
        let query = self.party_query(actor, patient_pin)?;

        let now = self.clock.now();
        let stored = self.grant_repository.list_consents(query).await?;
        let settled = self.settle_all(actor, stored, now).await?;

        Ok(settled
            .into_iter()
            .filter(|consent| status.is_none_or(|status| consent.status() == status))
            .collect())
    }

    /// Lists active grants expiring within the given window, soonest first.
    pub async fn list_expiring_consents(
        &self,
        actor: &ActorIdentity,
        within_minutes: Option<u32>,
    ) -> AppResult<Vec<Consent>> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRead)?;

        let within_minutes = within_minutes.unwrap_or(DEFAULT_EXPIRING_WITHIN_MINUTES);
        if !(1..=MAX_EXPIRING_WITHIN_MINUTES).contains(&within_minutes) {
            return Err(AppError::Validation(format!(
                "within_minutes must be between 1 and {MAX_EXPIRING_WITHIN_MINUTES}"
            )));
        }

        let now = self.clock.now();
        let mut query = self.party_query(actor, None)?;
        query.status = Some(ConsentStatus::Active);
        query.expires_before = Some(now + Duration::minutes(i64::from(within_minutes)));

        let stored = self.grant_repository.list_consents(query).await?;
        let mut expiring: Vec<Consent> = self
            .settle_all(actor, stored, now)
            .await?
            .into_iter()
            .filter(|consent| consent.status() == ConsentStatus::Active)
            .collect();
        expiring.sort_by_key(Consent::expires_at);

        Ok(expiring)
    }

    /// Revokes an active grant owned by the patient.
    pub async fn revoke_consent(
        &self,
        actor: &ActorIdentity,
        consent_id: ConsentId,
        reason: Option<String>,
    ) -> AppResult<Consent> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentGrantRevoke)?;

        let stored = self.load_consent(consent_id).await?;
        self.authorization_service
            .require_own_pin(actor, stored.patient_pin())?;

        let now = self.clock.now();
        let mut consent = match self.settle(actor, stored, now).await? {
            ExpiryOutcome::NotDue(consent) => consent,
            ExpiryOutcome::Expired(consent) | ExpiryOutcome::Lost(consent) => {
                return Err(AppError::Conflict(format!(
                    "consent '{consent_id}' is already {}",
                    consent.status().as_str()
                )));
            }
        };

        consent.revoke(actor.subject(), reason, now)?;
        let event = AuditEvent {
            actor: actor.subject().to_owned(),
            action: AuditAction::ConsentGrantRevoked,
            resource_type: CONSENT_RESOURCE_TYPE.to_owned(),
            resource_id: consent.id().to_string(),
            patient_pin: consent.patient_pin().clone(),
            resulting_state: consent.status().as_str().to_owned(),
            detail: consent
                .revoke_reason()
                .map(|reason| format!("revoked consent: {reason}"))
                .or(Some("revoked consent".to_owned())),
            occurred_at: now,
        };
        if !self
            .grant_repository
            .transition_consent(&consent, ConsentStatus::Active, &event)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "consent '{consent_id}' is no longer active"
            )));
        }

        Ok(consent)
    }

    pub(super) async fn load_consent(&self, consent_id: ConsentId) -> AppResult<Consent> {
        self.grant_repository
            .find_consent(consent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("consent '{consent_id}' does not exist")))
    }

    /// Builds the grant filter restricted to what the actor may see.
    fn party_query(
        &self,
        actor: &ActorIdentity,
        patient_pin: Option<PatientPin>,
    ) -> AppResult<ConsentQuery> {
        if actor.role().is_provider() {
            return Ok(ConsentQuery {
                patient_pin,
                requester_id: Some(actor.subject().to_owned()),
                ..ConsentQuery::default()
            });
        }

        let own_pin = self.authorization_service.patient_pin_of(actor)?;
        if let Some(patient_pin) = patient_pin.as_ref() {
            self.authorization_service.require_own_pin(actor, patient_pin)?;
        }

        Ok(ConsentQuery {
            patient_pin: Some(own_pin),
            ..ConsentQuery::default()
        })
    }
}
