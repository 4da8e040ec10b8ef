use std::str::FromStr;

use consentry_core::{ActorIdentity, AppError, AppResult};
use consentry_domain::{
    AccessDuration, ApprovalDecision, AuditAction, Consent, ConsentRequest, ConsentRequestId,
    ConsentRequestStatus, ConsentStatus, NewConsentRequest, PatientPin, Permission, Requester,
    RequesterType, ScopeSet,
};

use super::{ApproveConsentRequestInput, ConsentService, CreateConsentRequestInput};
use crate::expiry::{CONSENT_REQUEST_RESOURCE_TYPE, CONSENT_RESOURCE_TYPE};
use crate::{AuditEvent, ConsentRequestQuery};

impl ConsentService {
    /// Opens a pending consent request on behalf of a provider.
    pub async fn create_request(
        &self,
        actor: &ActorIdentity,
        input: CreateConsentRequestInput,
    ) -> AppResult<ConsentRequest> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRequestCreate)?;

        let requester = Requester::from_actor(actor)?;
        if let Some(claimed) = input.requester_type.as_deref() {
            let claimed = RequesterType::from_str(claimed)?;
            if claimed != requester.requester_type() {
                return Err(AppError::Forbidden(format!(
                    "subject '{}' cannot request consent as '{}'",
                    actor.subject(),
                    claimed.as_str()
                )));
            }
        }

        let requested_duration = input
            .duration_minutes
            .map(AccessDuration::from_minutes)
            .transpose()?
            .unwrap_or_default();

        let now = self.clock.now();
        let request = ConsentRequest::open(
            NewConsentRequest {
                patient_pin: PatientPin::new(input.patient_pin)?,
                requester,
                scope: ScopeSet::from_transport(input.scope.as_slice())?,
                purpose: input.purpose,
                episode_id: input.episode_id,
                requested_duration,
            },
            now,
        )?;

        let event = AuditEvent {
            actor: actor.subject().to_owned(),
            action: AuditAction::ConsentRequestCreated,
            resource_type: CONSENT_REQUEST_RESOURCE_TYPE.to_owned(),
            resource_id: request.id().to_string(),
            patient_pin: request.patient_pin().clone(),
            resulting_state: request.status().as_str().to_owned(),
            detail: Some(format!(
                "{} '{}' requested [{}] for '{}'",
                request.requester().requester_type().as_str(),
                request.requester().requester_name(),
                request.scope().storage_values().join(", "),
                request.purpose()
            )),
            occurred_at: now,
        };
        self.request_repository
            .create_request(&request, &event)
            .await?;

        Ok(request)
    }

    /// Lists requests the actor is party to.
    pub async fn list_requests(
        &self,
        actor: &ActorIdentity,
        status: Option<&str>,
    ) -> AppResult<Vec<ConsentRequest>> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRead)?;

        let status = status.map(ConsentRequestStatus::from_str).transpose()?;
        let query = if actor.role().is_provider() {
            ConsentRequestQuery {
                patient_pin: None,
                requester_id: Some(actor.subject().to_owned()),
                status,
            }
        } else {
            ConsentRequestQuery {
                patient_pin: Some(self.authorization_service.patient_pin_of(actor)?),
                requester_id: None,
                status,
            }
        };

        self.request_repository.list_requests(query).await
    }

    /// Approves a pending request and mints its grant.
    pub async fn approve_request(
        &self,
        actor: &ActorIdentity,
        request_id: ConsentRequestId,
        input: ApproveConsentRequestInput,
    ) -> AppResult<Consent> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRequestDecide)?;

        let mut request = self.load_owned_request(actor, request_id).await?;
        let decision = ApprovalDecision {
            scope: input
                .scope
                .as_deref()
                .map(ScopeSet::from_transport)
                .transpose()?,
            duration: input
                .duration_minutes
                .map(AccessDuration::from_minutes)
                .transpose()?,
        };

        let now = self.clock.now();
        let consent = request.approve(decision, actor.subject(), now)?;
        let events = [
            AuditEvent {
                actor: actor.subject().to_owned(),
                action: AuditAction::ConsentRequestApproved,
                resource_type: CONSENT_REQUEST_RESOURCE_TYPE.to_owned(),
                resource_id: request.id().to_string(),
                patient_pin: request.patient_pin().clone(),
                resulting_state: ConsentRequestStatus::Approved.as_str().to_owned(),
                detail: Some(format!("approved request as consent '{}'", consent.id())),
                occurred_at: now,
            },
            AuditEvent {
                actor: actor.subject().to_owned(),
                action: AuditAction::ConsentGrantGranted,
                resource_type: CONSENT_RESOURCE_TYPE.to_owned(),
                resource_id: consent.id().to_string(),
                patient_pin: consent.patient_pin().clone(),
                resulting_state: ConsentStatus::Active.as_str().to_owned(),
                detail: Some(format!(
                    "granted [{}] to '{}' until '{}'",
                    consent.scope().storage_values().join(", "),
                    consent.requester().requester_id(),
                    consent.expires_at().to_rfc3339()
                )),
                occurred_at: now,
            },
        ];
        self.request_repository
            .save_approval(&request, &consent, &events)
            .await?;

        Ok(consent)
    }

    /// Denies a pending request.
    pub async fn deny_request(
        &self,
        actor: &ActorIdentity,
        request_id: ConsentRequestId,
        reason: Option<String>,
    ) -> AppResult<ConsentRequest> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentRequestDecide)?;

        let mut request = self.load_owned_request(actor, request_id).await?;
        let now = self.clock.now();
        request.deny(actor.subject(), reason, now)?;
        let event = AuditEvent {
            actor: actor.subject().to_owned(),
            action: AuditAction::ConsentRequestDenied,
            resource_type: CONSENT_REQUEST_RESOURCE_TYPE.to_owned(),
            resource_id: request.id().to_string(),
            patient_pin: request.patient_pin().clone(),
            resulting_state: request.status().as_str().to_owned(),
            detail: request
                .resolution_note()
                .map(|note| format!("denied request: {note}"))
                .or(Some("denied request".to_owned())),
            occurred_at: now,
        };
        self.request_repository.save_denial(&request, &event).await?;

        Ok(request)
    }

    async fn load_owned_request(
        &self,
        actor: &ActorIdentity,
        request_id: ConsentRequestId,
    ) -> AppResult<ConsentRequest> {
        let request = self
            .request_repository
            .find_request(request_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("consent request '{request_id}' does not exist"))
            })?;

        self.authorization_service
            .require_own_pin(actor, request.patient_pin())?;

        Ok(request)
    }
}
