//! Consent request registry, grant store and access checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use consentry_core::{ActorIdentity, AppResult};
use consentry_domain::Consent;

use crate::expiry::{ExpiryOutcome, settle_expiry};
use crate::{
    AuditLogRepository, AuthorizationService, Clock, ConsentGrantRepository,
    ConsentRequestRepository,
};

mod access;
mod audit_log;
mod grants;
mod inputs;
mod requests;

pub use inputs::{
    AccessCheckInput, ApproveConsentRequestInput, AuditLogListInput, ConsentListFilter,
    CreateConsentRequestInput,
};

/// Application service for the consent lifecycle.
#[derive(Clone)]
pub struct ConsentService {
    authorization_service: AuthorizationService,
    request_repository: Arc<dyn ConsentRequestRepository>,
    grant_repository: Arc<dyn ConsentGrantRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
}

impl ConsentService {
    /// Creates a consent service from port implementations.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        request_repository: Arc<dyn ConsentRequestRepository>,
        grant_repository: Arc<dyn ConsentGrantRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorization_service,
            request_repository,
            grant_repository,
            audit_log_repository,
            clock,
        }
    }

    /// Records expiry for a grant read past its `expires_at`.
    async fn settle(
        &self,
        actor: &ActorIdentity,
        consent: Consent,
        now: DateTime<Utc>,
    ) -> AppResult<ExpiryOutcome> {
        settle_expiry(
            self.grant_repository.as_ref(),
            consent,
            actor.subject(),
            now,
        )
        .await
    }

    async fn settle_all(
        &self,
        actor: &ActorIdentity,
        consents: Vec<Consent>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Consent>> {
        let mut settled = Vec::with_capacity(consents.len());
        for consent in consents {
            settled.push(self.settle(actor, consent, now).await?.into_consent());
        }

        Ok(settled)
    }
}
