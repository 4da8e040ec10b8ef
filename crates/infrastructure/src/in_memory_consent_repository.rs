use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_application::{
    AuditEvent, ConsentGrantRepository, ConsentQuery, ConsentRequestQuery,
    ConsentRequestRepository,
};
use consentry_core::{AppError, AppResult};
use consentry_domain::{
    Consent, ConsentId, ConsentRequest, ConsentRequestId, ConsentRequestStatus, ConsentStatus,
};
use tokio::sync::RwLock;

use crate::InMemoryAuditRepository;

#[derive(Debug, Default)]
struct ConsentTables {
    requests: HashMap<ConsentRequestId, ConsentRequest>,
    consents: HashMap<ConsentId, Consent>,
}

/// In-memory consent request and grant store.
///
/// Both tables sit behind one lock so an approval and its grant land together.
/// Audit events are recorded before that lock is released.
#[derive(Debug)]
pub struct InMemoryConsentRepository {
    tables: RwLock<ConsentTables>,
    audit: Arc<InMemoryAuditRepository>,
}

impl InMemoryConsentRepository {
    /// Creates an empty repository writing events into `audit`.
    #[must_use]
    pub fn new(audit: Arc<InMemoryAuditRepository>) -> Self {
        Self {
            tables: RwLock::new(ConsentTables::default()),
            audit,
        }
    }

    fn ensure_pending(tables: &ConsentTables, request: &ConsentRequest) -> AppResult<()> {
        match tables.requests.get(&request.id()) {
            Some(stored) if stored.status() == ConsentRequestStatus::Pending => Ok(()),
            Some(stored) => Err(AppError::Conflict(format!(
                "consent request '{}' is already {}",
                request.id(),
                stored.status().as_str()
            ))),
            None => Err(AppError::NotFound(format!(
                "consent request '{}' does not exist",
                request.id()
            ))),
        }
    }
}

#[async_trait]
impl ConsentRequestRepository for InMemoryConsentRepository {
    async fn create_request(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.requests.contains_key(&request.id()) {
            return Err(AppError::Conflict(format!(
                "consent request '{}' already exists",
                request.id()
            )));
        }

        tables.requests.insert(request.id(), request.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }

    async fn find_request(
        &self,
        request_id: ConsentRequestId,
    ) -> AppResult<Option<ConsentRequest>> {
        Ok(self.tables.read().await.requests.get(&request_id).cloned())
    }

    async fn list_requests(&self, query: ConsentRequestQuery) -> AppResult<Vec<ConsentRequest>> {
        let tables = self.tables.read().await;
        let mut values: Vec<ConsentRequest> = tables
            .requests
            .values()
            .filter(|request| {
                query
                    .patient_pin
                    .as_ref()
                    .is_none_or(|pin| request.patient_pin() == pin)
                    && query
                        .requester_id
                        .as_deref()
                        .is_none_or(|requester_id| {
                            request.requester().requester_id() == requester_id
                        })
                    && query.status.is_none_or(|status| request.status() == status)
            })
            .cloned()
            .collect();
        values.sort_by_key(|request| std::cmp::Reverse(request.created_at()));

        Ok(values)
    }

    async fn save_approval(
        &self,
        request: &ConsentRequest,
        consent: &Consent,
        events: &[AuditEvent],
    ) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        Self::ensure_pending(&tables, request)?;
        if tables.consents.contains_key(&consent.id()) {
            return Err(AppError::Conflict(format!(
                "consent '{}' already exists",
                consent.id()
            )));
        }

        tables.requests.insert(request.id(), request.clone());
        tables.consents.insert(consent.id(), consent.clone());
        self.audit.record(events).await;
        Ok(())
    }

    async fn save_denial(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        Self::ensure_pending(&tables, request)?;
        tables.requests.insert(request.id(), request.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }
}

#[async_trait]
impl ConsentGrantRepository for InMemoryConsentRepository {
    async fn find_consent(&self, consent_id: ConsentId) -> AppResult<Option<Consent>> {
        Ok(self.tables.read().await.consents.get(&consent_id).cloned())
    }

    async fn list_consents(&self, query: ConsentQuery) -> AppResult<Vec<Consent>> {
        let tables = self.tables.read().await;
        let mut values: Vec<Consent> = tables
            .consents
            .values()
            .filter(|consent| {
                query
                    .patient_pin
                    .as_ref()
                    .is_none_or(|pin| consent.patient_pin() == pin)
                    && query
                        .requester_id
                        .as_deref()
                        .is_none_or(|requester_id| {
                            consent.requester().requester_id() == requester_id
                        })
                    && query.status.is_none_or(|status| consent.status() == status)
                    && query
                        .expires_before
                        .is_none_or(|instant| consent.expires_at() <= instant)
            })
            .cloned()
            .collect();
        values.sort_by_key(|consent| std::cmp::Reverse(consent.created_at()));

        Ok(values)
    }

    async fn transition_consent(
        &self,
        consent: &Consent,
        expected: ConsentStatus,
        event: &AuditEvent,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.consents.get_mut(&consent.id()) else {
            return Err(AppError::NotFound(format!(
                "consent '{}' does not exist",
                consent.id()
            )));
        };

        if stored.status() != expected {
            return Ok(false);
        }

        *stored = consent.clone();
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(true)
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Consent>> {
        let tables = self.tables.read().await;
        let mut due: Vec<Consent> = tables
            .consents
            .values()
            .filter(|consent| consent.is_due_for_expiry(now))
            .cloned()
            .collect();
        due.sort_by_key(Consent::expires_at);
        due.truncate(limit);

        Ok(due)
    }
}

#[cfg(test)]
mod tests;
