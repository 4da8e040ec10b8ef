//! Port fakes shared by service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;

use consentry_core::{ActorIdentity, ActorRole, AppError, AppResult};
use consentry_domain::{
    Consent, ConsentId, ConsentRequest, ConsentRequestId, ConsentRequestStatus, ConsentStatus,
};
use uuid::Uuid;

use crate::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuthorizationService,
    ChallengeConsumption, Clock, ConsentGrantRepository, ConsentQuery, ConsentRequestQuery,
    ConsentRequestRepository, ConsentService, ExpirySweepService, PresenceChallenge,
    PresenceChallengeRepository, PresenceService, SweepLease, SweepLeaseCoordinator,
};

pub(crate) struct FixedClock {
    seconds: AtomicI64,
}

impl FixedClock {
    pub(crate) fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            seconds: AtomicI64::new(instant.timestamp()),
        }
    }

    pub(crate) fn advance(&self, duration: Duration) {
        self.seconds
            .fetch_add(duration.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.seconds.load(Ordering::SeqCst), 0)
            .single()
            .unwrap_or_default()
    }
}

/// Request and grant tables that write audit events in the same unit.
///
/// A failing write leaves both the tables and the audit trail untouched.
pub(crate) struct FakeConsentStore {
    requests: Mutex<HashMap<ConsentRequestId, ConsentRequest>>,
    consents: Mutex<HashMap<ConsentId, Consent>>,
    audit: Arc<FakeAuditRepository>,
    fail_next_write: AtomicBool,
}

impl FakeConsentStore {
    pub(crate) fn new(audit: Arc<FakeAuditRepository>) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            consents: Mutex::new(HashMap::new()),
            audit,
            fail_next_write: AtomicBool::new(false),
        }
    }

    /// Makes the next write fail as if the audit insert were rejected.
    pub(crate) fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn take_write_failure(&self) -> AppResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }
        Ok(())
    }

    pub(crate) async fn consent_count(&self) -> usize {
        self.consents.lock().await.len()
    }

    pub(crate) async fn stored_consent(&self, consent_id: ConsentId) -> Option<Consent> {
        self.consents.lock().await.get(&consent_id).cloned()
    }
}

fn ensure_pending(stored: Option<&ConsentRequest>, request: &ConsentRequest) -> AppResult<()> {
    match stored {
        Some(stored) if stored.status() == ConsentRequestStatus::Pending => Ok(()),
        Some(_) => Err(AppError::Conflict(format!(
            "consent request '{}' is no longer pending",
            request.id()
        ))),
        None => Err(AppError::NotFound(format!(
            "consent request '{}' does not exist",
            request.id()
        ))),
    }
}

#[async_trait]
impl ConsentRequestRepository for FakeConsentStore {
    async fn create_request(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut requests = self.requests.lock().await;
        self.take_write_failure()?;
        requests.insert(request.id(), request.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }

    async fn find_request(
        &self,
        request_id: ConsentRequestId,
    ) -> AppResult<Option<ConsentRequest>> {
        Ok(self.requests.lock().await.get(&request_id).cloned())
    }

    async fn list_requests(&self, query: ConsentRequestQuery) -> AppResult<Vec<ConsentRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|request| {
                query
                    .patient_pin
                    .as_ref()
                    .is_none_or(|pin| request.patient_pin() == pin)
                    && query
                        .requester_id
                        .as_deref()
                        .is_none_or(|id| request.requester().requester_id() == id)
                    && query.status.is_none_or(|status| request.status() == status)
            })
            .cloned()
            .collect())
    }

    async fn save_approval(
        &self,
        request: &ConsentRequest,
        consent: &Consent,
        events: &[AuditEvent],
    ) -> AppResult<()> {
        let mut requests = self.requests.lock().await;
        ensure_pending(requests.get(&request.id()), request)?;
        self.take_write_failure()?;
        requests.insert(request.id(), request.clone());
        self.consents
            .lock()
            .await
            .insert(consent.id(), consent.clone());
        self.audit.record(events).await;
        Ok(())
    }

    async fn save_denial(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut requests = self.requests.lock().await;
        ensure_pending(requests.get(&request.id()), request)?;
        self.take_write_failure()?;
        requests.insert(request.id(), request.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }
}

#[async_trait]
impl ConsentGrantRepository for FakeConsentStore {
    async fn find_consent(&self, consent_id: ConsentId) -> AppResult<Option<Consent>> {
        Ok(self.consents.lock().await.get(&consent_id).cloned())
    }

    async fn list_consents(&self, query: ConsentQuery) -> AppResult<Vec<Consent>> {
        Ok(self
            .consents
            .lock()
            .await
            .values()
            .filter(|consent| {
                query
                    .patient_pin
                    .as_ref()
                    .is_none_or(|pin| consent.patient_pin() == pin)
                    && query
                        .requester_id
                        .as_deref()
                        .is_none_or(|id| consent.requester().requester_id() == id)
                    && query.status.is_none_or(|status| consent.status() == status)
                    && query
                        .expires_before
                        .is_none_or(|instant| consent.expires_at() <= instant)
            })
            .cloned()
            .collect())
    }

    async fn transition_consent(
        &self,
        consent: &Consent,
        expected: ConsentStatus,
        event: &AuditEvent,
    ) -> AppResult<bool> {
        let mut consents = self.consents.lock().await;
        match consents.get(&consent.id()) {
            Some(stored) if stored.status() == expected => {
                self.take_write_failure()?;
                consents.insert(consent.id(), consent.clone());
                self.audit.record(std::slice::from_ref(event)).await;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Consent>> {
        let mut due: Vec<Consent> = self
            .consents
            .lock()
            .await
            .values()
            .filter(|consent| consent.is_due_for_expiry(now))
            .cloned()
            .collect();
        due.sort_by_key(Consent::expires_at);
        due.truncate(limit);
        Ok(due)
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

impl FakeAuditRepository {
    pub(crate) async fn record(&self, events: &[AuditEvent]) {
        self.events.lock().await.extend_from_slice(events);
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, event)| event.patient_pin == query.patient_pin)
            .filter(|(_, event)| query.action.is_none_or(|action| event.action == action))
            .skip(query.offset)
            .take(query.limit)
            .map(|(index, event)| AuditLogEntry {
                event_id: index.to_string(),
                actor: event.actor.clone(),
                action: event.action.as_str().to_owned(),
                resource_type: event.resource_type.clone(),
                resource_id: event.resource_id.clone(),
                patient_pin: event.patient_pin.to_string(),
                resulting_state: event.resulting_state.clone(),
                detail: event.detail.clone(),
                created_at: event.occurred_at.to_rfc3339(),
            })
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeLeaseCoordinator {
    pub(crate) held_by: Mutex<Option<String>>,
    pub(crate) releases: Mutex<usize>,
}

#[async_trait]
impl SweepLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        let mut held_by = self.held_by.lock().await;
        if held_by.is_some() {
            return Ok(None);
        }

        *held_by = Some(holder_id.to_owned());
        Ok(Some(SweepLease {
            scope_key: scope_key.to_owned(),
            token: "token-1".to_owned(),
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let mut held_by = self.held_by.lock().await;
        if held_by.as_deref() == Some(lease.holder_id.as_str()) {
            *held_by = None;
        }
        *self.releases.lock().await += 1;
        Ok(())
    }
}

pub(crate) struct FakePresenceRepository {
    challenges: Mutex<Vec<PresenceChallenge>>,
    audit: Arc<FakeAuditRepository>,
    stale_read: Mutex<Option<PresenceChallenge>>,
}

impl FakePresenceRepository {
    pub(crate) fn new(audit: Arc<FakeAuditRepository>) -> Self {
        Self {
            challenges: Mutex::new(Vec::new()),
            audit,
            stale_read: Mutex::new(None),
        }
    }

    /// Pins reads to the newest challenge as it is now, ignoring later writes.
    pub(crate) async fn serve_stale_reads(&self) {
        let newest = self.challenges.lock().await.last().cloned();
        *self.stale_read.lock().await = newest;
    }
}

#[async_trait]
impl PresenceChallengeRepository for FakePresenceRepository {
    async fn create_challenge(
        &self,
        challenge: &PresenceChallenge,
        event: &AuditEvent,
    ) -> AppResult<()> {
        self.challenges.lock().await.push(challenge.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }

    async fn find_open_challenge(
        &self,
        consent_id: ConsentId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PresenceChallenge>> {
        if let Some(stale) = self.stale_read.lock().await.clone() {
            return Ok(Some(stale));
        }

        Ok(self
            .challenges
            .lock()
            .await
            .iter()
            .rev()
            .find(|challenge| {
                challenge.consent_id == consent_id
                    && challenge.consumed_at.is_none()
                    && challenge.expires_at > now
            })
            .cloned())
    }

    async fn record_failed_attempt(&self, challenge_id: Uuid) -> AppResult<u32> {
        let mut challenges = self.challenges.lock().await;
        let challenge = challenges
            .iter_mut()
            .find(|challenge| challenge.challenge_id == challenge_id)
            .ok_or_else(|| AppError::NotFound("challenge not found".to_owned()))?;
        challenge.failed_attempts += 1;
        Ok(challenge.failed_attempts)
    }

    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: u32,
        event: &AuditEvent,
    ) -> AppResult<ChallengeConsumption> {
        let mut challenges = self.challenges.lock().await;
        let Some(challenge) = challenges
            .iter_mut()
            .find(|challenge| challenge.challenge_id == challenge_id)
        else {
            return Ok(ChallengeConsumption::AlreadyConsumed);
        };

        if challenge.consumed_at.is_some() {
            return Ok(ChallengeConsumption::AlreadyConsumed);
        }
        if challenge.failed_attempts >= max_failed_attempts {
            return Ok(ChallengeConsumption::Locked);
        }

        challenge.consumed_at = Some(now);
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(ChallengeConsumption::Consumed)
    }
}

pub(crate) fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 24, 10, 30, 0)
        .single()
        .unwrap_or_default()
}

pub(crate) fn patient(pin: &str) -> ActorIdentity {
    ActorIdentity::patient(format!("patient-{pin}"), "Robert Johnson", pin)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn doctor(subject: &str) -> ActorIdentity {
    ActorIdentity::provider(subject, "Dr. Michael Chen", ActorRole::Doctor)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn lab(subject: &str) -> ActorIdentity {
    ActorIdentity::provider(subject, "MedLab Services", ActorRole::Lab)
        .unwrap_or_else(|_| unreachable!())
}

/// Wires every service against one shared set of fakes.
pub(crate) struct Harness {
    pub(crate) store: Arc<FakeConsentStore>,
    pub(crate) audit: Arc<FakeAuditRepository>,
    pub(crate) challenges: Arc<FakePresenceRepository>,
    pub(crate) lease: Arc<FakeLeaseCoordinator>,
    pub(crate) clock: Arc<FixedClock>,
    pub(crate) consents: ConsentService,
    pub(crate) sweeper: ExpirySweepService,
    pub(crate) presence: PresenceService,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let audit = Arc::new(FakeAuditRepository::default());
        let store = Arc::new(FakeConsentStore::new(audit.clone()));
        let challenges = Arc::new(FakePresenceRepository::new(audit.clone()));
        let lease = Arc::new(FakeLeaseCoordinator::default());
        let clock = Arc::new(FixedClock::starting_at(start_instant()));
        let authorization_service = AuthorizationService::new();

        let consents = ConsentService::new(
            authorization_service,
            store.clone(),
            store.clone(),
            audit.clone(),
            clock.clone(),
        );
        let sweeper = ExpirySweepService::new(store.clone(), lease.clone(), clock.clone());
        let presence = PresenceService::new(
            authorization_service,
            store.clone(),
            challenges.clone(),
            clock.clone(),
        );

        Self {
            store,
            audit,
            challenges,
            lease,
            clock,
            consents,
            sweeper,
            presence,
        }
    }

    pub(crate) async fn audit_actions(&self) -> Vec<(String, String)> {
        self.audit
            .events
            .lock()
            .await
            .iter()
            .map(|event| {
                (
                    event.action.as_str().to_owned(),
                    event.resulting_state.clone(),
                )
            })
            .collect()
    }
}
