use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use consentry_application::{
    AuditEvent, AuditLogQuery, AuditLogRepository, ConsentGrantRepository, ConsentQuery,
    ConsentRequestQuery, ConsentRequestRepository,
};
use consentry_core::AppError;
use consentry_domain::{
    AccessDuration, ApprovalDecision, AuditAction, Consent, ConsentRequest, ConsentRequestStatus,
    ConsentScope, ConsentStatus, NewConsentRequest, PatientPin, Requester, RequesterType,
    ScopeSet,
};

use super::InMemoryConsentRepository;
use crate::InMemoryAuditRepository;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 24, 10, 30, 0)
        .single()
        .unwrap_or_default()
}

fn open_request(pin: &str, requester_id: &str) -> ConsentRequest {
    ConsentRequest::open(
        NewConsentRequest {
            patient_pin: PatientPin::new(pin).unwrap_or_else(|_| unreachable!()),
            requester: Requester::new(requester_id, "Dr. Sarah Johnson", RequesterType::Doctor)
                .unwrap_or_else(|_| unreachable!()),
            scope: ScopeSet::new([ConsentScope::AllLabs]).unwrap_or_else(|_| unreachable!()),
            purpose: "Cardiology review".to_owned(),
            episode_id: None,
            requested_duration: AccessDuration::default(),
        },
        now(),
    )
    .unwrap_or_else(|_| unreachable!())
}

fn event(pin: &str, action: AuditAction) -> AuditEvent {
    AuditEvent {
        actor: "patient-1".to_owned(),
        action,
        resource_type: "consent".to_owned(),
        resource_id: "r-1".to_owned(),
        patient_pin: PatientPin::new(pin).unwrap_or_else(|_| unreachable!()),
        resulting_state: "pending".to_owned(),
        detail: None,
        occurred_at: now(),
    }
}

fn created(pin: &str) -> AuditEvent {
    event(pin, AuditAction::ConsentRequestCreated)
}

fn approval_events(pin: &str) -> [AuditEvent; 2] {
    [
        event(pin, AuditAction::ConsentRequestApproved),
        event(pin, AuditAction::ConsentGrantGranted),
    ]
}

fn store() -> (InMemoryConsentRepository, Arc<InMemoryAuditRepository>) {
    let audit = Arc::new(InMemoryAuditRepository::new());
    (InMemoryConsentRepository::new(audit.clone()), audit)
}

async fn audit_actions(audit: &InMemoryAuditRepository, pin: &str) -> Vec<String> {
    audit
        .list_recent_entries(AuditLogQuery {
            patient_pin: PatientPin::new(pin).unwrap_or_else(|_| unreachable!()),
            limit: 200,
            offset: 0,
            action: None,
        })
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}

fn approve(request: &mut ConsentRequest) -> Consent {
    request
        .approve(
            ApprovalDecision {
                scope: None,
                duration: None,
            },
            "patient-1",
            now(),
        )
        .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn approval_stores_request_and_grant_together() {
    let (repository, audit) = store();
    let mut request = open_request("UHB1234", "D001");
    assert!(repository
        .create_request(&request, &created("UHB1234"))
        .await
        .is_ok());

    let consent = approve(&mut request);
    assert!(repository
        .save_approval(&request, &consent, &approval_events("UHB1234"))
        .await
        .is_ok());

    let stored = repository.find_request(request.id()).await;
    assert_eq!(
        stored.ok().flatten().map(|request| request.status()),
        Some(ConsentRequestStatus::Approved)
    );
    assert!(matches!(
        repository.find_consent(consent.id()).await,
        Ok(Some(_))
    ));
    assert_eq!(
        audit_actions(&audit, "UHB1234").await,
        vec![
            "consent.grant.granted",
            "consent.request.approved",
            "consent.request.created",
        ]
    );
}

#[tokio::test]
async fn stale_approval_conflicts() {
    let (repository, audit) = store();
    let mut request = open_request("UHB1234", "D001");
    assert!(repository
        .create_request(&request, &created("UHB1234"))
        .await
        .is_ok());

    let mut stale_copy = request.clone();
    let first = approve(&mut request);
    let second = approve(&mut stale_copy);

    assert!(repository
        .save_approval(&request, &first, &approval_events("UHB1234"))
        .await
        .is_ok());
    assert!(matches!(
        repository
            .save_approval(&stale_copy, &second, &approval_events("UHB1234"))
            .await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(
        repository
            .list_consents(ConsentQuery::default())
            .await
            .map(|consents| consents.len())
            .ok(),
        Some(1)
    );
    assert_eq!(audit_actions(&audit, "UHB1234").await.len(), 3);
}

#[tokio::test]
async fn transition_is_compare_and_swap() {
    let (repository, audit) = store();
    let mut request = open_request("UHB1234", "D001");
    assert!(repository
        .create_request(&request, &created("UHB1234"))
        .await
        .is_ok());
    let consent = approve(&mut request);
    assert!(repository
        .save_approval(&request, &consent, &approval_events("UHB1234"))
        .await
        .is_ok());

    let mut revoked = consent.clone();
    assert!(revoked.revoke("patient-1", None, now()).is_ok());
    let mut expired = consent.clone();
    assert!(expired.expire(now() + Duration::hours(3)));

    assert_eq!(
        repository
            .transition_consent(
                &revoked,
                ConsentStatus::Active,
                &event("UHB1234", AuditAction::ConsentGrantRevoked),
            )
            .await
            .ok(),
        Some(true)
    );
    assert_eq!(
        repository
            .transition_consent(
                &expired,
                ConsentStatus::Active,
                &event("UHB1234", AuditAction::ConsentGrantExpired),
            )
            .await
            .ok(),
        Some(false)
    );

    let actions = audit_actions(&audit, "UHB1234").await;
    assert!(actions.contains(&"consent.grant.revoked".to_owned()));
    assert!(!actions.contains(&"consent.grant.expired".to_owned()));
}

#[tokio::test]
async fn filters_and_due_listing() {
    let (repository, _audit) = store();
    for (pin, requester_id) in [("UHB1234", "D001"), ("UHB5678", "D002")] {
        let mut request = open_request(pin, requester_id);
        assert!(repository
        .create_request(&request, &created("UHB1234"))
        .await
        .is_ok());
        let consent = approve(&mut request);
        assert!(repository
        .save_approval(&request, &consent, &approval_events("UHB1234"))
        .await
        .is_ok());
    }

    let for_doctor = repository
        .list_requests(ConsentRequestQuery {
            requester_id: Some("D002".to_owned()),
            ..ConsentRequestQuery::default()
        })
        .await
        .unwrap_or_default();
    assert_eq!(for_doctor.len(), 1);

    let due_now = repository
        .list_due_for_expiry(now(), 10)
        .await
        .unwrap_or_default();
    let due_later = repository
        .list_due_for_expiry(now() + Duration::hours(2), 1)
        .await
        .unwrap_or_default();
    assert!(due_now.is_empty());
    assert_eq!(due_later.len(), 1);
}
