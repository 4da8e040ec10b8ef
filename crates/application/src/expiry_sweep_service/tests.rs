use chrono::Duration;
use consentry_core::AppError;
use consentry_domain::{Consent, ConsentStatus};

use super::{EXPIRY_SWEEPER_SUBJECT, SweepReport};
use crate::test_fakes::{Harness, doctor, patient};
use crate::{ApproveConsentRequestInput, CreateConsentRequestInput};

async fn grant(harness: &Harness, duration_minutes: u32) -> Consent {
    let request = harness
        .consents
        .create_request(
            &doctor("D001"),
            CreateConsentRequestInput {
                patient_pin: "UHB1234".to_owned(),
                scope: vec!["allLabs".to_owned()],
                purpose: "Routine blood work".to_owned(),
                episode_id: None,
                duration_minutes: Some(duration_minutes),
                requester_type: None,
            },
        )
        .await
        .unwrap_or_else(|error| panic!("create_request failed: {error}"));

    harness
        .consents
        .approve_request(
            &patient("UHB1234"),
            request.id(),
            ApproveConsentRequestInput::default(),
        )
        .await
        .unwrap_or_else(|error| panic!("approve failed: {error}"))
}

#[tokio::test]
async fn sweep_expires_only_due_grants() {
    let harness = Harness::new();
    let short = grant(&harness, 15).await;
    let long = grant(&harness, 360).await;

    harness.clock.advance(Duration::minutes(30));
    let report = harness.sweeper.sweep_once("worker-1", 100, 30).await;

    assert_eq!(
        report.ok().flatten(),
        Some(SweepReport {
            examined: 1,
            expired: 1,
            skipped: 0,
        })
    );
    assert_eq!(
        harness
            .store
            .stored_consent(short.id())
            .await
            .map(|consent| consent.status()),
        Some(ConsentStatus::Expired)
    );
    assert_eq!(
        harness
            .store
            .stored_consent(long.id())
            .await
            .map(|consent| consent.status()),
        Some(ConsentStatus::Active)
    );
}

#[tokio::test]
async fn sweeping_twice_expires_and_audits_once() {
    let harness = Harness::new();
    grant(&harness, 15).await;
    harness.clock.advance(Duration::minutes(15));

    let first = harness.sweeper.expire_due(100).await;
    let second = harness.sweeper.expire_due(100).await;

    assert_eq!(first.map(|report| report.expired).ok(), Some(1));
    assert_eq!(second.map(|report| report.examined).ok(), Some(0));

    let events = harness.audit.events.lock().await;
    let expired: Vec<_> = events
        .iter()
        .filter(|event| event.action.as_str() == "consent.grant.expired")
        .collect();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].actor, EXPIRY_SWEEPER_SUBJECT);
    assert_eq!(expired[0].resulting_state, "expired");
}

#[tokio::test]
async fn failed_audit_write_leaves_grant_for_the_next_sweep() {
    let harness = Harness::new();
    let consent = grant(&harness, 15).await;
    harness.clock.advance(Duration::minutes(20));

    harness.store.fail_next_write();
    let failed = harness.sweeper.expire_due(100).await;
    assert!(matches!(failed, Err(AppError::Internal(_))));
    assert_eq!(
        harness
            .store
            .stored_consent(consent.id())
            .await
            .map(|consent| consent.status()),
        Some(ConsentStatus::Active)
    );

    let retried = harness.sweeper.expire_due(100).await;
    assert_eq!(retried.map(|report| report.expired).ok(), Some(1));
    assert_eq!(
        harness
            .store
            .stored_consent(consent.id())
            .await
            .map(|consent| consent.status()),
        Some(ConsentStatus::Expired)
    );

    let expired = harness
        .audit
        .events
        .lock()
        .await
        .iter()
        .filter(|event| event.action.as_str() == "consent.grant.expired")
        .count();
    assert_eq!(expired, 1);
}

#[tokio::test]
async fn revoked_grants_are_not_expired() {
    let harness = Harness::new();
    let consent = grant(&harness, 15).await;
    harness
        .consents
        .revoke_consent(&patient("UHB1234"), consent.id(), None)
        .await
        .unwrap_or_else(|error| panic!("revoke failed: {error}"));

    harness.clock.advance(Duration::hours(1));
    let report = harness.sweeper.expire_due(100).await;

    assert_eq!(report.ok(), Some(SweepReport::default()));
}

#[tokio::test]
async fn batch_size_bounds_one_sweep() {
    let harness = Harness::new();
    for _ in 0..3 {
        grant(&harness, 15).await;
    }
    harness.clock.advance(Duration::minutes(20));

    let first = harness.sweeper.expire_due(2).await;
    let second = harness.sweeper.expire_due(2).await;

    assert_eq!(first.map(|report| report.expired).ok(), Some(2));
    assert_eq!(second.map(|report| report.expired).ok(), Some(1));
}

#[tokio::test]
async fn held_lease_skips_sweep() {
    let harness = Harness::new();
    *harness.lease.held_by.lock().await = Some("worker-2".to_owned());

    let report = harness.sweeper.sweep_once("worker-1", 100, 30).await;

    assert_eq!(report.ok(), Some(None));
    assert_eq!(*harness.lease.releases.lock().await, 0);
}

#[tokio::test]
async fn lease_is_released_after_sweep() {
    let harness = Harness::new();

    let report = harness.sweeper.sweep_once("worker-1", 100, 30).await;

    assert!(matches!(report, Ok(Some(_))));
    assert!(harness.lease.held_by.lock().await.is_none());
    assert_eq!(*harness.lease.releases.lock().await, 1);
}

#[tokio::test]
async fn zero_batch_is_rejected() {
    let harness = Harness::new();
    assert!(matches!(
        harness.sweeper.expire_due(0).await,
        Err(AppError::Validation(_))
    ));
}
