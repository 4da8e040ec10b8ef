use chrono::Duration;
use consentry_core::AppError;
use consentry_domain::Consent;

use crate::test_fakes::{Harness, doctor, lab, patient, start_instant};
use crate::{ApproveConsentRequestInput, CreateConsentRequestInput, PresenceChallengeRepository};

const PIN: &str = "UHB1234";

async fn grant(harness: &Harness, duration_minutes: u32) -> Consent {
    let request = harness
        .consents
        .create_request(
            &doctor("D001"),
            CreateConsentRequestInput {
                patient_pin: PIN.to_owned(),
                scope: vec!["currentEpisode".to_owned()],
                purpose: "Surgery follow-up".to_owned(),
                episode_id: Some("EP-3".to_owned()),
                duration_minutes: Some(duration_minutes),
                requester_type: Some("doctor".to_owned()),
            },
        )
        .await
        .unwrap_or_else(|error| panic!("create_request failed: {error}"));

    harness
        .consents
        .approve_request(&patient(PIN), request.id(), ApproveConsentRequestInput::default())
        .await
        .unwrap_or_else(|error| panic!("approve failed: {error}"))
}

fn wrong_code(code: &str) -> String {
    if code == "000000" {
        "000001".to_owned()
    } else {
        "000000".to_owned()
    }
}

#[tokio::test]
async fn correct_code_starts_session() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;

    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));
    assert_eq!(issued.code.len(), 6);
    assert_eq!(issued.expires_at, start_instant() + Duration::minutes(5));

    harness.clock.advance(Duration::minutes(2));
    let session = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;

    assert!(session.is_ok());
    let session = session.unwrap_or_else(|_| unreachable!());
    assert_eq!(session.consent_id, consent.id());
    assert_eq!(session.expires_at, start_instant() + Duration::minutes(60));

    let replay = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;
    assert!(matches!(replay, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn session_never_outlives_grant() {
    let harness = Harness::new();
    let consent = grant(&harness, 30).await;

    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));
    let session = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;

    assert_eq!(
        session.map(|session| session.expires_at).ok(),
        Some(consent.expires_at())
    );
}

#[tokio::test]
async fn wrong_code_is_unauthorized_then_locks() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));
    let wrong = wrong_code(&issued.code);

    for _ in 0..4 {
        let result = harness
            .presence
            .verify_challenge(&doctor("D001"), consent.id(), &wrong)
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    let fifth = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &wrong)
        .await;
    assert!(matches!(fifth, Err(AppError::Forbidden(_))));

    let correct_after_lock = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;
    assert!(matches!(correct_after_lock, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn correct_code_read_before_lockout_is_still_refused() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));

    // Reads keep returning the zero-failure snapshot while failures land.
    harness.challenges.serve_stale_reads().await;
    for _ in 0..5 {
        harness
            .challenges
            .record_failed_attempt(issued.challenge_id)
            .await
            .unwrap_or_else(|error| panic!("record failure failed: {error}"));
    }

    let result = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(
        !harness
            .audit_actions()
            .await
            .iter()
            .any(|(action, _)| action == "consent.presence.verified")
    );
}

#[tokio::test]
async fn expired_code_is_not_found() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));

    harness.clock.advance(Duration::minutes(5));
    let result = harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn only_the_requester_verifies() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));

    let result = harness
        .presence
        .verify_challenge(&lab("L001"), consent.id(), &issued.code)
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn inactive_grant_conflicts() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    harness
        .consents
        .revoke_consent(&patient(PIN), consent.id(), None)
        .await
        .unwrap_or_else(|error| panic!("revoke failed: {error}"));

    let result = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn presence_steps_are_audited() {
    let harness = Harness::new();
    let consent = grant(&harness, 360).await;
    let issued = harness
        .presence
        .issue_challenge(&patient(PIN), consent.id())
        .await
        .unwrap_or_else(|error| panic!("issue failed: {error}"));
    harness
        .presence
        .verify_challenge(&doctor("D001"), consent.id(), &issued.code)
        .await
        .unwrap_or_else(|error| panic!("verify failed: {error}"));

    let actions: Vec<String> = harness
        .audit_actions()
        .await
        .into_iter()
        .map(|(action, _)| action)
        .collect();
    assert!(actions.ends_with(&[
        "consent.presence.challenge_issued".to_owned(),
        "consent.presence.verified".to_owned(),
    ]));
}
