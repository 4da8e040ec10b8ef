use consentry_application::{
    ApproveConsentRequestInput, ConsentService, CreateConsentRequestInput,
};
use consentry_core::{ActorIdentity, ActorRole, AppResult};
use consentry_domain::ConsentRequestStatus;
use tracing::info;

const DEV_SEED_PATIENT_SUBJECT: &str = "patient-1";
const DEV_SEED_PATIENT_NAME: &str = "Sarah Johnson";
const DEV_SEED_PATIENT_PIN: &str = "UHB1234";

struct SeedProvider {
    subject: &'static str,
    name: &'static str,
    role: ActorRole,
}

struct SeedRequest {
    provider: SeedProvider,
    scope: &'static [&'static str],
    purpose: &'static str,
    episode_id: Option<&'static str>,
    duration_minutes: u32,
    approve: bool,
}

const DEV_SEED_REQUESTS: &[SeedRequest] = &[
    SeedRequest {
        provider: SeedProvider {
            subject: "D001",
            name: "Dr. Michael Chen",
            role: ActorRole::Doctor,
        },
        scope: &["currentEpisode", "allLabs"],
        purpose: "Follow-up consultation for hypertension management and review of recent lab results",
        episode_id: Some("EP-2024-001"),
        duration_minutes: 120,
        approve: false,
    },
    SeedRequest {
        provider: SeedProvider {
            subject: "L001",
            name: "MedLab Services",
            role: ActorRole::Lab,
        },
        scope: &["currentEpisode"],
        purpose: "Upload and share new blood test results for ongoing treatment",
        episode_id: Some("EP-2024-001"),
        duration_minutes: 60,
        approve: false,
    },
    SeedRequest {
        provider: SeedProvider {
            subject: "D002",
            name: "Dr. Sarah Ahmed",
            role: ActorRole::Doctor,
        },
        scope: &["last12Months", "notesOnly"],
        purpose: "Cardiology referral review",
        episode_id: None,
        duration_minutes: 1_440,
        approve: true,
    },
    SeedRequest {
        provider: SeedProvider {
            subject: "L002",
            name: "DiagnosticCare Plus",
            role: ActorRole::Lab,
        },
        scope: &["allLabs"],
        purpose: "Comparison with prior lab panels",
        episode_id: None,
        duration_minutes: 240,
        approve: true,
    },
];

/// Seeds the demo patient's pending requests and active grants.
///
/// Skips seeding once the demo patient already has requests on file.
pub async fn run(consent_service: &ConsentService) -> AppResult<()> {
    let patient = ActorIdentity::patient(
        DEV_SEED_PATIENT_SUBJECT,
        DEV_SEED_PATIENT_NAME,
        DEV_SEED_PATIENT_PIN,
    )?;

    if !consent_service.list_requests(&patient, None).await?.is_empty() {
        info!(patient_pin = DEV_SEED_PATIENT_PIN, "demo consent data already present");
        return Ok(());
    }

    for seed in DEV_SEED_REQUESTS {
        let provider = ActorIdentity::provider(
            seed.provider.subject,
            seed.provider.name,
            seed.provider.role,
        )?;

        let request = consent_service
            .create_request(
                &provider,
                CreateConsentRequestInput {
                    patient_pin: DEV_SEED_PATIENT_PIN.to_owned(),
                    scope: seed.scope.iter().map(|scope| (*scope).to_owned()).collect(),
                    purpose: seed.purpose.to_owned(),
                    episode_id: seed.episode_id.map(ToOwned::to_owned),
                    duration_minutes: Some(seed.duration_minutes),
                    requester_type: None,
                },
            )
            .await?;

        if seed.approve && request.status() == ConsentRequestStatus::Pending {
            consent_service
                .approve_request(&patient, request.id(), ApproveConsentRequestInput::default())
                .await?;
        }
    }

    info!(
        patient_pin = DEV_SEED_PATIENT_PIN,
        requests = DEV_SEED_REQUESTS.len(),
        "seeded demo consent data"
    );
    Ok(())
}
