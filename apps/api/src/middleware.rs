use std::str::FromStr;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use consentry_core::{ActorIdentity, ActorRole, AppError, AppResult};

use crate::error::ApiResult;
use crate::state::AppState;

pub const SUBJECT_HEADER: &str = "x-consentry-subject";
pub const ROLE_HEADER: &str = "x-consentry-role";
pub const DISPLAY_NAME_HEADER: &str = "x-consentry-display-name";
pub const PATIENT_PIN_HEADER: &str = "x-consentry-patient-pin";
pub const WORKER_ID_HEADER: &str = "x-consentry-worker-id";

/// Authenticated worker calling internal routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    worker_id: String,
}

impl WorkerIdentity {
    pub fn worker_id(&self) -> &str {
        self.worker_id.as_str()
    }
}

/// Trusts the gateway's bearer secret and lifts the forwarded identity into
/// request extensions.
pub async fn require_gateway_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    require_bearer(request.headers(), state.gateway_shared_secret.as_str())?;
    let identity = identity_from_headers(request.headers())?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub async fn require_worker_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    require_bearer(request.headers(), state.worker_shared_secret.as_str())?;

    let worker_id = header_value(request.headers(), WORKER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{WORKER_ID_HEADER} header is required")))?
        .to_owned();

    request.extensions_mut().insert(WorkerIdentity { worker_id });
    Ok(next.run(request).await)
}

pub(crate) fn identity_from_headers(headers: &HeaderMap) -> AppResult<ActorIdentity> {
    let subject = header_value(headers, SUBJECT_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{SUBJECT_HEADER} header is required")))?;
    let role = header_value(headers, ROLE_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{ROLE_HEADER} header is required")))?;
    let role = ActorRole::from_str(role)
        .map_err(|_| AppError::Unauthorized(format!("unsupported actor role '{role}'")))?;
    let display_name = header_value(headers, DISPLAY_NAME_HEADER).unwrap_or(subject);

    match role {
        ActorRole::Patient => {
            let patient_pin = header_value(headers, PATIENT_PIN_HEADER).ok_or_else(|| {
                AppError::Unauthorized(format!(
                    "{PATIENT_PIN_HEADER} header is required for patients"
                ))
            })?;
            ActorIdentity::patient(subject, display_name, patient_pin)
        }
        ActorRole::Doctor | ActorRole::Lab => {
            ActorIdentity::provider(subject, display_name, role)
        }
        ActorRole::System => Err(AppError::Unauthorized(
            "system identities cannot be forwarded by the gateway".to_owned(),
        )),
    }
}

fn require_bearer(headers: &HeaderMap, expected_secret: &str) -> AppResult<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("bearer token is required".to_owned()))?;

    if !secrets_match(presented.trim().as_bytes(), expected_secret.as_bytes()) {
        return Err(AppError::Unauthorized("invalid bearer token".to_owned()));
    }

    Ok(())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

// Length leaks, content does not.
fn secrets_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
            == 0
}
