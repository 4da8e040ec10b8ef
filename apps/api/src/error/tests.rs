use axum::http::StatusCode;
use axum::response::IntoResponse;
use consentry_core::AppError;
use consentry_domain::AccessDenyReason;
use http_body_util::BodyExt;
use serde_json::Value;

use super::ApiError;

async fn render(error: ApiError) -> (StatusCode, Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn app_errors_map_to_status_and_code() {
    let cases = [
        (
            AppError::Validation("bad pin".to_owned()),
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
        ),
        (
            AppError::NotFound("missing".to_owned()),
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
        ),
        (
            AppError::Conflict("already approved".to_owned()),
            StatusCode::CONFLICT,
            "CONFLICT",
        ),
        (
            AppError::Unauthorized("no token".to_owned()),
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
        ),
        (
            AppError::Forbidden("not yours".to_owned()),
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
        ),
    ];

    for (error, expected_status, expected_code) in cases {
        let (status, body) = render(ApiError::from(error)).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["code"], expected_code);
    }
}

#[tokio::test]
async fn internal_error_detail_is_not_leaked() {
    let (status, body) = render(ApiError::from(AppError::Internal(
        "failed to connect to database: password authentication failed".to_owned(),
    )))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "internal server error");
}

#[tokio::test]
async fn access_refusals_carry_evaluator_codes() {
    let (status, body) = render(ApiError::AccessDenied(AccessDenyReason::ConsentExpired)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CONSENT_EXPIRED");

    let (_, body) = render(ApiError::AccessDenied(AccessDenyReason::ScopeViolation)).await;
    assert_eq!(body["code"], "SCOPE_VIOLATION");

    let (_, body) = render(ApiError::AccessDenied(AccessDenyReason::ConsentRevoked)).await;
    assert_eq!(body["code"], "ACCESS_DENIED");
}
