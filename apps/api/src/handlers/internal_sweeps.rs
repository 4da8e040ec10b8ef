use axum::Json;
use axum::extract::{Extension, State};

use crate::dto::{ExpirySweepRequest, ExpirySweepResponse};
use crate::error::ApiResult;
use crate::middleware::WorkerIdentity;
use crate::state::AppState;

pub async fn run_expiry_sweep_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Json(payload): Json<ExpirySweepRequest>,
) -> ApiResult<Json<ExpirySweepResponse>> {
    let batch_size = payload
        .batch_size
        .unwrap_or(state.expiry_sweep_batch_size)
        .clamp(1, state.expiry_sweep_batch_size);

    let report = state
        .expiry_sweep_service
        .sweep_once(
            worker.worker_id(),
            batch_size,
            state.expiry_sweep_lease_seconds,
        )
        .await?;

    if let Some(report) = report {
        tracing::info!(
            worker_id = worker.worker_id(),
            examined = report.examined,
            expired = report.expired,
            skipped = report.skipped,
            "on-demand expiry sweep finished"
        );
    }

    Ok(Json(ExpirySweepResponse::from(report)))
}
