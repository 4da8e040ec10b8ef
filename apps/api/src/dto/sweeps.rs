use consentry_application::SweepReport;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for an on-demand expiry sweep.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/expiry-sweep-request.ts"
)]
pub struct ExpirySweepRequest {
    pub batch_size: Option<usize>,
}

/// Outcome of an on-demand expiry sweep.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/expiry-sweep-response.ts"
)]
pub struct ExpirySweepResponse {
    /// False when another sweeper held the lease and nothing ran.
    pub lease_acquired: bool,
    pub examined: usize,
    pub expired: usize,
    pub skipped: usize,
}

impl From<Option<SweepReport>> for ExpirySweepResponse {
    fn from(report: Option<SweepReport>) -> Self {
        let lease_acquired = report.is_some();
        let report = report.unwrap_or_default();
        Self {
            lease_acquired,
            examined: report.examined,
            expired: report.expired,
            skipped: report.skipped,
        }
    }
}
