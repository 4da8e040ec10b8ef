use std::time::Duration;

use consentry_application::ExpirySweepService;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Background loop that expires due grants while the API is running.
pub struct InProcessSweeper {
    pub service: ExpirySweepService,
    pub holder_id: String,
    pub interval: Duration,
    pub batch_size: usize,
    pub lease_seconds: u32,
}

impl InProcessSweeper {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self
                    .service
                    .sweep_once(self.holder_id.as_str(), self.batch_size, self.lease_seconds)
                    .await
                {
                    Ok(Some(report)) if report.expired > 0 => info!(
                        holder_id = %self.holder_id,
                        examined = report.examined,
                        expired = report.expired,
                        skipped = report.skipped,
                        "expiry sweep settled grants"
                    ),
                    Ok(_) => {}
                    Err(error) => warn!(
                        holder_id = %self.holder_id,
                        error = %error,
                        "expiry sweep failed"
                    ),
                }
            }
        })
    }
}
