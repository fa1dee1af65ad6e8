use tracing::{debug, error, info};

use crate::error::Result;
use crate::services::LifecycleService;

/// Background manager that times out pending requests whose window closed.
#[derive(Clone)]
pub struct TimeoutSweeper {
    lifecycle: LifecycleService,
    interval_secs: u64,
}

impl TimeoutSweeper {
    pub fn new(lifecycle: LifecycleService, interval_secs: u64) -> Self {
        Self {
            lifecycle,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Run a single sweep. Returns how many requests were moved to
    /// `unresolved`; repeating a sweep with nothing overdue returns 0.
    pub async fn run_once(&self) -> Result<u64> {
        debug!("Starting timeout sweep");

        match self.lifecycle.expire_overdue().await {
            Ok(expired) => {
                if expired.is_empty() {
                    debug!("No overdue help requests");
                } else {
                    info!("Timeout sweep complete: {} requests expired", expired.len());
                }
                Ok(expired.len() as u64)
            }
            Err(e) => {
                error!("Timeout sweep failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}
