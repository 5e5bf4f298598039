//! Cooperative shutdown shared by every wait in the harvester
//!
//! Confirmation waits, allowance polls and rate-limit cooldowns have no
//! timeout of their own. They all race against one `CancellationToken`
//! instead, so an operator interrupt ends them with
//! `HarvesterError::Cancelled`.

use crate::error::{HarvesterError, HarvesterResult};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `shutdown` is cancelled first.
pub async fn sleep(shutdown: &CancellationToken, duration: Duration, operation: &str) -> HarvesterResult<()> {
    tokio::select! {
        _ = shutdown.cancelled() => Err(HarvesterError::Cancelled {
            operation: operation.to_string(),
        }),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
