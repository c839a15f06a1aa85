use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DeliveryError, ResultSink};
use crate::database::StreamRegistry;
use crate::monitoring::types::CheckResult;

/// Persistent delivery: insert the check record, then update the stream's
/// rolling status fields.
///
/// The stream update only happens when the insert reported at least one
/// row written; a silent zero-row insert skips the update and the round
/// carries on. No retry on either write.
pub struct DatabaseSink {
    registry: Arc<dyn StreamRegistry>,
}

impl DatabaseSink {
    pub fn new(registry: Arc<dyn StreamRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ResultSink for DatabaseSink {
    async fn deliver(&self, check: &CheckResult) -> Result<(), DeliveryError> {
        let rows =
            self.registry.insert_check(check).await.map_err(DeliveryError::Registry)?;

        if rows == 0 {
            warn!(stream_id = %check.stream_id, "check insert wrote no rows, skipping stream update");
            return Ok(());
        }

        debug!(stream_id = %check.stream_id, status = %check.status, "check recorded, updating stream");

        self.registry
            .update_stream_status(check.stream_id, check.status, check.timestamp)
            .await
            .map_err(DeliveryError::Registry)?;

        Ok(())
    }
}
