use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use super::capture::{CaptureError, StreamCapture};
use super::probe::{LoudnessProbe, ProbeError};
use super::types::CheckResult;
use crate::database::models::Stream;

#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Runs one stream's check pipeline: capture, probe, classify.
///
/// Every failure is absorbed at this boundary and converted into a down
/// result, so one stream can never abort another's pipeline.
#[async_trait]
pub trait StreamChecker: Send + Sync {
    async fn check_stream(&self, stream: &Stream) -> CheckResult;
}

pub struct MonitoringExecutor {
    capture: StreamCapture,
    probe: LoudnessProbe,
    silence_threshold_db: f64,
}

impl MonitoringExecutor {
    pub fn new(capture: StreamCapture, probe: LoudnessProbe, silence_threshold_db: f64) -> Self {
        Self { capture, probe, silence_threshold_db }
    }

    async fn sample_volume(&self, url: &str) -> Result<f64, CheckError> {
        let audio = self.capture.capture(url).await?;
        let volume_db = self.probe.probe(audio).await?;
        Ok(volume_db)
    }
}

#[async_trait]
impl StreamChecker for MonitoringExecutor {
    async fn check_stream(&self, stream: &Stream) -> CheckResult {
        info!(url = %stream.url, "checking stream");

        match self.sample_volume(&stream.url).await {
            Ok(volume_db) => {
                let result = CheckResult::classified(stream, volume_db, self.silence_threshold_db);
                info!(url = %stream.url, status = %result.status, volume_db, "stream classified");
                result
            }
            Err(error) => {
                warn!(url = %stream.url, %error, "stream check failed");
                CheckResult::failed(stream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::StreamStatus;
    use std::time::Duration;
    use uuid::Uuid;

    fn executor() -> MonitoringExecutor {
        let capture =
            StreamCapture::new("aircheck-test", 1024, Duration::from_secs(2)).unwrap();
        let probe = LoudnessProbe::new("/nonexistent/analysis-tool", Duration::from_secs(2));
        MonitoringExecutor::new(capture, probe, -30.0)
    }

    #[tokio::test]
    async fn unreachable_stream_is_absorbed_as_down() {
        let stream =
            Stream::new("http://127.0.0.1:9/unroutable".into(), Uuid::new_v4());

        let result = executor().check_stream(&stream).await;

        assert_eq!(result.status, StreamStatus::Down);
        assert_eq!(result.volume(), 0.0);
        assert!(result.completed);
        assert_eq!(result.stream_id, stream.id);
    }
}
