use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use super::executor::StreamChecker;
use super::types::CheckResult;
use crate::database::StreamRegistry;
use crate::sink::ResultSink;

/// Drives monitoring rounds: a full pass over every registered stream,
/// one independent check pipeline per stream, all delivered through the
/// configured sink.
pub struct MonitorWorker {
    registry: Arc<dyn StreamRegistry>,
    checker: Arc<dyn StreamChecker>,
    sink: Arc<dyn ResultSink>,
    period: Duration,
}

impl MonitorWorker {
    pub fn new(
        registry: Arc<dyn StreamRegistry>,
        checker: Arc<dyn StreamChecker>,
        sink: Arc<dyn ResultSink>,
        period: Duration,
    ) -> Self {
        Self { registry, checker, sink, period }
    }

    /// Run one complete round over the current stream snapshot.
    ///
    /// The snapshot is fetched once, all pipelines fan out concurrently,
    /// and the round only completes after every one of them finished.
    /// Check and delivery failures are absorbed per stream; none of them
    /// can abort the round or affect a sibling pipeline.
    pub async fn run_round(&self) -> Vec<CheckResult> {
        let streams = match self.registry.list_streams().await {
            Ok(streams) => streams,
            Err(error) => {
                error!(%error, "failed to fetch stream snapshot, skipping round");
                return Vec::new();
            }
        };

        info!(streams = streams.len(), "starting monitoring round");

        let pipelines = streams.iter().map(|stream| async move {
            let result = self.checker.check_stream(stream).await;
            if let Err(error) = self.sink.deliver(&result).await {
                warn!(stream_id = %stream.id, %error, "failed to deliver check result");
            }
            result
        });

        let results = futures::future::join_all(pipelines).await;

        let online = results.iter().filter(|r| r.status.is_online()).count();
        info!(total = results.len(), online, "monitoring round complete");

        results
    }

    /// Periodic trigger loop.
    ///
    /// A round runs to completion inside its tick, so rounds cannot
    /// overlap; triggers that fire while a round is still in flight are
    /// skipped rather than queued. The shutdown signal lets an in-flight
    /// round wind down before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "monitor loop started");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_round().await;
                }
                _ = shutdown.changed() => {
                    info!("shutdown signal received, stopping monitor loop");
                    break;
                }
            }
        }
    }
}
