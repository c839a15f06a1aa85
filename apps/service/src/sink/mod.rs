/// Result delivery layer
///
/// A deployment selects exactly one delivery channel at startup: the
/// persistent sink writes check history and rolling stream status into the
/// registry, the queue sink publishes one event per check for a downstream
/// consumer. Delivery failures are logged by the round and never abort it.
pub mod database;
pub mod queue;

pub use database::DatabaseSink;
pub use queue::QueueSink;

use async_trait::async_trait;
use thiserror::Error;

use crate::monitoring::types::CheckResult;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("registry write failed: {0}")]
    Registry(#[source] anyhow::Error),

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("queue publish failed: {0}")]
    Queue(#[from] zmq::Error),
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Deliver one check result. Best-effort: the caller logs errors and
    /// treats the check as complete either way.
    async fn deliver(&self, check: &CheckResult) -> Result<(), DeliveryError>;
}
