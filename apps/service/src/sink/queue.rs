use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{DeliveryError, ResultSink};
use crate::monitoring::types::{CheckResult, StreamStatus};

/// Flat event published per check, owned by whichever consumer drains the
/// queue. Timestamps serialize as ISO-8601 UTC.
#[derive(Debug, Serialize)]
struct CheckEvent {
    stream_id: Uuid,
    account_id: Uuid,
    volume: f64,
    status: StreamStatus,
    timestamp: DateTime<Utc>,
}

impl From<&CheckResult> for CheckEvent {
    fn from(check: &CheckResult) -> Self {
        Self {
            stream_id: check.stream_id,
            account_id: check.account_id,
            volume: check.volume(),
            status: check.status,
            timestamp: check.timestamp,
        }
    }
}

/// Queue delivery over a ZeroMQ PUSH socket.
///
/// One message per check; stream rows are not touched in this mode, that
/// responsibility moves to the downstream consumer. The socket is shared
/// by all concurrent pipelines behind a mutex since ZeroMQ sockets are not
/// thread-safe.
///
/// Sends carry a timeout: once the consumer is gone and the high-water
/// mark fills up, a publish fails with a delivery error instead of
/// blocking the round behind the socket mutex.
pub struct QueueSink {
    socket: Mutex<zmq::Socket>,
}

const SEND_TIMEOUT_MS: i32 = 5_000;

impl QueueSink {
    pub fn new(endpoint: &str) -> Result<Self, DeliveryError> {
        Self::with_send_timeout(endpoint, SEND_TIMEOUT_MS)
    }

    fn with_send_timeout(endpoint: &str, timeout_ms: i32) -> Result<Self, DeliveryError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUSH)?;
        socket.set_sndtimeo(timeout_ms)?;
        socket.connect(endpoint)?;
        Ok(Self { socket: Mutex::new(socket) })
    }
}

#[async_trait]
impl ResultSink for QueueSink {
    async fn deliver(&self, check: &CheckResult) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&CheckEvent::from(check))?;

        let socket = self.socket.lock().await;
        socket.send(body, 0)?;

        debug!(stream_id = %check.stream_id, status = %check.status, "check event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Stream;

    fn bound_pull_socket() -> (zmq::Context, zmq::Socket, String) {
        let context = zmq::Context::new();
        let pull = context.socket(zmq::PULL).unwrap();
        pull.bind("tcp://127.0.0.1:*").unwrap();
        pull.set_rcvtimeo(5_000).unwrap();
        let endpoint = pull.get_last_endpoint().unwrap().unwrap();
        (context, pull, endpoint)
    }

    #[tokio::test]
    async fn publishes_one_event_per_check_in_the_documented_shape() {
        let (_context, pull, endpoint) = bound_pull_socket();
        let sink = QueueSink::new(&endpoint).unwrap();

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        let check = CheckResult::classified(&stream, -12.0, -30.0);
        sink.deliver(&check).await.unwrap();

        let message = pull.recv_bytes(0).unwrap();
        let event: serde_json::Value = serde_json::from_slice(&message).unwrap();

        assert_eq!(event["stream_id"], stream.id.to_string());
        assert_eq!(event["account_id"], stream.account_id.to_string());
        assert_eq!(event["volume"], -12.0);
        assert_eq!(event["status"], "online");
        assert!(event["timestamp"].as_str().unwrap().starts_with("20"));
    }

    #[tokio::test]
    async fn failed_checks_publish_zero_volume() {
        let (_context, pull, endpoint) = bound_pull_socket();
        let sink = QueueSink::new(&endpoint).unwrap();

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        sink.deliver(&CheckResult::failed(&stream)).await.unwrap();

        let message = pull.recv_bytes(0).unwrap();
        let event: serde_json::Value = serde_json::from_slice(&message).unwrap();

        assert_eq!(event["status"], "down");
        assert_eq!(event["volume"], 0.0);
    }

    #[tokio::test]
    async fn absent_consumer_degrades_to_a_delivery_error() {
        // Find a port nothing listens on; the PUSH socket never leaves its
        // mute state, so the send must time out instead of blocking the
        // round forever.
        let unused_port = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("tcp://{}", unused_port.local_addr().unwrap());
        drop(unused_port);

        let sink = QueueSink::with_send_timeout(&endpoint, 100).unwrap();

        let stream = Stream::new("http://radio.example/live".into(), Uuid::new_v4());
        let check = CheckResult::failed(&stream);

        let delivery = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            sink.deliver(&check),
        )
        .await
        .expect("send did not respect its timeout");

        assert!(matches!(delivery, Err(DeliveryError::Queue(_))));
    }
}
