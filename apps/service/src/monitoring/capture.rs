use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response status: {0}")]
    Status(reqwest::StatusCode),
}

/// Samples a bounded window of audio bytes from a stream URL.
///
/// The byte budget is a heuristic stand-in for a sampling duration (the
/// default approximates 5 seconds of 44.1 kHz 16-bit stereo PCM); the
/// actual codec and bitrate of the stream are not accounted for.
pub struct StreamCapture {
    client: reqwest::Client,
    byte_budget: usize,
}

impl StreamCapture {
    pub fn new(
        user_agent: &str,
        byte_budget: usize,
        read_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(read_timeout)
            .read_timeout(read_timeout)
            .build()?;

        Ok(Self { client, byte_budget })
    }

    /// Open a streaming GET and read at most `byte_budget` bytes of the
    /// response body.
    ///
    /// Stops at the budget or at end of stream, whichever comes first; a
    /// short read that produced at least one byte is returned as-is. No
    /// `Content-Length` is required and nothing is retained across calls.
    pub async fn capture(&self, url: &str) -> Result<Vec<u8>, CaptureError> {
        let url = Url::parse(url)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CaptureError::Status(response.status()));
        }

        let mut body = Vec::with_capacity(self.byte_budget.min(64 * 1024));
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let remaining = self.byte_budget - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single raw HTTP response on a loopback socket and return the
    /// URL pointing at it.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(&response).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}/stream")
    }

    fn http_ok(body: &[u8]) -> Vec<u8> {
        let mut response =
            b"HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(body);
        response
    }

    fn capture_with_budget(budget: usize) -> StreamCapture {
        StreamCapture::new("aircheck-test", budget, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn short_read_is_accepted() {
        let url = serve_once(http_ok(b"abcdef")).await;
        let body = capture_with_budget(1024).capture(&url).await.unwrap();
        assert_eq!(body, b"abcdef");
    }

    #[tokio::test]
    async fn body_is_truncated_at_the_byte_budget() {
        let url = serve_once(http_ok(&[0x55u8; 4096])).await;
        let body = capture_with_budget(100).capture(&url).await.unwrap();
        assert_eq!(body.len(), 100);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve_once(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n".to_vec()).await;
        let err = capture_with_budget(1024).capture(&url).await.unwrap_err();
        assert!(matches!(err, CaptureError::Status(status) if status.as_u16() == 404));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        // Bind then drop to find a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err =
            capture_with_budget(1024).capture(&format!("http://{addr}/stream")).await.unwrap_err();
        assert!(matches!(err, CaptureError::Network(_)));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_any_io() {
        let err = capture_with_budget(1024).capture("not a url").await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidUrl(_)));
    }
}
