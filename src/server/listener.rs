//! MJPEG server listener
//!
//! Binds the TCP listener and serves the routes with axum.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::broadcast::FrameBroadcaster;
use crate::error::Result;
use crate::mjpeg::MultipartEncoder;
use crate::pacing::{FrameRate, RateSource};
use crate::server::config::{ConfigError, ServerConfig};
use crate::server::routes::{router, AppState};
use crate::snapshot::{SnapshotStrategy, Snapshotter};

/// MJPEG-over-HTTP server for one broadcaster
#[derive(Debug)]
pub struct MjpegServer {
    config: ServerConfig,
    broadcaster: Arc<FrameBroadcaster>,
    encoder: Arc<MultipartEncoder>,
    stream_content_type: HeaderValue,
    image_content_type: HeaderValue,
    rate: FrameRate,
    snapshot: SnapshotStrategy,
    stream_semaphore: Option<Arc<Semaphore>>,
}

impl MjpegServer {
    /// Create a server, validating the configuration
    ///
    /// A measured rate cannot be resolved here; pass the result of
    /// [`Producer::resolve_rate`](crate::Producer::resolve_rate) to
    /// [`frame_rate`](Self::frame_rate), otherwise the default rate is used.
    pub fn new(config: ServerConfig, broadcaster: Arc<FrameBroadcaster>) -> Result<Self> {
        let encoder = config.encoder()?;

        let stream_content_type = HeaderValue::from_str(&encoder.content_type())
            .map_err(|_| ConfigError::InvalidContentType(encoder.content_type()))?;
        let image_content_type = HeaderValue::from_str(&config.content_type)
            .map_err(|_| ConfigError::InvalidContentType(config.content_type.clone()))?;

        let rate = match config.pacing.rate {
            RateSource::Fixed(fps) => FrameRate::new(fps),
            RateSource::Measure { .. } => FrameRate::default(),
        };

        let stream_semaphore = if config.max_streams > 0 {
            Some(Arc::new(Semaphore::new(config.max_streams)))
        } else {
            None
        };

        Ok(Self {
            config,
            broadcaster,
            encoder: Arc::new(encoder),
            stream_content_type,
            image_content_type,
            rate,
            snapshot: SnapshotStrategy::Latest,
            stream_semaphore,
        })
    }

    /// Override the delivery rate
    pub fn frame_rate(mut self, rate: FrameRate) -> Self {
        self.rate = rate;
        self
    }

    /// Set where snapshot images come from
    pub fn snapshot_strategy(mut self, strategy: SnapshotStrategy) -> Self {
        self.snapshot = strategy;
        self
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.broadcaster
    }

    /// Delivery rate used for new streams
    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    /// Build the axum router, e.g. to nest it into a larger application
    pub fn router(&self) -> Router {
        let state = AppState {
            broadcaster: Arc::clone(&self.broadcaster),
            snapshotter: Snapshotter::new(Arc::clone(&self.broadcaster))
                .with_strategy(self.snapshot.clone()),
            encoder: Arc::clone(&self.encoder),
            rate: self.rate,
            max_lag_ticks: self.config.pacing.max_lag_ticks,
            wait_timeout: self.broadcaster.config().wait_timeout,
            stream_content_type: self.stream_content_type.clone(),
            image_content_type: self.image_content_type.clone(),
            streams: self.stream_semaphore.clone(),
        };

        router(state, &self.config.path_prefix)
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// On shutdown every subscriber is disconnected so open streams end and
    /// in-flight requests can drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            prefix = %self.config.path_prefix,
            rate = %self.rate,
            "MJPEG server listening"
        );

        let broadcaster = Arc::clone(&self.broadcaster);
        let signal = async move {
            shutdown.await;
            let disconnected = broadcaster.disconnect_all();
            tracing::info!(streams = disconnected, "Shutdown signal received");
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!(addr = %addr, "MJPEG server stopped");
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::error::Error;
    use crate::pacing::PacingConfig;

    struct TestServer {
        addr: SocketAddr,
        broadcaster: Arc<FrameBroadcaster>,
        shutdown: Option<oneshot::Sender<()>>,
        task: JoinHandle<Result<()>>,
    }

    async fn start(config: ServerConfig) -> TestServer {
        start_with(config, SnapshotStrategy::Latest).await
    }

    async fn start_with(config: ServerConfig, strategy: SnapshotStrategy) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broadcaster = Arc::new(FrameBroadcaster::new());

        let config = config.pacing(PacingConfig::default().fixed_rate(100.0));
        let server = MjpegServer::new(config, Arc::clone(&broadcaster))
            .unwrap()
            .snapshot_strategy(strategy);

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        TestServer {
            addr,
            broadcaster,
            shutdown: Some(tx),
            task,
        }
    }

    async fn send_get(addr: SocketAddr, path: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        stream
    }

    async fn get(addr: SocketAddr, path: &str) -> (String, Vec<u8>) {
        let mut stream = send_get(addr, path).await;
        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
            .await
            .unwrap()
            .unwrap();

        let split = find(&raw, b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&raw[..split]).to_string();
        (head, raw[split + 4..].to_vec())
    }

    /// Read from `stream` until `needle` shows up
    async fn read_until(stream: &mut TcpStream, raw: &mut Vec<u8>, needle: &[u8]) {
        let mut buf = [0u8; 4096];
        tokio::time::timeout(Duration::from_secs(5), async {
            while find(raw, needle).is_none() {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed early");
                raw.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .unwrap();
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Publish until every subscriber has gone, so dead connections are
    /// noticed on write
    async fn publish_until_no_subscribers(broadcaster: &FrameBroadcaster) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while broadcaster.subscriber_count() > 0 {
                broadcaster.publish(Bytes::from_static(b"\xFF\xD8tick"));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = ServerConfig::default().boundary("not valid");
        let result = MjpegServer::new(config, Arc::new(FrameBroadcaster::new()));

        assert!(matches!(result, Err(Error::Config(ConfigError::InvalidBoundary(_)))));
    }

    #[test]
    fn test_measured_rate_defaults_until_overridden() {
        let config = ServerConfig::default().pacing(PacingConfig::default().measured(1, 2));
        let server = MjpegServer::new(config, Arc::new(FrameBroadcaster::new())).unwrap();
        assert_eq!(server.rate(), FrameRate::default());

        let server = server.frame_rate(FrameRate::new(12.0));
        assert_eq!(server.rate().fps(), 12.0);
    }

    #[tokio::test]
    async fn test_snapshot_unavailable_then_ok() {
        let server = start(ServerConfig::default()).await;

        let (head, _) = get(server.addr, "/snap").await;
        assert!(head.starts_with("HTTP/1.1 503"));
        assert!(head.to_ascii_lowercase().contains("cache-control: no-cache"));

        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));

        let (head, body) = get(server.addr, "/snap").await;
        assert!(head.starts_with("HTTP/1.1 200"));
        assert!(head.to_ascii_lowercase().contains("content-type: image/jpeg"));
        assert_eq!(body, b"\xFF\xD8A");

        let (head, body) = get(server.addr, "/snapshot").await;
        assert!(head.starts_with("HTTP/1.1 200"));
        assert_eq!(body, b"\xFF\xD8A");
    }

    #[tokio::test]
    async fn test_snapshot_uses_still_capture() {
        let still = || Some(Bytes::from_static(b"\xFF\xD8still"));
        let server = start_with(
            ServerConfig::default(),
            SnapshotStrategy::Capture(Arc::new(still)),
        )
        .await;

        let (head, body) = get(server.addr, "/snap").await;
        assert!(head.starts_with("HTTP/1.1 200"));
        assert_eq!(body, b"\xFF\xD8still");
    }

    #[tokio::test]
    async fn test_video_stream() {
        let server = start(ServerConfig::default()).await;
        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));

        let mut stream = send_get(server.addr, "/video").await;
        let mut raw = Vec::new();
        read_until(&mut stream, &mut raw, b"\r\n\r\n").await;

        let head = String::from_utf8_lossy(&raw).to_ascii_lowercase();
        assert!(head.starts_with("http/1.1 200"));
        assert!(head.contains("content-type: multipart/x-mixed-replace; boundary=frame"));
        assert!(head.contains("cache-control: no-cache"));
        assert_eq!(server.broadcaster.subscriber_count(), 1);

        read_until(
            &mut stream,
            &mut raw,
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8A\r\n",
        )
        .await;

        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8B"));
        read_until(&mut stream, &mut raw, b"\r\n\r\n\xFF\xD8B\r\n").await;

        // Client disconnect unsubscribes
        drop(stream);
        publish_until_no_subscribers(&server.broadcaster).await;
    }

    #[tokio::test]
    async fn test_max_streams() {
        let server = start(ServerConfig::default().max_streams(1)).await;
        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));

        let mut first = send_get(server.addr, "/video").await;
        let mut raw = Vec::new();
        read_until(&mut first, &mut raw, b"\xFF\xD8A").await;

        let (head, _) = get(server.addr, "/video").await;
        assert!(head.starts_with("HTTP/1.1 503"));

        drop(first);
        publish_until_no_subscribers(&server.broadcaster).await;

        // The permit is released with the stream
        let mut third = send_get(server.addr, "/video").await;
        let mut raw = Vec::new();
        read_until(&mut third, &mut raw, b"HTTP/1.1 200").await;
    }

    #[tokio::test]
    async fn test_path_prefix() {
        let server = start(ServerConfig::default().path_prefix("/camera")).await;
        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));

        let (head, body) = get(server.addr, "/camera/snap").await;
        assert!(head.starts_with("HTTP/1.1 200"));
        assert_eq!(body, b"\xFF\xD8A");

        let (head, _) = get(server.addr, "/snap").await;
        assert!(head.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_streams() {
        let mut server = start(ServerConfig::default()).await;
        server.broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));

        let mut stream = send_get(server.addr, "/video").await;
        let mut raw = Vec::new();
        read_until(&mut stream, &mut raw, b"\xFF\xD8A").await;

        server.shutdown.take().unwrap().send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server.task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(server.broadcaster.subscriber_count(), 0);
    }
}
