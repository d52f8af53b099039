//! One-shot snapshots
//!
//! A snapshot is either the frame currently being broadcast, or a separate
//! high-resolution still taken on demand while the live stream keeps
//! running at its lower resolution.

use std::sync::Arc;

use bytes::Bytes;

use crate::broadcast::FrameBroadcaster;
use crate::capture::{FrameEncoder, RawImage};

pub use crate::broadcast::SnapshotError;

/// On-demand still capture
///
/// Called from the blocking pool, so implementations may block on device
/// I/O. `None` means the capture failed.
pub trait StillCapture: Send + Sync {
    /// Take one encoded still image
    fn capture(&self) -> Option<Bytes>;
}

impl<F> StillCapture for F
where
    F: Fn() -> Option<Bytes> + Send + Sync,
{
    fn capture(&self) -> Option<Bytes> {
        self()
    }
}

/// Still capture from a raw grab function and an encoder
pub struct CaptureAndEncode<G> {
    grab: G,
    encoder: Arc<dyn FrameEncoder>,
}

impl<G> CaptureAndEncode<G>
where
    G: Fn() -> Option<RawImage> + Send + Sync,
{
    pub fn new(grab: G, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self { grab, encoder }
    }
}

impl<G> StillCapture for CaptureAndEncode<G>
where
    G: Fn() -> Option<RawImage> + Send + Sync,
{
    fn capture(&self) -> Option<Bytes> {
        let image = (self.grab)()?;
        match self.encoder.encode(&image) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode still image");
                None
            }
        }
    }
}

/// Where snapshot bytes come from
#[derive(Clone, Default)]
pub enum SnapshotStrategy {
    /// The frame currently being broadcast
    #[default]
    Latest,
    /// A dedicated still capture, falling back to the latest frame
    Capture(Arc<dyn StillCapture>),
}

impl std::fmt::Debug for SnapshotStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStrategy::Latest => write!(f, "Latest"),
            SnapshotStrategy::Capture(_) => write!(f, "Capture(..)"),
        }
    }
}

/// Serves snapshot requests for one broadcaster
#[derive(Debug, Clone)]
pub struct Snapshotter {
    broadcaster: Arc<FrameBroadcaster>,
    strategy: SnapshotStrategy,
}

impl Snapshotter {
    /// Snapshot the latest broadcast frame
    pub fn new(broadcaster: Arc<FrameBroadcaster>) -> Self {
        Self {
            broadcaster,
            strategy: SnapshotStrategy::Latest,
        }
    }

    /// Set the snapshot strategy
    pub fn with_strategy(mut self, strategy: SnapshotStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> &SnapshotStrategy {
        &self.strategy
    }

    /// Produce one encoded image
    pub async fn snapshot(&self) -> Result<Bytes, SnapshotError> {
        if let SnapshotStrategy::Capture(ref still) = self.strategy {
            let still = Arc::clone(still);
            match tokio::task::spawn_blocking(move || still.capture()).await {
                Ok(Some(data)) => return Ok(data),
                Ok(None) => {
                    tracing::debug!("Still capture failed, using latest frame");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Still capture task failed");
                }
            }
        }

        self.broadcaster.snapshot().map(|frame| frame.into_data())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::capture::{ImageError, PixelFormat};

    #[tokio::test]
    async fn test_latest_strategy() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let snapshotter = Snapshotter::new(Arc::clone(&broadcaster));

        assert_eq!(snapshotter.snapshot().await.unwrap_err(), SnapshotError::Unavailable);

        broadcaster.publish(Bytes::from_static(b"\xFF\xD8A"));
        assert_eq!(snapshotter.snapshot().await.unwrap().as_ref(), b"\xFF\xD8A");
    }

    #[tokio::test]
    async fn test_capture_strategy_prefers_still() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        broadcaster.publish(Bytes::from_static(b"low"));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let still = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Bytes::from_static(b"high"))
        };

        let snapshotter = Snapshotter::new(broadcaster)
            .with_strategy(SnapshotStrategy::Capture(Arc::new(still)));

        assert_eq!(snapshotter.snapshot().await.unwrap().as_ref(), b"high");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_falls_back() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let failing = || -> Option<Bytes> { None };
        let snapshotter = Snapshotter::new(Arc::clone(&broadcaster))
            .with_strategy(SnapshotStrategy::Capture(Arc::new(failing)));

        assert_eq!(snapshotter.snapshot().await.unwrap_err(), SnapshotError::Unavailable);

        broadcaster.publish(Bytes::from_static(b"low"));
        assert_eq!(snapshotter.snapshot().await.unwrap().as_ref(), b"low");
    }

    #[tokio::test]
    async fn test_capture_and_encode() {
        struct Tagged;
        impl FrameEncoder for Tagged {
            fn encode(&self, image: &RawImage) -> Result<Bytes, ImageError> {
                if image.width() > 2 {
                    Ok(Bytes::from_static(b"big"))
                } else {
                    Err(ImageError::EmptyImage)
                }
            }
        }

        let ok = CaptureAndEncode::new(
            || RawImage::new(4, 1, PixelFormat::Gray8, vec![0u8; 4]).ok(),
            Arc::new(Tagged),
        );
        assert_eq!(ok.capture().unwrap().as_ref(), b"big");

        let rejected = CaptureAndEncode::new(
            || RawImage::new(1, 1, PixelFormat::Gray8, vec![0u8]).ok(),
            Arc::new(Tagged),
        );
        assert!(rejected.capture().is_none());
    }
}
