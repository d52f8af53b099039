//! Latest-frame broadcasting and MJPEG-over-HTTP streaming
//!
//! One producer thread captures and encodes frames from a camera (or any
//! [`FrameSource`]) and publishes them into a [`FrameBroadcaster`]. Any
//! number of HTTP clients receive the newest frame as a paced
//! `multipart/x-mixed-replace` stream, or fetch a single snapshot. A slow
//! client skips frames instead of holding up the producer or other clients.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framecast::{FrameBroadcaster, JpegEncoder, MjpegServer, Producer, ServerConfig, SyntheticSource};
//!
//! # async fn run() -> framecast::Result<()> {
//! let broadcaster = Arc::new(FrameBroadcaster::new());
//!
//! let producer = Producer::new(SyntheticSource::new(640, 480).fps(30.0), Arc::clone(&broadcaster))
//!     .with_encoder(Arc::new(JpegEncoder::default()))
//!     .spawn()?;
//!
//! let server = MjpegServer::new(ServerConfig::default(), broadcaster)?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!
//! producer.stop();
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod capture;
pub mod error;
pub mod mjpeg;
pub mod pacing;
pub mod producer;
pub mod server;
pub mod snapshot;
pub mod stats;

pub use broadcast::{BroadcastConfig, BroadcastError, Frame, FrameBroadcaster, SnapshotError, SubscriberHandle, SubscriberId};
#[cfg(feature = "jpeg")]
pub use capture::JpegEncoder;
pub use capture::{Captured, FrameEncoder, FrameSource, ImageError, PixelFormat, RawImage, ReplaySource, SyntheticSource};
pub use error::{Error, Result};
pub use mjpeg::{multipart_stream, Boundary, MultipartEncoder};
pub use pacing::{FrameRate, Pacer, PacingConfig, RateSource};
pub use producer::{Producer, ProducerConfig, ProducerHandle, StepOutcome};
pub use server::{ConfigError, MjpegServer, ServerConfig};
pub use snapshot::{CaptureAndEncode, SnapshotStrategy, Snapshotter, StillCapture};
pub use stats::{BroadcastStats, ProducerStats, ProducerStatsSnapshot};
