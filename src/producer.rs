//! Producer loop
//!
//! Pulls frames from a [`FrameSource`], encodes raw ones, and publishes
//! them into a [`FrameBroadcaster`]. It runs on a dedicated OS thread so
//! blocking device reads never stall the async runtime that serves
//! consumers.
//!
//! Per-frame failures never stop the loop: a capture miss or an encoder
//! error just skips that cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::broadcast::frame::same_payload;
use crate::broadcast::FrameBroadcaster;
use crate::capture::{Captured, FrameEncoder, FrameSource};
use crate::pacing::{measure_rate, FrameRate, RateSource};
use crate::stats::ProducerStats;

/// Producer configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Skip publishing a frame byte-identical to the previous one
    pub suppress_duplicates: bool,

    /// Sleep after a capture miss (zero = retry immediately)
    pub miss_backoff: Duration,

    /// Crop raw frames to their centered square before encoding
    pub square_crop: bool,

    /// How often to log producer counters at debug level
    pub stats_interval: Duration,

    /// Name of the producer thread
    pub thread_name: String,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            suppress_duplicates: false,
            miss_backoff: Duration::from_millis(5),
            square_crop: false,
            stats_interval: Duration::from_secs(5),
            thread_name: "frame-producer".to_string(),
        }
    }
}

impl ProducerConfig {
    /// Enable producer-side duplicate suppression
    pub fn suppress_duplicates(mut self, enabled: bool) -> Self {
        self.suppress_duplicates = enabled;
        self
    }

    /// Set the capture-miss backoff
    pub fn miss_backoff(mut self, backoff: Duration) -> Self {
        self.miss_backoff = backoff;
        self
    }

    /// Enable square cropping of raw frames
    pub fn square_crop(mut self, enabled: bool) -> Self {
        self.square_crop = enabled;
        self
    }

    /// Set the stats logging interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set the producer thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Result of one producer iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Frame published under this version
    Published(u64),
    /// Source returned nothing
    Missed,
    /// Raw frame could not be encoded
    EncodeFailed,
    /// Frame matched the previous payload and was not published
    Duplicate,
}

/// Capture-encode-publish loop for one source
pub struct Producer<S: FrameSource> {
    source: S,
    encoder: Option<Arc<dyn FrameEncoder>>,
    broadcaster: Arc<FrameBroadcaster>,
    config: ProducerConfig,
    stats: Arc<ProducerStats>,
    last_payload: Option<Bytes>,
    warned_encode: bool,
}

impl<S: FrameSource + 'static> Producer<S> {
    /// Create a producer publishing into `broadcaster`
    pub fn new(source: S, broadcaster: Arc<FrameBroadcaster>) -> Self {
        Self {
            source,
            encoder: None,
            broadcaster,
            config: ProducerConfig::default(),
            stats: Arc::new(ProducerStats::new()),
            last_payload: None,
            warned_encode: false,
        }
    }

    /// Set the encoder used for raw frames
    pub fn with_encoder(mut self, encoder: Arc<dyn FrameEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Set the producer configuration
    pub fn with_config(mut self, config: ProducerConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared producer counters
    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    /// Measure the source's native rate without publishing
    pub fn measure_rate(&mut self, warmup: usize, samples: usize) -> Option<f64> {
        let source = &mut self.source;
        measure_rate(|| source.acquire().is_some(), warmup, samples)
    }

    /// Resolve a configured rate source into a delivery rate
    ///
    /// Measurement failures fall back to the default rate.
    pub fn resolve_rate(&mut self, rate: RateSource) -> FrameRate {
        match rate {
            RateSource::Fixed(fps) => FrameRate::new(fps),
            RateSource::Measure { warmup, samples } => match self.measure_rate(warmup, samples) {
                Some(fps) => {
                    let rate = FrameRate::new(fps);
                    tracing::info!(source = self.source.name(), rate = %rate, "Measured capture rate");
                    rate
                }
                None => {
                    let rate = FrameRate::default();
                    tracing::warn!(
                        source = self.source.name(),
                        fallback = %rate,
                        "Capture rate measurement failed"
                    );
                    rate
                }
            },
        }
    }

    /// Run one capture-encode-publish cycle
    pub fn step(&mut self) -> StepOutcome {
        let Some(captured) = self.source.acquire() else {
            self.stats.record_miss();
            return StepOutcome::Missed;
        };
        self.stats.record_capture();

        let data = match self.encode(captured) {
            Some(data) => data,
            None => {
                self.stats.record_encode_failure();
                return StepOutcome::EncodeFailed;
            }
        };

        if self.config.suppress_duplicates {
            if let Some(ref previous) = self.last_payload {
                if same_payload(previous, &data) {
                    self.stats.record_duplicate();
                    return StepOutcome::Duplicate;
                }
            }
            self.last_payload = Some(data.clone());
        }

        let size = data.len();
        let version = self.broadcaster.publish(data);
        self.stats.record_publish(size);

        StepOutcome::Published(version)
    }

    /// Start the loop on a dedicated thread
    pub fn spawn(self) -> std::io::Result<ProducerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::clone(&self.stats);
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || self.run(&thread_stop))?;

        Ok(ProducerHandle {
            stop,
            thread: Some(thread),
            stats,
        })
    }

    fn encode(&mut self, captured: Captured) -> Option<Bytes> {
        let image = match captured {
            Captured::Encoded(data) => return Some(data),
            Captured::Raw(image) => image,
        };

        let image = if self.config.square_crop {
            image.center_square()
        } else {
            image
        };

        let result = match self.encoder {
            Some(ref encoder) => encoder.encode(&image).map_err(|e| e.to_string()),
            None => Err("no encoder configured for raw frames".to_string()),
        };

        match result {
            Ok(data) => Some(data),
            Err(error) => {
                if !self.warned_encode {
                    tracing::warn!(source = self.source.name(), error = %error, "Failed to encode frame");
                    self.warned_encode = true;
                } else {
                    tracing::trace!(error = %error, "Failed to encode frame");
                }
                None
            }
        }
    }

    fn run(mut self, stop: &AtomicBool) {
        tracing::info!(source = self.source.name(), "Producer started");
        let mut last_report = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if self.step() == StepOutcome::Missed && !self.config.miss_backoff.is_zero() {
                std::thread::sleep(self.config.miss_backoff);
            }

            if last_report.elapsed() >= self.config.stats_interval {
                let stats = self.stats.snapshot();
                tracing::debug!(
                    published = stats.published,
                    missed = stats.missed,
                    duplicates = stats.duplicates,
                    encode_failures = stats.encode_failures,
                    fps = stats.publish_rate(),
                    subscribers = self.broadcaster.subscriber_count(),
                    "Producer stats"
                );
                last_report = Instant::now();
            }
        }

        tracing::info!(source = self.source.name(), "Producer stopped");
    }
}

/// Handle to a running producer thread
///
/// Dropping the handle detaches the thread; it then runs until the
/// process exits.
#[derive(Debug)]
pub struct ProducerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<ProducerStats>,
}

impl ProducerHandle {
    /// Shared producer counters
    pub fn stats(&self) -> &Arc<ProducerStats> {
        &self.stats
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ask the loop to stop and wait for the thread
    ///
    /// Blocks for at most one in-flight `acquire` call.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Producer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ImageError, PixelFormat, RawImage, ReplaySource, SyntheticSource};

    struct LenEncoder;

    impl FrameEncoder for LenEncoder {
        fn encode(&self, image: &RawImage) -> Result<Bytes, ImageError> {
            Ok(Bytes::from(format!("{}x{}", image.width(), image.height())))
        }
    }

    struct FailingEncoder;

    impl FrameEncoder for FailingEncoder {
        fn encode(&self, _image: &RawImage) -> Result<Bytes, ImageError> {
            Err(ImageError::Encode("boom".into()))
        }
    }

    fn replay(frames: &[&'static [u8]]) -> ReplaySource {
        ReplaySource::new(frames.iter().map(|f| Bytes::from_static(f)).collect())
    }

    #[test]
    fn test_step_publishes_encoded_frames() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let mut producer = Producer::new(replay(&[b"a", b"b"]), Arc::clone(&broadcaster));

        assert_eq!(producer.step(), StepOutcome::Published(1));
        assert_eq!(producer.step(), StepOutcome::Published(2));
        assert_eq!(producer.step(), StepOutcome::Missed);

        assert_eq!(broadcaster.latest().unwrap().data().as_ref(), b"b");

        let stats = producer.stats().snapshot();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.bytes_published, 2);
    }

    #[test]
    fn test_capture_miss_keeps_previous_frame() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let source = SyntheticSource::new(4, 4).drop_every(2);
        let mut producer =
            Producer::new(source, Arc::clone(&broadcaster)).with_encoder(Arc::new(LenEncoder));

        assert_eq!(producer.step(), StepOutcome::Published(1));
        assert_eq!(producer.step(), StepOutcome::Missed);
        assert_eq!(broadcaster.version(), 1);
        assert_eq!(producer.step(), StepOutcome::Published(2));
    }

    #[test]
    fn test_duplicate_suppression() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let mut producer = Producer::new(replay(&[b"\xFF\xD8A", b"\xFF\xD8A", b"\xFF\xD8B"]), Arc::clone(&broadcaster))
            .with_config(ProducerConfig::default().suppress_duplicates(true));

        assert_eq!(producer.step(), StepOutcome::Published(1));
        assert_eq!(producer.step(), StepOutcome::Duplicate);
        assert_eq!(producer.step(), StepOutcome::Published(2));
        assert_eq!(producer.stats().snapshot().duplicates, 1);
    }

    #[test]
    fn test_duplicates_published_by_default() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let mut producer = Producer::new(replay(&[b"\xFF\xD8A", b"\xFF\xD8A"]), Arc::clone(&broadcaster));

        assert_eq!(producer.step(), StepOutcome::Published(1));
        assert_eq!(producer.step(), StepOutcome::Published(2));
    }

    #[test]
    fn test_raw_without_encoder_skips_cycle() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let mut producer = Producer::new(SyntheticSource::new(4, 4), Arc::clone(&broadcaster));

        assert_eq!(producer.step(), StepOutcome::EncodeFailed);
        assert!(broadcaster.latest().is_none());
    }

    #[test]
    fn test_encode_failure_skips_cycle() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let mut producer = Producer::new(SyntheticSource::new(4, 4), Arc::clone(&broadcaster))
            .with_encoder(Arc::new(FailingEncoder));

        assert_eq!(producer.step(), StepOutcome::EncodeFailed);
        assert_eq!(producer.step(), StepOutcome::EncodeFailed);
        assert_eq!(producer.stats().snapshot().encode_failures, 2);
        assert_eq!(broadcaster.version(), 0);
    }

    #[test]
    fn test_square_crop_before_encoding() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let source = SyntheticSource::new(8, 4).format(PixelFormat::Gray8);
        let mut producer = Producer::new(source, Arc::clone(&broadcaster))
            .with_encoder(Arc::new(LenEncoder))
            .with_config(ProducerConfig::default().square_crop(true));

        producer.step();
        assert_eq!(broadcaster.latest().unwrap().data().as_ref(), b"4x4");
    }

    #[test]
    fn test_resolve_rate() {
        let broadcaster = Arc::new(FrameBroadcaster::new());

        let mut producer = Producer::new(replay(&[]), Arc::clone(&broadcaster));
        assert_eq!(producer.resolve_rate(RateSource::Fixed(12.0)).fps(), 12.0);

        // Source that never yields falls back to the default
        assert_eq!(
            producer.resolve_rate(RateSource::Measure { warmup: 2, samples: 5 }),
            FrameRate::default()
        );

        let source = SyntheticSource::new(2, 2).fps(200.0);
        let mut producer = Producer::new(source, broadcaster);
        let rate = producer.resolve_rate(RateSource::Measure { warmup: 2, samples: 10 });
        assert!(rate.fps() > 50.0 && rate.fps() <= 250.0, "measured {rate}");
    }

    #[test]
    fn test_spawn_and_stop() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let source = SyntheticSource::new(8, 8).fps(200.0);
        let handle = Producer::new(source, Arc::clone(&broadcaster))
            .with_encoder(Arc::new(LenEncoder))
            .spawn()
            .unwrap();

        let started = Instant::now();
        while broadcaster.version() < 3 && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(broadcaster.version() >= 3);
        assert!(!handle.is_finished());

        let stats = Arc::clone(handle.stats());
        handle.stop();
        assert!(stats.snapshot().published >= 3);

        // Nothing publishes after stop
        let version = broadcaster.version();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(broadcaster.version(), version);
    }
}
