//! Statistics for the broadcaster and the producer

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time broadcaster statistics
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    /// Current slot version (number of frames published)
    pub version: u64,
    /// Active subscribers
    pub subscriber_count: usize,
    /// Size of the current frame in bytes
    pub frame_size: usize,
    /// Age of the current frame
    pub frame_age: Option<Duration>,
}

/// Live producer counters
///
/// Updated by the producer thread, readable from anywhere.
#[derive(Debug)]
pub struct ProducerStats {
    started_at: Instant,
    captured: AtomicU64,
    missed: AtomicU64,
    encode_failures: AtomicU64,
    duplicates: AtomicU64,
    published: AtomicU64,
    bytes_published: AtomicU64,
}

impl ProducerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            captured: AtomicU64::new(0),
            missed: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_capture(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish(&self, size: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Copy the counters out
    pub fn snapshot(&self) -> ProducerStatsSnapshot {
        ProducerStatsSnapshot {
            uptime: self.started_at.elapsed(),
            captured: self.captured.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProducerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copied producer counters
#[derive(Debug, Clone, Default)]
pub struct ProducerStatsSnapshot {
    /// Time since the producer started
    pub uptime: Duration,
    /// Frames handed over by the source
    pub captured: u64,
    /// Capture attempts that returned nothing
    pub missed: u64,
    /// Raw frames the encoder rejected
    pub encode_failures: u64,
    /// Frames suppressed as byte-identical to the previous one
    pub duplicates: u64,
    /// Frames published into the slot
    pub published: u64,
    /// Total payload bytes published
    pub bytes_published: u64,
}

impl ProducerStatsSnapshot {
    /// Published frames per second over the producer's lifetime
    pub fn publish_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.published as f64 / secs
        } else {
            0.0
        }
    }

    /// Published payload bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_published * 8) / secs
        } else {
            0
        }
    }
}
