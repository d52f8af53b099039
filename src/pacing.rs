//! Delivery pacing
//!
//! Each consumer stream is throttled to a target frame rate regardless of
//! how fast the producer publishes. The rate is either fixed by
//! configuration or measured once from the capture source at startup.
//!
//! Deadlines are computed from a fixed origin and a tick count
//! (`origin + n / fps`) rather than `now + interval`, so scheduling jitter
//! does not accumulate into drift.

use std::time::Duration;

use tokio::time::Instant;

/// Rate used when none is configured or measurement fails
pub const DEFAULT_FPS: f64 = 30.0;

/// Slowest accepted delivery rate
pub const MIN_FPS: f64 = 0.5;

/// Fastest accepted delivery rate
pub const MAX_FPS: f64 = 240.0;

/// A validated, strictly positive frame rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate(f64);

impl FrameRate {
    /// Create a frame rate, substituting [`DEFAULT_FPS`] for zero, negative
    /// or non-finite values and clamping to `[MIN_FPS, MAX_FPS]`
    pub fn new(fps: f64) -> Self {
        Self::try_new(fps).unwrap_or_else(|| {
            tracing::warn!(fps = fps, fallback = DEFAULT_FPS, "Invalid frame rate, using default");
            Self(DEFAULT_FPS)
        })
    }

    /// Create a frame rate, returning `None` for zero, negative or non-finite values
    pub fn try_new(fps: f64) -> Option<Self> {
        if fps.is_finite() && fps > 0.0 {
            Some(Self(fps.clamp(MIN_FPS, MAX_FPS)))
        } else {
            None
        }
    }

    /// Frames per second
    pub fn fps(&self) -> f64 {
        self.0
    }

    /// Time between two deliveries
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.0)
    }

    fn offset(&self, ticks: u64) -> Duration {
        Duration::from_secs_f64(ticks as f64 / self.0)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(DEFAULT_FPS)
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} fps", self.0)
    }
}

/// Where the delivery rate comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSource {
    /// Fixed rate in frames per second
    Fixed(f64),
    /// Measure the capture source once at startup
    Measure {
        /// Samples discarded while exposure and buffers settle
        warmup: usize,
        /// Samples timed to compute the rate
        samples: usize,
    },
}

impl RateSource {
    /// Measure with 10 warmup samples and 60 timed samples
    pub fn measure() -> Self {
        RateSource::Measure {
            warmup: 10,
            samples: 60,
        }
    }
}

impl Default for RateSource {
    fn default() -> Self {
        RateSource::Fixed(DEFAULT_FPS)
    }
}

/// Pacing configuration
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Target delivery rate
    pub rate: RateSource,

    /// Re-anchor the schedule when a consumer falls this many intervals
    /// behind, instead of bursting to catch up (0 = never)
    pub max_lag_ticks: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            rate: RateSource::default(),
            max_lag_ticks: 4,
        }
    }
}

impl PacingConfig {
    /// Use a fixed delivery rate
    pub fn fixed_rate(mut self, fps: f64) -> Self {
        self.rate = RateSource::Fixed(fps);
        self
    }

    /// Measure the delivery rate from the source at startup
    pub fn measured(mut self, warmup: usize, samples: usize) -> Self {
        self.rate = RateSource::Measure { warmup, samples };
        self
    }

    /// Set the lag threshold for re-anchoring
    pub fn max_lag_ticks(mut self, ticks: u32) -> Self {
        self.max_lag_ticks = ticks;
        self
    }
}

/// Measure a source's frame rate
///
/// Calls `sample` `warmup` times without timing it (stopping early on the
/// first failure), then times up to `samples` successful calls. Returns
/// `None` if no sample succeeded or no time elapsed.
pub fn measure_rate<F>(mut sample: F, warmup: usize, samples: usize) -> Option<f64>
where
    F: FnMut() -> bool,
{
    for _ in 0..warmup {
        if !sample() {
            break;
        }
    }

    let started = std::time::Instant::now();
    let mut count = 0usize;
    while count < samples {
        if !sample() {
            break;
        }
        count += 1;
    }
    let elapsed = started.elapsed().as_secs_f64();

    if count == 0 || elapsed <= 0.0 {
        return None;
    }

    let fps = count as f64 / elapsed;
    fps.is_finite().then_some(fps)
}

/// Per-consumer deadline schedule
#[derive(Debug, Clone)]
pub struct Pacer {
    rate: FrameRate,
    origin: Instant,
    ticks: u64,
    max_lag_ticks: u32,
}

impl Pacer {
    /// Create a pacer whose schedule starts now
    pub fn new(rate: FrameRate) -> Self {
        Self::starting_at(rate, Instant::now())
    }

    /// Create a pacer whose schedule starts at `origin`
    pub fn starting_at(rate: FrameRate, origin: Instant) -> Self {
        Self {
            rate,
            origin,
            ticks: 0,
            max_lag_ticks: PacingConfig::default().max_lag_ticks,
        }
    }

    /// Set the lag threshold for re-anchoring (0 = never)
    pub fn max_lag_ticks(mut self, ticks: u32) -> Self {
        self.max_lag_ticks = ticks;
        self
    }

    /// Target rate
    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    /// Advance the schedule by exactly one interval
    pub fn next_deadline(&mut self) -> Instant {
        self.ticks += 1;
        self.origin + self.rate.offset(self.ticks)
    }

    /// Advance the schedule, re-anchoring at `now` if it lags too far behind
    pub fn next_deadline_from(&mut self, now: Instant) -> Instant {
        let deadline = self.next_deadline();

        if self.max_lag_ticks > 0 {
            let max_lag = self.rate.interval() * self.max_lag_ticks;
            if now > deadline + max_lag {
                tracing::trace!(
                    lag_ms = (now - deadline).as_millis() as u64,
                    "Pacer fell behind, re-anchoring"
                );
                self.origin = now;
                self.ticks = 0;
                return now;
            }
        }

        deadline
    }

    /// Suspend until the next deadline
    pub async fn tick(&mut self) {
        let deadline = self.next_deadline_from(Instant::now());
        tokio::time::sleep_until(deadline).await;
    }
}
