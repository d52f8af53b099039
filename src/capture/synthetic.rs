//! Synthetic test-pattern source
//!
//! Produces a moving diagonal gradient at a fixed cadence, blocking between
//! frames the way a real device read would. Useful for demos and tests
//! where no camera is attached.

use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{Captured, FrameSource, PixelFormat, RawImage};

/// Raw test-pattern generator
#[derive(Debug)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_interval: Option<Duration>,
    next_due: Option<Instant>,
    drop_every: Option<u64>,
    counter: u64,
}

impl SyntheticSource {
    /// Create an RGB source with no frame-rate limit
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format: PixelFormat::Rgb8,
            frame_interval: None,
            next_due: None,
            drop_every: None,
            counter: 0,
        }
    }

    /// Set the pixel format
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Block so frames arrive at roughly `fps`
    pub fn fps(mut self, fps: f64) -> Self {
        self.frame_interval = (fps.is_finite() && fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        self
    }

    /// Simulate a transient capture miss on every `n`th call
    pub fn drop_every(mut self, n: u64) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    /// Number of `acquire` calls so far
    pub fn calls(&self) -> u64 {
        self.counter
    }

    fn wait_for_cadence(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };

        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Fall back to "now" if we are more than one frame late
        let next = due + interval;
        self.next_due = Some(if next < Instant::now() { Instant::now() + interval } else { next });
    }

    fn render(&self) -> Bytes {
        let bpp = self.format.bytes_per_pixel();
        let shift = (self.counter * 4) as usize;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * bpp);

        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let v = ((x + y + shift) % 256) as u8;
                match self.format {
                    PixelFormat::Gray8 => data.push(v),
                    PixelFormat::Rgb8 => data.extend_from_slice(&[v, 255 - v, (y % 256) as u8]),
                }
            }
        }

        Bytes::from(data)
    }
}

impl FrameSource for SyntheticSource {
    fn acquire(&mut self) -> Option<Captured> {
        self.wait_for_cadence();
        self.counter += 1;

        if self.drop_every.is_some_and(|n| self.counter % n == 0) {
            return None;
        }

        let data = self.render();
        RawImage::new(self.width, self.height, self.format, data)
            .ok()
            .map(Captured::Raw)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(captured: Option<Captured>) -> RawImage {
        match captured {
            Some(Captured::Raw(image)) => image,
            other => panic!("expected raw frame, got {:?}", other),
        }
    }

    #[test]
    fn test_frames_have_requested_shape() {
        let mut source = SyntheticSource::new(16, 8).format(PixelFormat::Gray8);
        let image = raw(source.acquire());

        assert_eq!((image.width(), image.height()), (16, 8));
        assert_eq!(image.format(), PixelFormat::Gray8);
        assert_eq!(image.data().len(), 16 * 8);
    }

    #[test]
    fn test_consecutive_frames_differ() {
        let mut source = SyntheticSource::new(8, 8);
        let a = raw(source.acquire());
        let b = raw(source.acquire());

        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_drop_every() {
        let mut source = SyntheticSource::new(4, 4).drop_every(3);
        let results: Vec<bool> = (0..6).map(|_| source.acquire().is_some()).collect();

        assert_eq!(results, vec![true, true, false, true, true, false]);
        assert_eq!(source.calls(), 6);
    }

    #[test]
    fn test_fps_paces_acquire() {
        let mut source = SyntheticSource::new(4, 4).fps(100.0);
        let started = Instant::now();
        for _ in 0..6 {
            source.acquire();
        }

        // First frame is immediate, the next five wait ~10ms each
        assert!(started.elapsed() >= Duration::from_millis(45));
    }
}
