//! Replaying source for pre-encoded frames
//!
//! Cycles through a fixed list of encoded buffers, standing in for a
//! hardware pipeline that hands over finished JPEGs.

use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{Captured, FrameSource};

/// Source that replays encoded frames in order
#[derive(Debug)]
pub struct ReplaySource {
    frames: Vec<Bytes>,
    index: usize,
    looping: bool,
    frame_interval: Option<Duration>,
    last: Option<Instant>,
}

impl ReplaySource {
    /// Replay the given frames once
    pub fn new(frames: Vec<Bytes>) -> Self {
        Self {
            frames,
            index: 0,
            looping: false,
            frame_interval: None,
            last: None,
        }
    }

    /// Load every file in `paths` as one encoded frame
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Self> {
        let frames = paths
            .iter()
            .map(|p| std::fs::read(p).map(Bytes::from))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::new(frames))
    }

    /// Start over after the last frame instead of running dry
    pub fn looping(mut self, enabled: bool) -> Self {
        self.looping = enabled;
        self
    }

    /// Block so frames arrive at roughly `fps`
    pub fn fps(mut self, fps: f64) -> Self {
        self.frame_interval = (fps.is_finite() && fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        self
    }

    /// Number of frames in the list
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ReplaySource {
    fn acquire(&mut self) -> Option<Captured> {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());

        if self.index >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.index = 0;
        }

        let frame = self.frames[self.index].clone();
        self.index += 1;
        Some(Captured::Encoded(frame))
    }

    fn name(&self) -> &str {
        "replay"
    }
}
