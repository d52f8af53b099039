//! Latest-frame slot
//!
//! Holds the most recently published frame and a version counter. There is
//! no history: publishing over an undelivered frame drops it.

use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use super::frame::Frame;

#[derive(Debug, Default)]
struct SlotState {
    current: Option<Frame>,
    version: u64,
}

/// Single-writer, many-reader holder for the newest frame
///
/// Replacement and reads share one critical section, so a reader never
/// observes a partially written frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: RwLock<SlotState>,
}

impl FrameSlot {
    /// Create an empty slot at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame, returning its new version
    ///
    /// The version grows by exactly one per call.
    pub fn publish(&self, data: Bytes) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.version += 1;
        let version = state.version;
        state.current = Some(Frame::new(version, data));
        version
    }

    /// Current frame, or `None` before the first publish
    pub fn read(&self) -> Option<Frame> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Current version (0 before the first publish)
    pub fn version(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// Whether nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot = FrameSlot::new();

        assert!(slot.is_empty());
        assert!(slot.read().is_none());
        assert_eq!(slot.version(), 0);
    }

    #[test]
    fn test_version_increments_by_one() {
        let slot = FrameSlot::new();

        for expected in 1..=5u64 {
            let version = slot.publish(Bytes::from(vec![expected as u8]));
            assert_eq!(version, expected);
            assert_eq!(slot.version(), expected);
        }

        let frame = slot.read().unwrap();
        assert_eq!(frame.version(), 5);
        assert_eq!(frame.data().as_ref(), &[5]);
    }

    #[test]
    fn test_identical_payload_still_bumps_version() {
        let slot = FrameSlot::new();

        slot.publish(Bytes::from_static(b"\xFF\xD8A"));
        slot.publish(Bytes::from_static(b"\xFF\xD8A"));

        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn test_only_latest_retained() {
        let slot = FrameSlot::new();

        for i in 0..10_000u32 {
            slot.publish(Bytes::from(i.to_be_bytes().to_vec()));
        }

        let frame = slot.read().unwrap();
        assert_eq!(frame.version(), 10_000);
        assert_eq!(frame.data().as_ref(), &9_999u32.to_be_bytes());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_frames() {
        let slot = Arc::new(FrameSlot::new());

        let writer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for i in 0..2_000u32 {
                    let fill = (i % 251) as u8;
                    slot.publish(Bytes::from(vec![fill; 4096]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    let mut last_version = 0;
                    for _ in 0..2_000 {
                        if let Some(frame) = slot.read() {
                            let first = frame.data()[0];
                            assert!(frame.data().iter().all(|b| *b == first));
                            assert!(frame.version() >= last_version);
                            last_version = frame.version();
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(slot.version(), 2_000);
    }
}
