//! Frame broadcaster implementation
//!
//! Owns the latest-frame slot and the subscriber registry, and ties the
//! two together: publishing replaces the slot and then wakes everybody.

use std::sync::Arc;

use bytes::Bytes;

use super::config::BroadcastConfig;
use super::error::SnapshotError;
use super::frame::{Frame, SubscriberId};
use super::registry::SubscriberRegistry;
use super::slot::FrameSlot;
use super::subscriber::SubscriberHandle;
use crate::stats::BroadcastStats;

/// Latest-wins broadcaster for one capture source
///
/// Construct one per source and share it through `Arc` between the
/// producer and the request handlers.
#[derive(Debug)]
pub struct FrameBroadcaster {
    slot: FrameSlot,
    registry: SubscriberRegistry,
    config: BroadcastConfig,
}

impl FrameBroadcaster {
    /// Create a broadcaster with default configuration
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    /// Create a broadcaster with custom configuration
    pub fn with_config(config: BroadcastConfig) -> Self {
        Self {
            slot: FrameSlot::new(),
            registry: SubscriberRegistry::new(),
            config,
        }
    }

    /// Get the broadcaster configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Publish an encoded frame and wake all subscribers
    ///
    /// Always succeeds and returns the new slot version.
    pub fn publish(&self, data: impl Into<Bytes>) -> u64 {
        let version = self.slot.publish(data.into());
        let woken = self.registry.notify_all();

        tracing::trace!(version = version, subscribers = woken, "Frame published");

        version
    }

    /// Current frame without blocking, `None` before the first publish
    pub fn latest(&self) -> Option<Frame> {
        self.slot.read()
    }

    /// Current slot version
    pub fn version(&self) -> u64 {
        self.slot.version()
    }

    /// Read the slot once for a one-shot request
    pub fn snapshot(&self) -> Result<Frame, SnapshotError> {
        self.slot.read().ok_or(SnapshotError::Unavailable)
    }

    /// Subscribe, receiving the current frame (if any) on the first wait
    pub fn subscribe(self: &Arc<Self>) -> SubscriberHandle {
        let (id, signal) = self.registry.register();
        SubscriberHandle::new(id, None, signal, Arc::clone(self))
    }

    /// Subscribe, receiving only frames published after this call
    pub fn subscribe_from_next(self: &Arc<Self>) -> SubscriberHandle {
        let (id, signal) = self.registry.register();
        let current = self.slot.version();
        SubscriberHandle::new(id, Some(current), signal, Arc::clone(self))
    }

    /// Remove a subscriber, cancelling any wait in progress on its handle
    ///
    /// Returns `false` if the subscriber was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.remove(id)
    }

    /// Remove every subscriber, ending all streams in progress
    pub fn disconnect_all(&self) -> usize {
        self.registry.clear()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Get broadcaster statistics
    pub fn stats(&self) -> BroadcastStats {
        let latest = self.slot.read();
        BroadcastStats {
            version: latest.as_ref().map_or(0, Frame::version),
            subscriber_count: self.registry.len(),
            frame_size: latest.as_ref().map_or(0, Frame::len),
            frame_age: latest.as_ref().map(Frame::age),
        }
    }
}

impl Default for FrameBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
