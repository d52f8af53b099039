//! Subscriber handle
//!
//! The consumer-side view of a registry entry. A handle tracks the last
//! version (and payload) it delivered, waits for fresher frames, and
//! unsubscribes when dropped.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::broadcaster::FrameBroadcaster;
use super::error::BroadcastError;
use super::frame::{same_payload, Frame, SubscriberId};
use super::registry::SubscriberSignal;

/// Handle for one live subscriber
///
/// Versions returned by a handle are strictly increasing. Versions may be
/// skipped when the producer outpaces the consumer.
pub struct SubscriberHandle {
    id: SubscriberId,
    last_seen: Option<u64>,
    last_payload: Option<Bytes>,
    signal: Arc<SubscriberSignal>,
    broadcaster: Arc<FrameBroadcaster>,
}

impl SubscriberHandle {
    pub(super) fn new(
        id: SubscriberId,
        last_seen: Option<u64>,
        signal: Arc<SubscriberSignal>,
        broadcaster: Arc<FrameBroadcaster>,
    ) -> Self {
        Self {
            id,
            last_seen,
            last_payload: None,
            signal,
            broadcaster,
        }
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Last version marked as seen, `None` if nothing has been seen yet
    pub fn last_seen(&self) -> Option<u64> {
        self.last_seen
    }

    /// Whether this subscriber has been removed from the registry
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancel.is_cancelled()
    }

    /// Resolves once this subscriber has been removed from the registry
    pub async fn cancelled(&self) {
        self.signal.cancel.cancelled().await
    }

    /// Take the current frame if it is newer than anything seen so far
    ///
    /// Never blocks. A newer version whose payload equals the last delivered
    /// one is marked seen and skipped when content dedup is enabled.
    pub fn try_next(&mut self) -> Result<Option<Frame>, BroadcastError> {
        if self.is_cancelled() {
            return Err(BroadcastError::Unsubscribed(self.id));
        }

        let Some(frame) = self.broadcaster.latest() else {
            return Ok(None);
        };

        if self.last_seen.is_some_and(|seen| frame.version() <= seen) {
            return Ok(None);
        }
        self.last_seen = Some(frame.version());

        if self.broadcaster.config().dedup_content {
            if let Some(ref previous) = self.last_payload {
                if same_payload(previous, frame.data()) {
                    tracing::trace!(
                        subscriber = %self.id,
                        version = frame.version(),
                        "Skipping duplicate payload"
                    );
                    return Ok(None);
                }
            }
            self.last_payload = Some(frame.data().clone());
        }

        Ok(Some(frame))
    }

    /// Wait for a frame fresher than the last one seen
    ///
    /// Returns `Ok(None)` when `timeout` elapses first; the timeout is a
    /// liveness fallback for missed wakeups, so callers simply wait again.
    /// Returns an error promptly once the subscriber is unsubscribed, even
    /// from another thread while this call is pending.
    pub async fn wait_for_next(&mut self, timeout: Duration) -> Result<Option<Frame>, BroadcastError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let signal = Arc::clone(&self.signal);

        loop {
            if let Some(frame) = self.try_next()? {
                return Ok(Some(frame));
            }

            tokio::select! {
                _ = signal.notify.notified() => {}
                _ = signal.cancel.cancelled() => {
                    return Err(BroadcastError::Unsubscribed(self.id));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Ok(None);
                }
            }
        }
    }

    /// Leave the registry
    ///
    /// Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("last_seen", &self.last_seen)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
