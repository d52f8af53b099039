//! Frame types for latest-wins broadcasting
//!
//! This module defines the identifier handed to each subscriber and the
//! encoded frame that is published into the slot.

use std::time::{Duration, Instant};

use bytes::Bytes;

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric id
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An encoded frame held by the slot
///
/// This is designed to be cheap to clone due to `Bytes` reference counting.
/// Every subscriber shares the same payload allocation; nobody gets a
/// mutable alias.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Slot version this frame was published under
    version: u64,
    /// Encoded image bytes (zero-copy via reference counting)
    data: Bytes,
    /// When the frame was published
    published_at: Instant,
}

impl Frame {
    pub(crate) fn new(version: u64, data: Bytes) -> Self {
        Self {
            version,
            data,
            published_at: Instant::now(),
        }
    }

    /// Slot version of this frame
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Encoded payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the frame, returning its payload
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// When the frame was published
    pub fn published_at(&self) -> Instant {
        self.published_at
    }

    /// Time since the frame was published
    pub fn age(&self) -> Duration {
        self.published_at.elapsed()
    }

    /// Whether this frame carries exactly the given payload bytes
    pub fn has_payload(&self, other: &Bytes) -> bool {
        same_payload(&self.data, other)
    }
}

/// Byte-for-byte payload comparison with a shared-allocation fast path
pub(crate) fn same_payload(a: &Bytes, b: &Bytes) -> bool {
    (a.as_ptr() == b.as_ptr() && a.len() == b.len()) || a == b
}
