//! Broadcast error types
//!
//! Error types for subscription and snapshot operations.

use super::frame::SubscriberId;

/// Error type for subscription operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The subscriber was removed from the registry
    Unsubscribed(SubscriberId),
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastError::Unsubscribed(id) => write!(f, "Subscriber {} unsubscribed", id),
        }
    }
}

impl std::error::Error for BroadcastError {}

/// Error type for snapshot requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// No frame has been published and no still capture succeeded
    Unavailable,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Unavailable => write!(f, "No frame available"),
        }
    }
}

impl std::error::Error for SnapshotError {}
