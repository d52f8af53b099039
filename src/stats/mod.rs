//! Broadcast and producer statistics

pub mod metrics;

pub use metrics::{BroadcastStats, ProducerStats, ProducerStatsSnapshot};
