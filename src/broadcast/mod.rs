//! Latest-wins frame broadcasting
//!
//! A single producer publishes encoded frames into a slot that only ever
//! holds the newest one. Consumers subscribe through a registry; each holds
//! a wake signal that is raised on publish, and picks up whatever frame is
//! current when it gets around to looking. Slow consumers skip frames, they
//! never queue them.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<FrameBroadcaster>
//!                  ┌──────────────────────────────┐
//!                  │ slot: FrameSlot {            │
//!                  │   current: Option<Frame>,    │
//!                  │   version: u64,              │
//!                  │ }                            │
//!                  │ registry: HashMap<Id, Signal>│
//!                  └──────────────┬───────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]             [Subscriber]            [Subscriber]
//!    publish()            wait_for_next()         wait_for_next()
//!         │                       │                       │
//!         └──► slot + notify_all ─┴──► multipart_stream ──► HTTP
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so every subscriber and every
//! snapshot shares the allocation the producer published.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod frame;
pub mod registry;
pub mod slot;
pub mod subscriber;

pub use broadcaster::FrameBroadcaster;
pub use config::BroadcastConfig;
pub use error::{BroadcastError, SnapshotError};
pub use frame::{Frame, SubscriberId};
pub use registry::SubscriberRegistry;
pub use slot::FrameSlot;
pub use subscriber::SubscriberHandle;
