//! MJPEG-over-HTTP serialization
//!
//! This module provides:
//! - Multipart part encoding with a validated boundary
//! - The paced per-subscriber multipart byte stream

pub mod part;
pub mod stream;

pub use part::{Boundary, BoundaryError, MultipartEncoder, DEFAULT_BOUNDARY, DEFAULT_PART_CONTENT_TYPE};
pub use stream::multipart_stream;
