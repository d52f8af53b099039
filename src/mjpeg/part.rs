//! Multipart part encoding
//!
//! Each frame becomes one part of a `multipart/x-mixed-replace` body:
//!
//! ```text
//! --{boundary}\r\n
//! Content-Type: image/jpeg\r\n
//! [Content-Length: {n}\r\n]
//! \r\n
//! {payload}\r\n
//! ```
//!
//! The boundary in each marker line is the same literal declared in the
//! response's `Content-Type` parameter.

use bytes::{BufMut, Bytes, BytesMut};

use crate::broadcast::Frame;

/// Boundary token used when none is configured
pub const DEFAULT_BOUNDARY: &str = "frame";

/// Part content type used when none is configured
pub const DEFAULT_PART_CONTENT_TYPE: &str = "image/jpeg";

/// Longest boundary allowed by RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Error type for invalid boundary tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    /// Boundary is empty
    Empty,
    /// Boundary exceeds [`MAX_BOUNDARY_LEN`]
    TooLong(usize),
    /// Boundary contains a character that would need quoting
    InvalidChar(char),
}

impl std::fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryError::Empty => write!(f, "Boundary is empty"),
            BoundaryError::TooLong(len) => {
                write!(f, "Boundary is {} chars, max is {}", len, MAX_BOUNDARY_LEN)
            }
            BoundaryError::InvalidChar(c) => write!(f, "Invalid boundary character: {:?}", c),
        }
    }
}

impl std::error::Error for BoundaryError {}

/// A multipart boundary token
///
/// Restricted to characters that can appear unquoted in a header
/// parameter: ASCII letters, digits and `'+_-.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    /// Validate and wrap a boundary token
    pub fn new(token: impl Into<String>) -> Result<Self, BoundaryError> {
        let token = token.into();

        if token.is_empty() {
            return Err(BoundaryError::Empty);
        }
        if token.len() > MAX_BOUNDARY_LEN {
            return Err(BoundaryError::TooLong(token.len()));
        }
        if let Some(c) = token
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "'+_-.".contains(*c)))
        {
            return Err(BoundaryError::InvalidChar(c));
        }

        Ok(Self(token))
    }

    /// The token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self(DEFAULT_BOUNDARY.to_string())
    }
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes frames into multipart parts
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: Boundary,
    part_content_type: String,
    include_content_length: bool,
    /// Precomputed `--{boundary}\r\nContent-Type: {type}\r\n`
    head: Bytes,
}

impl MultipartEncoder {
    /// Create an encoder for JPEG parts without `Content-Length` headers
    pub fn new(boundary: Boundary) -> Self {
        let head = Self::build_head(&boundary, DEFAULT_PART_CONTENT_TYPE);
        Self {
            boundary,
            part_content_type: DEFAULT_PART_CONTENT_TYPE.to_string(),
            include_content_length: false,
            head,
        }
    }

    /// Set the per-part content type
    pub fn part_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.part_content_type = content_type.into();
        self.head = Self::build_head(&self.boundary, &self.part_content_type);
        self
    }

    /// Add a `Content-Length` header to every part
    pub fn include_content_length(mut self, enabled: bool) -> Self {
        self.include_content_length = enabled;
        self
    }

    /// Boundary token
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Per-part content type
    pub fn part_type(&self) -> &str {
        &self.part_content_type
    }

    /// Response content type declaring the boundary
    pub fn content_type(&self) -> String {
        format!("multipart/x-mixed-replace; boundary={}", self.boundary)
    }

    /// Encode one payload as a complete part
    pub fn encode_part(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.head.len() + payload.len() + 40);

        buf.put_slice(&self.head);
        if self.include_content_length {
            buf.put_slice(format!("Content-Length: {}\r\n", payload.len()).as_bytes());
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(payload);
        buf.put_slice(b"\r\n");

        buf.freeze()
    }

    /// Encode a published frame as a complete part
    pub fn encode_frame(&self, frame: &Frame) -> Bytes {
        self.encode_part(frame.data())
    }

    fn build_head(boundary: &Boundary, content_type: &str) -> Bytes {
        Bytes::from(format!(
            "--{}\r\nContent-Type: {}\r\n",
            boundary, content_type
        ))
    }
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new(Boundary::default())
    }
}
