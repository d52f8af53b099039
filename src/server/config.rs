//! Server configuration

use std::net::SocketAddr;

use crate::mjpeg::{Boundary, BoundaryError, MultipartEncoder, DEFAULT_BOUNDARY, DEFAULT_PART_CONTENT_TYPE};
use crate::pacing::PacingConfig;

/// Error type for invalid server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Boundary token is not usable in a header parameter
    InvalidBoundary(BoundaryError),
    /// Path prefix must be empty or start with `/`
    InvalidPathPrefix(String),
    /// Content type is empty or not a valid header value
    InvalidContentType(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidBoundary(e) => write!(f, "Invalid boundary: {}", e),
            ConfigError::InvalidPathPrefix(p) => write!(f, "Invalid path prefix: {:?}", p),
            ConfigError::InvalidContentType(t) => write!(f, "Invalid content type: {:?}", t),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidBoundary(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BoundaryError> for ConfigError {
    fn from(err: BoundaryError) -> Self {
        ConfigError::InvalidBoundary(err)
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Prefix for all routes, e.g. `/camera` (empty = mounted at root)
    pub path_prefix: String,

    /// Multipart boundary token
    pub boundary: String,

    /// Content type of each part and of snapshot responses
    pub content_type: String,

    /// Add a `Content-Length` header to every part
    pub include_content_length: bool,

    /// Maximum concurrent video streams (0 = unlimited)
    pub max_streams: usize,

    /// Delivery pacing
    pub pacing: PacingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            path_prefix: String::new(),
            boundary: DEFAULT_BOUNDARY.to_string(),
            content_type: DEFAULT_PART_CONTENT_TYPE.to_string(),
            include_content_length: false,
            max_streams: 0, // Unlimited
            pacing: PacingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the route prefix (trailing slashes are dropped)
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the multipart boundary
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Set the image content type
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Add `Content-Length` to every part
    pub fn include_content_length(mut self, enabled: bool) -> Self {
        self.include_content_length = enabled;
        self
    }

    /// Set maximum concurrent streams
    pub fn max_streams(mut self, max: usize) -> Self {
        self.max_streams = max;
        self
    }

    /// Set the pacing configuration
    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Check the configuration for values that would produce bad responses
    pub fn validate(&self) -> Result<(), ConfigError> {
        Boundary::new(self.boundary.as_str())?;

        if !self.path_prefix.is_empty()
            && (!self.path_prefix.starts_with('/') || self.path_prefix.ends_with('/'))
        {
            return Err(ConfigError::InvalidPathPrefix(self.path_prefix.clone()));
        }

        let content_type_ok = self.content_type.contains('/')
            && self
                .content_type
                .bytes()
                .all(|b| b.is_ascii_graphic() || b == b' ');
        if !content_type_ok {
            return Err(ConfigError::InvalidContentType(self.content_type.clone()));
        }

        Ok(())
    }

    /// Build the part encoder for this configuration
    pub fn encoder(&self) -> Result<MultipartEncoder, ConfigError> {
        self.validate()?;
        let boundary = Boundary::new(self.boundary.as_str())?;

        Ok(MultipartEncoder::new(boundary)
            .part_content_type(self.content_type.as_str())
            .include_content_length(self.include_content_length))
    }
}
