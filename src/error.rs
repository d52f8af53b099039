//! Crate-level error type

use crate::broadcast::{BroadcastError, SnapshotError};
use crate::capture::ImageError;
use crate::server::ConfigError;

/// Any error returned by this crate
#[derive(Debug)]
pub enum Error {
    /// Socket or file I/O failed
    Io(std::io::Error),
    /// Invalid server configuration
    Config(ConfigError),
    /// Subscription ended
    Broadcast(BroadcastError),
    /// No image available for a snapshot
    Snapshot(SnapshotError),
    /// Raw image rejected or encoding failed
    Image(ImageError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Broadcast(e) => write!(f, "Broadcast error: {}", e),
            Error::Snapshot(e) => write!(f, "Snapshot error: {}", e),
            Error::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Broadcast(e) => Some(e),
            Error::Snapshot(e) => Some(e),
            Error::Image(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<BroadcastError> for Error {
    fn from(err: BroadcastError) -> Self {
        Error::Broadcast(err)
    }
}

impl From<SnapshotError> for Error {
    fn from(err: SnapshotError) -> Self {
        Error::Snapshot(err)
    }
}

impl From<ImageError> for Error {
    fn from(err: ImageError) -> Self {
        Error::Image(err)
    }
}

/// Result type using the crate error
pub type Result<T> = std::result::Result<T, Error>;
