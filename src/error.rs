//! Error types and handling for orbit

use std::io;

/// Result type alias for orbit operations
pub type Result<T> = std::result::Result<T, OrbError>;

/// Error types surfaced by the broker
///
/// Transport failures keep their originating [`io::Error`] so callers can
/// still distinguish "legitimately absent" from "transport failure".
#[derive(Debug, thiserror::Error)]
pub enum OrbError {
    /// Channel path absent in a context where it cannot be created
    #[error("Channel not found: {path}")]
    NotFound { path: String },

    /// Missing or malformed argument
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Derived channel path longer than the configured maximum
    #[error("Channel path too long: {path} exceeds {max} bytes")]
    PathTooLong { path: String, max: usize },

    /// Registration of a new channel failed for a reason other than a lost race
    #[error("Registration of {path} failed: {source}")]
    Registration {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Any other transport failure, propagated verbatim
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    /// A publish wrote fewer bytes than the topic's element size
    #[error("Short write on {topic}: wrote {written}, expected {expected}")]
    ShortWrite {
        topic: String,
        written: usize,
        expected: usize,
    },

    /// Identity record encoding/decoding errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl OrbError {
    /// Create an I/O error from a transport error
    pub fn from_io(source: io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a path too long error
    pub fn path_too_long(path: impl Into<String>, max: usize) -> Self {
        Self::PathTooLong {
            path: path.into(),
            max,
        }
    }

    /// Create a registration error
    pub fn registration(path: impl Into<String>, source: io::Error) -> Self {
        Self::Registration {
            path: path.into(),
            source,
        }
    }

    /// Create a short write error
    pub fn short_write(topic: impl Into<String>, written: usize, expected: usize) -> Self {
        Self::ShortWrite {
            topic: topic.into(),
            written,
            expected,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Kind of the originating transport error, if there was one
    pub fn kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } | Self::Registration { source, .. } => Some(source.kind()),
            Self::NotFound { .. } => Some(io::ErrorKind::NotFound),
            _ => None,
        }
    }

    /// OS error code of the originating transport error, if there was one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } | Self::Registration { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Whether this error means the channel does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(io::ErrorKind::NotFound)
    }
}

impl From<io::Error> for OrbError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err, "Transport operation failed")
    }
}

impl From<bincode::Error> for OrbError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(format!("Bincode error: {}", err))
    }
}
