//! Error types for civicmap.
//!
//! Library crates use [`CivicMapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all civicmap operations.
#[derive(Debug, thiserror::Error)]
pub enum CivicMapError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external provider.
    #[error("network error: {0}")]
    Network(String),

    /// A stored or received payload could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Input validation error (empty text, unknown locality, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The text-understanding capability failed (timeout, malformed response).
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// A geocoding provider failed for the whole batch.
    #[error("geocoding error: {0}")]
    Geocoding(String),

    /// Addresses remained unresolved after the fallback pass.
    #[error("Failed to geocode addresses: {}", missing.join(", "))]
    GeocodingIncomplete { missing: Vec<String> },

    /// The document store rejected a write or read.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CivicMapError>;

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Text understanding failed.
    Extraction,
    /// Some locations could not be placed on the map.
    GeocodingIncomplete,
    /// The caller supplied invalid input.
    InvalidInput,
    /// Anything else.
    Internal,
}

impl CivicMapError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction failure from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    /// Create a persistence failure from any displayable message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailed(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for caller-facing responses.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ExtractionFailed(_) => FailureKind::Extraction,
            Self::GeocodingIncomplete { .. } => FailureKind::GeocodingIncomplete,
            Self::Validation { .. } => FailureKind::InvalidInput,
            _ => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CivicMapError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CivicMapError::GeocodingIncomplete {
            missing: vec!["ул. Граф Игнатиев to: УНКНОWN_PLACE".into(), "бул. Витоша 1".into()],
        };
        assert_eq!(
            err.to_string(),
            "Failed to geocode addresses: ул. Граф Игнатиев to: УНКНОWN_PLACE, бул. Витоша 1"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            CivicMapError::extraction("timeout").kind(),
            FailureKind::Extraction
        );
        assert_eq!(
            CivicMapError::GeocodingIncomplete { missing: vec![] }.kind(),
            FailureKind::GeocodingIncomplete
        );
        assert_eq!(
            CivicMapError::validation("Invalid message text").kind(),
            FailureKind::InvalidInput
        );
        assert_eq!(
            CivicMapError::persistence("disk full").kind(),
            FailureKind::Internal
        );
        assert_eq!(
            CivicMapError::Geocoding("REQUEST_DENIED".into()).kind(),
            FailureKind::Internal
        );
    }
}
