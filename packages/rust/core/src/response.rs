//! Caller-facing failure descriptions.

use civicmap_shared::{CivicMapError, FailureKind};
use serde::Serialize;

/// A failure as reported to whoever submitted the text.
///
/// Extraction failures and incomplete geocoding get their own codes;
/// everything else collapses to a generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureResponse {
    pub code: &'static str,
    pub message: String,
    /// Labels of locations that could not be placed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&CivicMapError> for FailureResponse {
    fn from(err: &CivicMapError) -> Self {
        match (err.kind(), err) {
            (FailureKind::GeocodingIncomplete, CivicMapError::GeocodingIncomplete { missing }) => {
                Self {
                    code: "GEOCODING_INCOMPLETE",
                    message: "Failed to geocode some addresses".into(),
                    missing: missing.clone(),
                    details: None,
                }
            }
            (FailureKind::Extraction, _) => Self {
                code: "EXTRACTION_FAILED",
                message: "Failed to extract locations from message".into(),
                missing: Vec::new(),
                details: Some(err.to_string()),
            },
            (FailureKind::InvalidInput, CivicMapError::Validation { message }) => Self {
                code: "INVALID_INPUT",
                message: message.clone(),
                missing: Vec::new(),
                details: None,
            },
            _ => Self {
                code: "INTERNAL_ERROR",
                message: "Failed to create message".into(),
                missing: Vec::new(),
                details: Some(err.to_string()),
            },
        }
    }
}
