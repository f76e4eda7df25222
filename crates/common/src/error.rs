//! Error types for buckscan
//!
//! Probe-level failures never abort a scan; these errors describe why a single
//! operation abstained.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuckscanError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Invalid bucket name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for buckscan operations
pub type BuckscanResult<T> = Result<T, BuckscanError>;

/// Why a credentialed listing did not produce a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingFailure {
    /// The bucket does not exist.
    NotFound,
    /// The bucket exists but the caller may not list it.
    AccessDenied,
    /// Anything else; the listing strategy abstains.
    Other(String),
}

impl ListingFailure {
    /// Classify a free-form failure message by its well-known markers.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("nosuchbucket") || lower.contains("no such bucket") {
            ListingFailure::NotFound
        } else if lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("allaccessdisabled")
            || lower.contains("all access disabled")
        {
            ListingFailure::AccessDenied
        } else {
            ListingFailure::Other(message.to_string())
        }
    }

    /// Existence implied by this failure: `Some(true)` when denied, `None` when it abstains.
    pub fn implies_exists(&self) -> Option<bool> {
        match self {
            ListingFailure::NotFound => Some(false),
            ListingFailure::AccessDenied => Some(true),
            ListingFailure::Other(_) => None,
        }
    }
}
