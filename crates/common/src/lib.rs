//! Buckscan Common - Shared types and traits
//!
//! This crate provides the data model, option structs, error types and
//! collaborator traits used across the buckscan crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{BuckscanError, BuckscanResult, ListingFailure};
pub use traits::{AnonymousHttp, CredentialLister, Existence, FetchResponse, Prober};
pub use types::{
    BucketName, ManifestEntry, NormalizeOptions, PoolOptions, ProbeOptions, ProbeVerdict,
    ScanStats, StatsSnapshot, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
