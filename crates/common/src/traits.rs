//! Core traits for buckscan components
//!
//! The prober only talks to the outside world through `CredentialLister` and
//! `AnonymousHttp`, so both transports can be swapped for in-memory fakes.

use crate::error::{BuckscanResult, ListingFailure};
use crate::types::{BucketName, ManifestEntry, ProbeVerdict};
use async_trait::async_trait;

/// Classifies one bucket name. Never fails: per-operation problems abstain.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, name: &BucketName) -> ProbeVerdict;

    /// Prober name/identifier
    fn name(&self) -> &str;
}

/// Lists a bucket with the caller's ambient credentials.
#[async_trait]
pub trait CredentialLister: Send + Sync {
    async fn list(&self, bucket: &BucketName) -> Result<Vec<ManifestEntry>, ListingFailure>;
}

/// Outcome of the anonymous existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Found,
    NotFound,
    /// Transport failure; the HTTP strategy abstains.
    Unknown,
}

/// Response of an anonymous content fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub success: bool,
    pub body: Vec<u8>,
}

/// Anonymous HTTP operations against a virtual-hosted bucket endpoint.
#[async_trait]
pub trait AnonymousHttp: Send + Sync {
    /// Existence probe without fetching a body.
    async fn check_exists(&self, endpoint: &str) -> Existence;

    /// Anonymous GET of the endpoint.
    async fn fetch(&self, endpoint: &str) -> BuckscanResult<FetchResponse>;

    /// Anonymous PUT of a small object under `key`. `Ok(true)` on a success status.
    async fn try_write(&self, endpoint: &str, key: &str) -> BuckscanResult<bool>;
}
