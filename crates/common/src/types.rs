//! Core data types for the buckscan probing engine
//!
//! - `BucketName` is the canonical form every pipeline stage agrees on
//! - `ProbeVerdict` is produced once per name and never mutated afterwards
//! - `ScanStats` is the single contended counter set shared by result consumers
//!
//! Option structs live here too so the prober, the orchestrator and the CLI
//! read the same defaults.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::BuckscanError;

/// Lower bound for the worker pool size.
pub const MIN_WORKERS: usize = 1;
/// Upper bound for the worker pool size.
pub const MAX_WORKERS: usize = 100;
/// Worker count used when none is requested.
pub const DEFAULT_WORKERS: usize = 10;
/// Fixed per-request timeout shared by every anonymous HTTP operation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Canonical bucket name.
///
/// Never empty and never starts with `*`. Only the normalizer (and tests)
/// should construct one; use [`BucketName::new`] which enforces both rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Wrap an already-normalized name. Returns `None` for empty or wildcard names.
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Option<Self> {
        let name = name.into();
        if name.is_empty() || name.starts_with('*') {
            None
        } else {
            Some(Self(name))
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BucketName {
    type Error = BuckscanError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name.clone()).ok_or(BuckscanError::InvalidName(name))
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One object entry returned by a successful listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ManifestEntry {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(name: S, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_last_modified(mut self, ts: DateTime<Utc>) -> Self {
        self.last_modified = Some(ts);
        self
    }
}

/// Final classification for one bucket name.
///
/// Access flags and the manifest only carry meaning when `exists` is true.
/// Fields are private so a verdict cannot be edited once the prober hands it out.
/// Serialize-only: the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeVerdict {
    name: BucketName,
    exists: bool,
    public_read: bool,
    public_write: bool,
    credential_read: bool,
    manifest: Vec<ManifestEntry>,
}

impl ProbeVerdict {
    /// Verdict for a bucket neither strategy could find.
    #[must_use]
    pub fn not_found(name: BucketName) -> Self {
        Self {
            name,
            exists: false,
            public_read: false,
            public_write: false,
            credential_read: false,
            manifest: Vec::new(),
        }
    }

    /// Verdict for a bucket that exists. Access flags start out `false`.
    #[must_use]
    pub fn found(name: BucketName) -> Self {
        Self {
            exists: true,
            ..Self::not_found(name)
        }
    }

    #[inline]
    #[must_use]
    pub fn with_public_read(mut self, v: bool) -> Self {
        self.public_read = self.exists && v;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_public_write(mut self, v: bool) -> Self {
        self.public_write = self.exists && v;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_credential_read(mut self, v: bool) -> Self {
        self.credential_read = self.exists && v;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_manifest(mut self, manifest: Vec<ManifestEntry>) -> Self {
        if self.exists {
            self.manifest = manifest;
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &BucketName {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    #[inline]
    #[must_use]
    pub const fn public_read(&self) -> bool {
        self.public_read
    }

    #[inline]
    #[must_use]
    pub const fn public_write(&self) -> bool {
        self.public_write
    }

    #[inline]
    #[must_use]
    pub const fn credential_read(&self) -> bool {
        self.credential_read
    }

    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    /// True when the bucket exists and at least one access path is open.
    #[inline]
    #[must_use]
    pub const fn is_accessible(&self) -> bool {
        self.exists && (self.public_read || self.public_write || self.credential_read)
    }
}

/// Point-in-time copy of the scan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub found: u64,
    pub not_found: u64,
    pub with_public_read: u64,
    pub with_public_write: u64,
    pub with_credential_read: u64,
}

impl StatsSnapshot {
    /// Apply one verdict. Counters only ever grow.
    pub fn record(&mut self, verdict: &ProbeVerdict) {
        self.total = self.total.saturating_add(1);
        if !verdict.exists() {
            self.not_found = self.not_found.saturating_add(1);
            return;
        }
        self.found = self.found.saturating_add(1);
        if verdict.public_read() {
            self.with_public_read = self.with_public_read.saturating_add(1);
        }
        if verdict.public_write() {
            self.with_public_write = self.with_public_write.saturating_add(1);
        }
        if verdict.credential_read() {
            self.with_credential_read = self.with_credential_read.saturating_add(1);
        }
    }

    /// `total == found + not_found`; holds whenever no `observe` is mid-flight.
    #[inline]
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total == self.found + self.not_found
    }
}

/// Thread-safe running tally for one scan.
///
/// All six counters sit behind one lock so a snapshot never sees half of an update.
#[derive(Debug, Default)]
pub struct ScanStats {
    inner: Mutex<StatsSnapshot>,
}

impl ScanStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a verdict into the tally and return the counters as of that update.
    /// Safe to call from many tasks at once.
    pub fn observe(&self, verdict: &ProbeVerdict) -> StatsSnapshot {
        let mut guard = self.inner.lock();
        guard.record(verdict);
        *guard
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock()
    }
}

/// Tuning for a single bucket probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Per-request timeout, not cumulative across the HTTP operations.
    pub timeout: Duration,
    /// Host suffix for virtual-hosted endpoints (`{bucket}.{suffix}`).
    pub endpoint_suffix: String,
    pub scheme: String,
    /// Cap on manifest entries collected from a credentialed listing.
    pub manifest_limit: usize,
    /// Issue the anonymous write probe. Turning it off leaves `public_write` false.
    pub write_probe: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            endpoint_suffix: "s3.amazonaws.com".to_string(),
            scheme: "http".to_string(),
            manifest_limit: 1000,
            write_probe: true,
        }
    }
}

impl ProbeOptions {
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_endpoint_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.endpoint_suffix = suffix.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_write_probe(mut self, enabled: bool) -> Self {
        self.write_probe = enabled;
        self
    }

    /// Virtual-hosted-style endpoint for a bucket.
    #[must_use]
    pub fn endpoint_for(&self, name: &BucketName) -> String {
        format!("{}://{}.{}", self.scheme, name, self.endpoint_suffix)
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolOptions {
    pub workers: usize,
    /// Capacity of both the job queue and the result queue. `None` means twice the worker count.
    pub queue_depth: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_depth: None,
        }
    }
}

impl PoolOptions {
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    /// Requested worker count clamped into `MIN_WORKERS..=MAX_WORKERS`.
    #[inline]
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(MIN_WORKERS, MAX_WORKERS)
    }

    #[inline]
    #[must_use]
    pub fn effective_queue_depth(&self) -> usize {
        self.queue_depth
            .unwrap_or_else(|| self.effective_workers() * 2)
            .max(1)
    }
}

/// How raw candidate lines become bucket names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalizeOptions {
    pub lowercase: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { lowercase: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn name(s: &str) -> BucketName {
        BucketName::new(s).unwrap()
    }

    #[test]
    fn bucket_name_rejects_empty_and_wildcard() {
        assert!(BucketName::new("").is_none());
        assert!(BucketName::new("*.example.com").is_none());
        assert_eq!(name("flaws.cloud").as_str(), "flaws.cloud");
    }

    #[test]
    fn missing_bucket_carries_no_access() {
        let v = ProbeVerdict::not_found(name("nope"))
            .with_public_read(true)
            .with_public_write(true)
            .with_credential_read(true)
            .with_manifest(vec![ManifestEntry::new("a", 1)]);
        assert!(!v.exists());
        assert!(!v.public_read() && !v.public_write() && !v.credential_read());
        assert!(v.manifest().is_empty());
        assert!(!v.is_accessible());
    }

    #[test]
    fn locked_down_bucket_is_found_but_not_accessible() {
        let v = ProbeVerdict::found(name("locked"));
        assert!(v.exists());
        assert!(!v.is_accessible());
    }

    #[test]
    fn stats_observe_counts() {
        let stats = ScanStats::new();
        stats.observe(&ProbeVerdict::not_found(name("a")));
        stats.observe(&ProbeVerdict::found(name("b")));
        stats.observe(
            &ProbeVerdict::found(name("c"))
                .with_public_read(true)
                .with_public_write(true)
                .with_credential_read(true),
        );

        let s = stats.snapshot();
        assert_eq!(s.total, 3);
        assert_eq!(s.found, 2);
        assert_eq!(s.not_found, 1);
        assert_eq!(s.with_public_read, 1);
        assert_eq!(s.with_public_write, 1);
        assert_eq!(s.with_credential_read, 1);
        assert!(s.is_consistent());
    }

    #[test]
    fn stats_observe_from_many_threads() {
        let stats = Arc::new(ScanStats::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for j in 0..250 {
                        let n = name(&format!("b-{i}-{j}"));
                        let v = if j % 2 == 0 {
                            ProbeVerdict::found(n).with_public_read(true)
                        } else {
                            ProbeVerdict::not_found(n)
                        };
                        stats.observe(&v);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let s = stats.snapshot();
        assert_eq!(s.total, 2000);
        assert_eq!(s.found, 1000);
        assert_eq!(s.with_public_read, 1000);
        assert!(s.is_consistent());
    }

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(PoolOptions::default().with_workers(0).effective_workers(), 1);
        assert_eq!(PoolOptions::default().with_workers(500).effective_workers(), 100);
        assert_eq!(PoolOptions::default().with_workers(20).effective_workers(), 20);
        assert_eq!(PoolOptions::default().with_workers(20).effective_queue_depth(), 40);
        assert_eq!(PoolOptions::default().with_queue_depth(0).effective_queue_depth(), 1);
    }

    #[test]
    fn endpoint_is_virtual_hosted() {
        let opts = ProbeOptions::default();
        assert_eq!(
            opts.endpoint_for(&name("flaws.cloud")),
            "http://flaws.cloud.s3.amazonaws.com"
        );
        assert_eq!(opts.timeout, Duration::from_secs(10));
    }

    #[test]
    fn bucket_name_deserialization_keeps_rules() {
        let ok: BucketName = serde_json::from_str("\"flaws.cloud\"").unwrap();
        assert_eq!(ok, name("flaws.cloud"));
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"flaws.cloud\"");

        assert!(serde_json::from_str::<BucketName>("\"\"").is_err());
        assert!(serde_json::from_str::<BucketName>("\"*.example.com\"").is_err());
    }

    #[test]
    fn verdict_serializes_name_as_string() {
        let v = ProbeVerdict::found(name("flaws.cloud")).with_credential_read(true);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["name"], "flaws.cloud");
        assert_eq!(json["credential_read"], true);
    }
}
