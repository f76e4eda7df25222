// crates/prober/src/prober.rs
//! Dual-strategy bucket access prober

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use buckscan_common::{
    AnonymousHttp, BucketName, CredentialLister, Existence, ManifestEntry, ProbeOptions,
    ProbeVerdict, Prober,
};
use crate::listing::parse_listing;

/// Merges a credentialed listing with anonymous HTTP probing.
///
/// Existence is confirmed by either strategy. Once confirmed, the anonymous
/// read and write probes run; each one that fails only clears its own flag.
pub struct BucketProber {
    lister: Arc<dyn CredentialLister>,
    http: Arc<dyn AnonymousHttp>,
    options: ProbeOptions,
}

impl BucketProber {
    pub fn new(
        lister: Arc<dyn CredentialLister>,
        http: Arc<dyn AnonymousHttp>,
        options: ProbeOptions,
    ) -> Self {
        Self {
            lister,
            http,
            options,
        }
    }

    /// Anonymous GET. Returns readability and, when readable, the body.
    async fn read_probe(&self, endpoint: &str) -> (bool, Vec<u8>) {
        match self.http.fetch(endpoint).await {
            Ok(resp) if resp.success => (true, resp.body),
            Ok(_) => (false, Vec::new()),
            Err(e) => {
                debug!("Read probe on {} abstained: {}", endpoint, e);
                (false, Vec::new())
            }
        }
    }

    async fn write_probe(&self, endpoint: &str) -> bool {
        if !self.options.write_probe {
            return false;
        }
        let key = format!(
            "permission_test_{}_{}",
            Utc::now().timestamp(),
            uuid::Uuid::new_v4().simple()
        );
        match self.http.try_write(endpoint, &key).await {
            Ok(ok) => ok,
            Err(e) => {
                debug!("Write probe on {} abstained: {}", endpoint, e);
                false
            }
        }
    }

    fn manifest_from_body(&self, name: &BucketName, body: &[u8]) -> Vec<ManifestEntry> {
        match parse_listing(body) {
            Ok(mut entries) => {
                entries.truncate(self.options.manifest_limit);
                entries
            }
            Err(e) => {
                debug!("Listing body for {} not parsed: {}", name, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Prober for BucketProber {
    #[instrument(skip(self, name), fields(bucket = %name))]
    async fn probe(&self, name: &BucketName) -> ProbeVerdict {
        let endpoint = self.options.endpoint_for(name);

        let (listing, http_existence) = tokio::join!(
            self.lister.list(name),
            self.http.check_exists(&endpoint)
        );

        let (credential_exists, credential_read, mut manifest) = match listing {
            Ok(entries) => (Some(true), true, entries),
            Err(failure) => {
                debug!("Credentialed listing: {:?}", failure);
                (failure.implies_exists(), false, Vec::new())
            }
        };

        let exists = credential_exists == Some(true) || http_existence == Existence::Found;
        if !exists {
            debug!("Bucket not found");
            return ProbeVerdict::not_found(name.clone());
        }

        let ((public_read, body), public_write) =
            tokio::join!(self.read_probe(&endpoint), self.write_probe(&endpoint));

        if public_read && !credential_read {
            manifest = self.manifest_from_body(name, &body);
        }

        info!(
            public_read,
            public_write,
            credential_read,
            entries = manifest.len(),
            "Bucket found"
        );

        ProbeVerdict::found(name.clone())
            .with_public_read(public_read)
            .with_public_write(public_write)
            .with_credential_read(credential_read)
            .with_manifest(manifest)
    }

    fn name(&self) -> &str {
        "S3 Bucket Prober"
    }
}
