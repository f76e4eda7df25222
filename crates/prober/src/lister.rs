//! Credentialed listing through the AWS SDK

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use buckscan_common::{BucketName, CredentialLister, ListingFailure, ManifestEntry, ProbeOptions};

const FALLBACK_REGION: &str = "us-east-1";
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";
/// Error codes S3 returns when a request reached the wrong region.
const WRONG_REGION_CODES: &[&str] = &[
    "PermanentRedirect",
    "AuthorizationHeaderMalformed",
    "IllegalLocationConstraintException",
];

/// Lists top-level objects with the ambient AWS credential chain.
///
/// The SDK does not follow cross-region redirects, so a bucket living in
/// another region is listed again through a client pinned to that region.
pub struct S3Lister {
    client: Client,
    regional: Mutex<HashMap<String, Client>>,
    page_timeout: Duration,
    limit: usize,
}

/// Why the first page of a listing did not arrive.
enum FirstPage {
    /// The bucket lives in this other region.
    Redirect(String),
    Failed(ListingFailure),
}

impl S3Lister {
    pub fn new(client: Client, options: &ProbeOptions) -> Self {
        Self {
            client,
            regional: Mutex::new(HashMap::new()),
            page_timeout: options.timeout,
            limit: options.manifest_limit,
        }
    }

    /// Build a client from the default chain, optionally pinned to a profile and region.
    pub async fn from_env(
        profile: Option<&str>,
        region: Option<&str>,
        options: &ProbeOptions,
    ) -> Self {
        let region_chain = RegionProviderChain::first_try(region.map(|r| Region::new(r.to_owned())))
            .or_default_provider()
            .or_else(Region::new(FALLBACK_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_chain);
        if let Some(p) = profile {
            loader = loader.profile_name(p);
        }
        let config = loader.load().await;
        Self::new(Client::new(&config), options)
    }

    /// Client for `region`, built once from the base client's configuration.
    fn regional_client(&self, region: &str) -> Client {
        self.regional
            .lock()
            .entry(region.to_owned())
            .or_insert_with(|| {
                let config = self
                    .client
                    .config()
                    .to_builder()
                    .region(Region::new(region.to_owned()))
                    .build();
                Client::from_conf(config)
            })
            .clone()
    }

    async fn list_with(
        &self,
        client: &Client,
        bucket: &BucketName,
    ) -> Result<Vec<ManifestEntry>, FirstPage> {
        let mut pages = client
            .list_objects_v2()
            .bucket(bucket.as_str())
            .delimiter("/")
            .into_paginator()
            .send();

        let mut entries = Vec::new();
        let mut listed = false;
        loop {
            let page = match timeout(self.page_timeout, pages.next()).await {
                Ok(Some(Ok(page))) => page,
                Ok(None) => break,
                Ok(Some(Err(e))) if !listed => {
                    return Err(match redirect_region(&e) {
                        Some(region) => FirstPage::Redirect(region),
                        None => FirstPage::Failed(classify(&e)),
                    })
                }
                Err(_) if !listed => {
                    return Err(FirstPage::Failed(ListingFailure::Other(
                        "listing timed out".into(),
                    )))
                }
                // later pages failing still leave a readable bucket
                Ok(Some(Err(e))) => {
                    debug!("Listing {} stopped early: {}", bucket, DisplayErrorContext(&e));
                    break;
                }
                Err(_) => {
                    debug!("Listing {} stopped early: timeout", bucket);
                    break;
                }
            };
            listed = true;

            for obj in page.contents() {
                let Some(key) = obj.key() else { continue };
                let size = obj.size().unwrap_or_default().max(0) as u64;
                let mut entry = ManifestEntry::new(key, size);
                if let Some(ts) = obj.last_modified().and_then(to_utc) {
                    entry = entry.with_last_modified(ts);
                }
                entries.push(entry);
                if entries.len() >= self.limit {
                    return Ok(entries);
                }
            }
        }

        Ok(entries)
    }
}

/// Region named by a wrong-region response, if this is one.
fn redirect_region(err: &SdkError<ListObjectsV2Error>) -> Option<String> {
    let raw = err.raw_response()?;
    let wrong_region = raw.status().as_u16() == 301
        || err.code().is_some_and(|c| WRONG_REGION_CODES.contains(&c));
    if !wrong_region {
        return None;
    }
    raw.headers()
        .get(BUCKET_REGION_HEADER)
        .filter(|r| !r.is_empty())
        .map(str::to_owned)
}

fn classify(err: &SdkError<ListObjectsV2Error>) -> ListingFailure {
    match err.code() {
        Some("NoSuchBucket") => ListingFailure::NotFound,
        Some("AccessDenied") | Some("AllAccessDisabled") => ListingFailure::AccessDenied,
        _ => ListingFailure::from_message(&DisplayErrorContext(err).to_string()),
    }
}

fn to_utc(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl CredentialLister for S3Lister {
    async fn list(&self, bucket: &BucketName) -> Result<Vec<ManifestEntry>, ListingFailure> {
        match self.list_with(&self.client, bucket).await {
            Ok(entries) => Ok(entries),
            Err(FirstPage::Failed(failure)) => Err(failure),
            Err(FirstPage::Redirect(region)) => {
                debug!("Bucket {} lives in {}; listing there", bucket, region);
                let client = self.regional_client(&region);
                // one hop only
                self.list_with(&client, bucket).await.map_err(|e| match e {
                    FirstPage::Failed(failure) => failure,
                    FirstPage::Redirect(again) => {
                        ListingFailure::Other(format!("redirected again to {again}"))
                    }
                })
            }
        }
    }
}

/// Stand-in used when credentialed listing is turned off; always abstains.
#[derive(Debug, Default)]
pub struct DisabledLister;

#[async_trait]
impl CredentialLister for DisabledLister {
    async fn list(&self, _bucket: &BucketName) -> Result<Vec<ManifestEntry>, ListingFailure> {
        Err(ListingFailure::Other("credentialed listing disabled".into()))
    }
}
