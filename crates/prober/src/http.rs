//! Anonymous HTTP operations backed by reqwest

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use buckscan_common::{AnonymousHttp, BuckscanError, BuckscanResult, Existence, FetchResponse};

const WRITE_PROBE_BODY: &str = "test";

/// reqwest client with one fixed timeout applied to every request.
pub struct ReqwestHttp {
    client: Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> BuckscanResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BuckscanError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn transport_error(e: reqwest::Error) -> BuckscanError {
    if e.is_timeout() {
        BuckscanError::Timeout(e.to_string())
    } else {
        BuckscanError::Network(e.to_string())
    }
}

#[async_trait]
impl AnonymousHttp for ReqwestHttp {
    async fn check_exists(&self, endpoint: &str) -> Existence {
        match self.client.head(endpoint).send().await {
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => Existence::NotFound,
            Ok(resp) => {
                debug!("HEAD {} -> {}", endpoint, resp.status());
                Existence::Found
            }
            Err(e) => {
                debug!("HEAD {} failed: {}", endpoint, e);
                Existence::Unknown
            }
        }
    }

    async fn fetch(&self, endpoint: &str) -> BuckscanResult<FetchResponse> {
        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(transport_error)?;
        let success = resp.status().is_success();

        // status alone decides readability; a broken body only loses the manifest
        let body = match resp.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                debug!("GET {} body read failed: {}", endpoint, e);
                Vec::new()
            }
        };
        Ok(FetchResponse { success, body })
    }

    async fn try_write(&self, endpoint: &str, key: &str) -> BuckscanResult<bool> {
        let resp = self
            .client
            .put(format!("{endpoint}/{key}"))
            .body(WRITE_PROBE_BODY)
            .send()
            .await
            .map_err(transport_error)?;
        debug!("PUT {}/{} -> {}", endpoint, key, resp.status());
        Ok(resp.status().is_success())
    }
}
