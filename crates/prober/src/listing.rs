//! Anonymous bucket listing documents (`ListBucketResult`)

use buckscan_common::{BuckscanError, BuckscanResult, ManifestEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<Contents>,
}

#[derive(Debug, Deserialize)]
struct Contents {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "LastModified", default)]
    last_modified: Option<String>,
    #[serde(rename = "Size", default)]
    size: u64,
}

/// Parse a listing body into manifest entries, in document order.
pub fn parse_listing(body: &[u8]) -> BuckscanResult<Vec<ManifestEntry>> {
    let text = std::str::from_utf8(body).map_err(|e| BuckscanError::Parse(e.to_string()))?;
    // error documents and HTML pages share no root with a listing
    if !text.contains("<ListBucketResult") {
        return Err(BuckscanError::Parse("not a ListBucketResult document".into()));
    }

    let doc: ListBucketResult =
        quick_xml::de::from_str(text).map_err(|e| BuckscanError::Parse(e.to_string()))?;

    Ok(doc
        .contents
        .into_iter()
        .map(|c| {
            let entry = ManifestEntry::new(c.key, c.size);
            match c.last_modified.as_deref().and_then(parse_timestamp) {
                Some(ts) => entry.with_last_modified(ts),
                None => entry,
            }
        })
        .collect())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
