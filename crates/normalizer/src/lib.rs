//! Bucket name normalization and input sources
//!
//! Turns raw candidate strings into canonical [`BucketName`]s. Accepted forms:
//! - bare name: "flaws.cloud"
//! - URL: "https://flaws.cloud/index.html"
//! - bucket URI: "s3://flaws.cloud/"
//!
//! Empty results and wildcard entries ("*.example.com") are skipped, never errors.

use anyhow::Result;
use buckscan_common::{BucketName, NormalizeOptions};
use futures::future::ready;
use futures::stream::{BoxStream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

const SCHEMES: [&str; 3] = ["http://", "https://", "s3://"];

/// Normalize one raw candidate. `None` means skip (and do not count).
pub fn normalize(raw: &str, opts: &NormalizeOptions) -> Option<BucketName> {
    let mut s = raw.trim();

    for scheme in SCHEMES {
        if s.get(..scheme.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(scheme))
        {
            s = &s[scheme.len()..];
            break;
        }
    }

    // host label only; also drops a trailing separator
    if let Some(idx) = s.find('/') {
        s = &s[..idx];
    }
    let s = s.trim();

    if opts.lowercase {
        BucketName::new(s.to_lowercase())
    } else {
        BucketName::new(s)
    }
}

/// Resolve the single command-line argument form. A skipped name is a usage error.
pub fn resolve_single(arg: &str, opts: &NormalizeOptions) -> Result<BucketName> {
    match normalize(arg, opts) {
        Some(name) => Ok(name),
        None => anyhow::bail!("'{}' does not name a bucket", arg.trim()),
    }
}

/// Lazily read candidate lines and yield normalized names.
///
/// Skipped lines are dropped here. A read error ends the stream.
pub fn name_stream<R>(reader: R, opts: NormalizeOptions) -> BoxStream<'static, BucketName>
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    LinesStream::new(reader.lines())
        .scan((), |_, line| {
            ready(match line {
                Ok(l) => Some(l),
                Err(e) => {
                    warn!("Error reading input: {}", e);
                    None
                }
            })
        })
        .filter_map(move |raw| {
            let name = normalize(&raw, &opts);
            if name.is_none() && !raw.trim().is_empty() {
                debug!("Skipping candidate {:?}", raw);
            }
            ready(name)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> Option<String> {
        normalize(s, &NormalizeOptions::default()).map(|n| n.as_str().to_string())
    }

    #[test]
    fn test_strip_scheme_and_path() {
        assert_eq!(norm("https://example.bucket/"), norm("example.bucket"));
        assert_eq!(norm("http://flaws.cloud/index.html").as_deref(), Some("flaws.cloud"));
        assert_eq!(norm("s3://my-bucket/some/key").as_deref(), Some("my-bucket"));
        assert_eq!(norm("HTTPS://Flaws.Cloud").as_deref(), Some("flaws.cloud"));
    }

    #[test]
    fn test_trim_whitespace() {
        assert_eq!(norm("   flaws.cloud  \t").as_deref(), Some("flaws.cloud"));
        assert_eq!(norm("https:// spaced.bucket /x").as_deref(), Some("spaced.bucket"));
    }

    #[test]
    fn test_skip_empty_and_wildcard() {
        assert_eq!(norm(""), None);
        assert_eq!(norm("   "), None);
        assert_eq!(norm("https://"), None);
        assert_eq!(norm("/path/only"), None);
        assert_eq!(norm("*.example.com"), None);
        assert_eq!(norm("https://*.example.com/"), None);
    }

    #[test]
    fn test_keep_case_option() {
        let opts = NormalizeOptions { lowercase: false };
        let n = normalize("https://MixedCase.Bucket/", &opts).unwrap();
        assert_eq!(n.as_str(), "MixedCase.Bucket");
    }

    #[test]
    fn test_resolve_single() {
        let opts = NormalizeOptions::default();
        assert_eq!(resolve_single("flaws.cloud", &opts).unwrap().as_str(), "flaws.cloud");
        assert!(resolve_single("*.flaws.cloud", &opts).is_err());
        assert!(resolve_single("  ", &opts).is_err());
    }

    #[tokio::test]
    async fn test_name_stream_skips_uncounted_lines() {
        let input = "flaws.cloud\n\n*.wild.example\nhttps://Other.Bucket/path\n  \nlast\n";
        let reader = tokio::io::BufReader::new(input.as_bytes());
        let names: Vec<String> = name_stream(reader, NormalizeOptions::default())
            .map(|n| n.as_str().to_string())
            .collect()
            .await;
        assert_eq!(names, vec!["flaws.cloud", "other.bucket", "last"]);
    }
}
