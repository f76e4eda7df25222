//! Bucket access prober
//!
//! `BucketProber` classifies one bucket name with two independent strategies:
//! - a credentialed listing (`S3Lister`, or `DisabledLister` when turned off)
//! - anonymous HTTP probing of the virtual-hosted endpoint (`ReqwestHttp`)

mod http;
mod lister;
mod listing;
mod prober;
#[cfg(test)]
mod test_server;

pub use http::ReqwestHttp;
pub use lister::{DisabledLister, S3Lister};
pub use listing::parse_listing;
pub use prober::BucketProber;
