#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for crucible
//!
//! Source archives are fetched over HTTP(S) and hashed while they stream to
//! disk. There is no retry logic: a failed download is fatal.

mod client;

pub use client::{DownloadResult, NetClient, NetConfig};

use crucible_errors::{Error, SourceError};
use std::path::Path;
use url::Url;

/// Download a file, hashing it on the way
///
/// # Errors
///
/// Returns an error if the URL is invalid, the download fails, or there are
/// I/O errors while writing the file.
pub async fn download_file(
    client: &NetClient,
    url: &str,
    dest: &Path,
) -> Result<DownloadResult, Error> {
    let url = parse_url(url)?;
    client.download_to(url.as_str(), dest).await
}

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or its scheme is not
/// `http` or `https`.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|_| SourceError::InvalidUrl {
        url: url.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(SourceError::InvalidUrl {
            url: url.to_string(),
        }
        .into()),
    }
}
