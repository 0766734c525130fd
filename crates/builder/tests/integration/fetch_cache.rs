//! Download cache and checksum verification

use super::support::{sha256_hex, write_tar_gz};
use crucible_builder::SourceFetcher;
use crucible_config::SourceEntry;
use crucible_errors::{Error, SourceError};
use crucible_net::NetClient;
use httpmock::prelude::*;

fn archive_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.tar.gz");
    write_tar_gz(&path, &[("pkg-1.0/README", "hello\n")]);
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_download_then_reuse_cache() {
    let server = MockServer::start();
    let body = archive_bytes();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/pkg-1.0.tar.gz");
        then.status(200).body(body.clone());
    });

    let cache = tempfile::tempdir().unwrap();
    let fetcher = SourceFetcher::new(NetClient::with_defaults().unwrap(), cache.path().into());
    let entry = SourceEntry {
        url: server.url("/pkg-1.0.tar.gz"),
        sha256: sha256_hex(&body),
        filename: None,
    };

    let first = fetcher.fetch("pkg", &entry).await.unwrap();
    assert_eq!(first, cache.path().join("pkg").join("pkg-1.0.tar.gz"));

    let offline = fetcher.clone().with_network_access(false);
    let second = offline.fetch("pkg", &entry).await.unwrap();
    assert_eq!(first, second);
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_checksum_mismatch_deletes_download() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/pkg-1.0.tar.gz");
        then.status(200).body(archive_bytes());
    });

    let cache = tempfile::tempdir().unwrap();
    let fetcher = SourceFetcher::new(NetClient::with_defaults().unwrap(), cache.path().into());
    let entry = SourceEntry {
        url: server.url("/pkg-1.0.tar.gz"),
        sha256: "0".repeat(64),
        filename: None,
    };

    let err = fetcher.fetch("pkg", &entry).await.unwrap_err();
    assert!(matches!(err, Error::Source(SourceError::ChecksumMismatch { .. })));
    assert!(!fetcher.cache_path("pkg", &entry).exists());
    let leftovers = std::fs::read_dir(cache.path().join("pkg")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_refetched() {
    let server = MockServer::start();
    let body = archive_bytes();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/pkg-1.0.tar.gz");
        then.status(200).body(body.clone());
    });

    let cache = tempfile::tempdir().unwrap();
    let fetcher = SourceFetcher::new(NetClient::with_defaults().unwrap(), cache.path().into());
    let entry = SourceEntry {
        url: server.url("/pkg-1.0.tar.gz"),
        sha256: sha256_hex(&body),
        filename: None,
    };
    let cached = fetcher.cache_path("pkg", &entry);
    std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
    std::fs::write(&cached, b"truncated").unwrap();

    fetcher.fetch("pkg", &entry).await.unwrap();
    assert_eq!(std::fs::read(&cached).unwrap(), body);
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_http_error_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.tar.gz");
        then.status(404);
    });

    let cache = tempfile::tempdir().unwrap();
    let fetcher = SourceFetcher::new(NetClient::with_defaults().unwrap(), cache.path().into());
    let entry = SourceEntry {
        url: server.url("/missing.tar.gz"),
        sha256: "0".repeat(64),
        filename: None,
    };
    let err = fetcher.fetch("pkg", &entry).await.unwrap_err();
    assert!(matches!(err, Error::Source(SourceError::HttpStatus { status: 404, .. })));
}
