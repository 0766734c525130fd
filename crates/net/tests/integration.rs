//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use crucible_errors::{Error, SourceError};
    use crucible_net::*;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_download_file() {
        let server = MockServer::start();

        let content = b"test archive content";
        let mock = server.mock(|when, then| {
            when.method(GET).path("/soci-4.0.0.tar.gz");
            then.status(200)
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("cache").join("soci-4.0.0.tar.gz");
        let client = NetClient::with_defaults().unwrap();
        let url = server.url("/soci-4.0.0.tar.gz");

        let result = download_file(&client, &url, &dest).await.unwrap();

        mock.assert();
        assert_eq!(result.size, content.len() as u64);
        assert_eq!(result.sha256.len(), 64);

        let downloaded = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(downloaded, content);
    }

    #[tokio::test]
    async fn test_download_same_content_same_hash() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a");
            then.status(200).body("same");
        });
        server.mock(|when, then| {
            when.method(GET).path("/b");
            then.status(200).body("same");
        });

        let temp = tempdir().unwrap();
        let client = NetClient::with_defaults().unwrap();
        let a = download_file(&client, &server.url("/a"), &temp.path().join("a"))
            .await
            .unwrap();
        let b = download_file(&client, &server.url("/b"), &temp.path().join("b"))
            .await
            .unwrap();
        assert_eq!(a.sha256, b.sha256);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.tar.gz");
            then.status(404);
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("missing.tar.gz");
        let client = NetClient::with_defaults().unwrap();

        let err = download_file(&client, &server.url("/missing.tar.gz"), &dest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::HttpStatus { status: 404, .. })
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let temp = tempdir().unwrap();
        let client = NetClient::with_defaults().unwrap();
        let err = download_file(&client, "not a url", &temp.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Source(SourceError::InvalidUrl { .. })));
    }
}
