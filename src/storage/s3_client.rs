// S3-compatible object store backed by rust-s3

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;
use tracing::{debug, info};

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::types::{StorageError, StorageResult};

/// Object store for AWS S3 and S3-compatible services such as MinIO.
pub struct S3Store {
    name: String,
    bucket: Bucket,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            None => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: format!("https://s3.{}.amazonaws.com", config.s3_region),
            },
        };

        // With no static keys the client falls back to its default chain
        // (environment, profile, instance metadata).
        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )?;

        let mut bucket: Bucket = Bucket::new(&config.s3_bucket, region, credentials)?;
        if config.s3_path_style {
            bucket = bucket.with_path_style();
        }

        info!(
            bucket = %config.s3_bucket,
            region = %config.s3_region,
            endpoint = ?config.s3_endpoint,
            path_style = config.s3_path_style,
            "S3 object store initialized"
        );

        Ok(Self {
            name: config.s3_bucket.clone(),
            bucket,
        })
    }
}

/// Maps a backend failure for `name`, turning HTTP 404 into `NotFound`.
fn map_object_error(name: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(name.to_string()),
        other => StorageError::S3(other),
    }
}

fn check_status(name: &str, status: u16) -> StorageResult<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(name.to_string())),
        code => Err(StorageError::Backend(format!(
            "unexpected status {} for object {}",
            code, name
        ))),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.name
    }

    async fn put_object(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        debug!(object = %name, bytes = data.len(), content_type = %content_type, "PUT object");
        let response = self
            .bucket
            .put_object_with_content_type(name, &data, content_type)
            .await?;
        check_status(name, response.status_code())
    }

    async fn get_object(&self, name: &str) -> StorageResult<Bytes> {
        debug!(object = %name, "GET object");
        let response = self
            .bucket
            .get_object(name)
            .await
            .map_err(|e| map_object_error(name, e))?;
        check_status(name, response.status_code())?;
        Ok(Bytes::copy_from_slice(response.bytes()))
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        debug!(bucket = %self.name, "LIST objects");
        // rust-s3 follows continuation tokens and returns one result per page.
        let pages = self.bucket.list(String::new(), None).await?;
        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|obj| obj.key))
            .collect())
    }

    async fn delete_object(&self, name: &str) -> StorageResult<()> {
        debug!(object = %name, "DELETE object");
        // S3 answers deletes of missing keys with 204; some compatible
        // services send 404 instead.
        match self.bucket.delete_object(name).await {
            Ok(response) if response.status_code() == 404 => Ok(()),
            Ok(response) => check_status(name, response.status_code()),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn presigned_get_url(&self, name: &str, expiry: Duration) -> StorageResult<String> {
        let expiry_secs = u32::try_from(expiry.as_secs()).map_err(|_| {
            StorageError::Backend(format!("presign expiry too large: {:?}", expiry))
        })?;
        let url = self.bucket.presign_get(name, expiry_secs, None).await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use mockito::Matcher;

    fn storage_config(endpoint: Option<String>) -> StorageConfig {
        StorageConfig {
            provider: StorageProvider::S3,
            s3_bucket: "uploads".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: Some("minioadmin".to_string()),
            s3_secret_access_key: Some("minioadmin".to_string()),
            s3_endpoint: endpoint,
            s3_path_style: true,
            presign_expiry_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_presigned_url_is_signed_for_object() {
        let store = S3Store::new(&storage_config(Some("http://localhost:9000".to_string()))).unwrap();

        let url = store
            .presigned_get_url("1b4e28ba-2fa1-11d2-883f-0016d3cca427.png", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with(
            "http://localhost:9000/uploads/1b4e28ba-2fa1-11d2-883f-0016d3cca427.png?"
        ));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Credential=minioadmin"));
    }

    #[tokio::test]
    async fn test_bucket_name() {
        let store = S3Store::new(&storage_config(None)).unwrap();
        assert_eq!(store.bucket(), "uploads");
    }

    #[tokio::test]
    async fn test_get_object_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/uploads/a\.txt".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("hello object")
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let data = store.get_object("a.txt").await.unwrap();

        assert_eq!(&data[..], b"hello object");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/uploads/missing\.bin".to_string()))
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#,
            )
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let err = store.get_object("missing.bin").await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound(name) if name == "missing.bin"));
    }

    #[tokio::test]
    async fn test_list_objects_collects_keys() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/uploads".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>uploads</Name>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>first.txt</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"5d41402abc4b2a76b9719d911017c592"</ETag>
    <Size>5</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>second.pdf</Key>
    <LastModified>2024-01-02T00:00:00.000Z</LastModified>
    <ETag>"7d793037a0760186574b0282f2f435e7"</ETag>
    <Size>11</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#,
            )
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let names = store.list_objects().await.unwrap();

        assert_eq!(names, vec!["first.txt", "second.pdf"]);
    }

    #[tokio::test]
    async fn test_delete_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", Matcher::Regex(r"^/uploads/old\.log".to_string()))
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        store.delete_object("old.log").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_objects_follows_continuation_token() {
        let mut server = mockito::Server::new_async().await;
        let first_page = server
            .mock("GET", Matcher::Regex(r"^/uploads".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>uploads</Name>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>page-2</NextContinuationToken>
  <Contents>
    <Key>a.txt</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"0cc175b9c0f1b6a831c399e269772661"</ETag>
    <Size>1</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>b.txt</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"92eb5ffee6ae2fec3ad71c777531578f"</ETag>
    <Size>1</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#,
            )
            .expect(1)
            .create_async()
            .await;
        let second_page = server
            .mock("GET", Matcher::Regex(r"^/uploads".to_string()))
            .match_query(Matcher::UrlEncoded(
                "continuation-token".to_string(),
                "page-2".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>uploads</Name>
  <KeyCount>1</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>c.txt</Key>
    <LastModified>2024-01-02T00:00:00.000Z</LastModified>
    <ETag>"4a8a08f09d37b73795649038408b5f33"</ETag>
    <Size>1</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#,
            )
            .expect(1)
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let names = store.list_objects().await.unwrap();

        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        first_page.assert_async().await;
        second_page.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_missing_object_succeeds_on_404() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", Matcher::Regex(r"^/uploads/never-stored\.bin".to_string()))
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#,
            )
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let result = store.delete_object("never-stored.bin").await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_failure_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", Matcher::Regex(r"^/uploads/".to_string()))
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("<Error><Code>SlowDown</Code></Error>")
            .create_async()
            .await;

        let store = S3Store::new(&storage_config(Some(server.url()))).unwrap();
        let result = store
            .put_object("x.bin", Bytes::from_static(b"data"), "application/octet-stream")
            .await;

        assert!(result.is_err());
    }
}
