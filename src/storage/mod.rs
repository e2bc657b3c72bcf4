//! Object storage layer
//!
//! Every backend implements [`ObjectStore`]; handlers only ever see an
//! `Arc<dyn ObjectStore>`. Two backends ship:
//! - [`S3Store`] - any S3-compatible service (AWS S3, MinIO, ...) via `rust-s3`
//! - [`InMemoryStore`] - process-local, for local development and tests

pub mod memory;
pub mod s3_client;

pub use memory::InMemoryStore;
pub use s3_client::S3Store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::config::{StorageConfig, StorageProvider};
use crate::types::StorageResult;

/// Object storage operations over a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store addresses.
    fn bucket(&self) -> &str;

    async fn put_object(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Reads a whole object. A missing object is an error.
    async fn get_object(&self, name: &str) -> StorageResult<Bytes>;

    /// Names of every object in the bucket.
    async fn list_objects(&self) -> StorageResult<Vec<String>>;

    /// Removes an object. Removing an object that does not exist succeeds.
    async fn delete_object(&self, name: &str) -> StorageResult<()>;

    /// A signed GET URL for `name`, valid for `expiry`.
    async fn presigned_get_url(&self, name: &str, expiry: Duration) -> StorageResult<String>;
}

/// Builds the backend selected by `STORAGE_PROVIDER`.
pub fn create_store(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    info!(provider = %config.provider, bucket = %config.s3_bucket, "Creating object store");

    let store: Arc<dyn ObjectStore> = match config.provider {
        StorageProvider::S3 => Arc::new(S3Store::new(config)?),
        StorageProvider::Memory => Arc::new(InMemoryStore::new(&config.s3_bucket)),
    };
    Ok(store)
}

/// Generates a fresh object name: a random UUID followed by the extension of
/// the client-supplied file name (from its last `.`, dot included).
///
/// Only the final path segment of `original` is looked at. Names without an
/// extension get a bare UUID.
pub fn generate_object_name(original: Option<&str>) -> String {
    let token = uuid::Uuid::new_v4().to_string();
    match original.and_then(extension_of) {
        Some(ext) => format!("{}{}", token, ext),
        None => token,
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.rfind('.').map(|idx| &base[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_part(name: &str) -> &str {
        &name[..36]
    }

    #[test]
    fn test_generated_name_keeps_extension() {
        let name = generate_object_name(Some("report.pdf"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), 36 + ".pdf".len());
        assert!(uuid::Uuid::parse_str(token_part(&name)).is_ok());
    }

    #[test]
    fn test_only_last_extension_is_kept() {
        let name = generate_object_name(Some("backup.tar.gz"));
        assert!(name.ends_with(".gz"));
        assert!(!name.contains(".tar"));
    }

    #[test]
    fn test_name_without_extension_is_bare_uuid() {
        let name = generate_object_name(Some("Makefile"));
        assert_eq!(name.len(), 36);
        assert!(uuid::Uuid::parse_str(&name).is_ok());

        let name = generate_object_name(None);
        assert!(uuid::Uuid::parse_str(&name).is_ok());
    }

    #[test]
    fn test_directory_components_are_ignored() {
        let name = generate_object_name(Some("some.dir/notes"));
        assert_eq!(name.len(), 36);

        let name = generate_object_name(Some("C:\\Users\\me\\photo.JPG"));
        assert!(name.ends_with(".JPG"));
        assert_eq!(name.len(), 36 + 4);
    }

    #[test]
    fn test_hidden_file_keeps_whole_name_as_extension() {
        let name = generate_object_name(Some(".env"));
        assert!(name.ends_with(".env"));
    }

    #[test]
    fn test_names_are_unique() {
        let a = generate_object_name(Some("a.txt"));
        let b = generate_object_name(Some("a.txt"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_create_memory_store() {
        let config = crate::Config::from_lookup(|key| match key {
            "STORAGE_PROVIDER" => Some("memory".to_string()),
            "S3_BUCKET" => Some("scratch".to_string()),
            _ => None,
        })
        .unwrap();
        let store = create_store(&config.storage).unwrap();
        assert_eq!(store.bucket(), "scratch");
    }
}
