// In-memory object store

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use super::ObjectStore;
use crate::types::{StorageError, StorageResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Keeps objects in a process-local map. Contents are lost on restart.
#[derive(Debug)]
pub struct InMemoryStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Content type recorded for `name`, if the object exists.
    ///
    /// Not part of [`ObjectStore`]; lets tests and local tooling inspect what
    /// an upload stored.
    pub async fn content_type(&self, name: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(name)
            .map(|obj| obj.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        debug!(object = %name, bytes = data.len(), "Storing object in memory");
        self.objects.write().await.insert(
            name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, name: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(name)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn delete_object(&self, name: &str) -> StorageResult<()> {
        self.objects.write().await.remove(name);
        Ok(())
    }

    async fn presigned_get_url(&self, name: &str, expiry: Duration) -> StorageResult<String> {
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}",
            self.bucket,
            name,
            expiry.as_secs()
        ))
    }
}
