//! In-memory blob store
//!
//! Process-local implementation of [`VideoStorage`] used for local runs
//! without a storage account and by the API tests. It keeps the same
//! etag preconditions, metadata rules and paged listing as the Azure client.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::blob_ref::{check_metadata_values, BlobRef};
use super::error::{StorageError, StorageResult};
use super::signing::{sas_expiry_from_now, SharedKeySigner};
use super::traits::{StorageBackend, VideoStorage};
use crate::core::config::StorageConfig;

const MEMORY_ACCOUNT: &str = "memory";
const MEMORY_BASE_URI: &str = "http://127.0.0.1/memory";
const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    etag: String,
    metadata: BTreeMap<String, String>,
}

type Container = BTreeMap<String, StoredBlob>;

pub struct InMemoryVideoStorage {
    video_container: String,
    archive_container: String,
    sas_expiry: Duration,
    page_size: usize,
    signer: SharedKeySigner,
    containers: RwLock<HashMap<String, Container>>,
    etag_counter: AtomicU64,
}

impl InMemoryVideoStorage {
    pub fn new(config: &StorageConfig) -> Self {
        // Signatures only need to be unforgeable within this process
        let key = Uuid::new_v4().as_bytes().to_vec();

        Self {
            video_container: config.video_container.clone(),
            archive_container: config.archive_container.clone(),
            sas_expiry: Duration::from_secs(config.sas_expiry_secs),
            page_size: config
                .list_page_size
                .map(|n| n.max(1) as usize)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            signer: SharedKeySigner::new(MEMORY_ACCOUNT, key),
            containers: RwLock::new(HashMap::new()),
            etag_counter: AtomicU64::new(0),
        }
    }

    fn next_etag(&self) -> String {
        let n = self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("\"0x{:016X}\"", n)
    }

    fn uri(container: &str, name: &str) -> String {
        format!(
            "{}/{}/{}",
            MEMORY_BASE_URI,
            container,
            urlencoding::encode(name)
        )
    }

    fn to_ref(container: &str, name: &str, stored: &StoredBlob) -> BlobRef {
        let mut blob = BlobRef::new(container, name, Self::uri(container, name));
        blob.etag = Some(stored.etag.clone());
        blob.metadata = stored.metadata.clone();
        blob.attributes_loaded = true;
        blob
    }

    /// Reject the mutation when the caller's etag is stale
    fn check_precondition(name: &str, stored: &StoredBlob, expected: Option<&str>) -> StorageResult<()> {
        match expected {
            Some(etag) if etag != stored.etag => Err(StorageError::Conflict(format!(
                "'{}' has etag {}, caller expected {}",
                name, stored.etag, etag
            ))),
            _ => Ok(()),
        }
    }

    /// One page of the listing, starting after `marker`
    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
    ) -> (Vec<BlobRef>, Option<String>) {
        let containers = self.containers.read().await;
        let Some(container) = containers.get(&self.video_container) else {
            return (Vec::new(), None);
        };

        let lower = match marker {
            Some(m) => Bound::Excluded(m.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matching = container
            .range((lower, Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix));

        let page: Vec<BlobRef> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(name, stored)| Self::to_ref(&self.video_container, name, stored))
            .collect();
        let next = match matching.next() {
            Some(_) => page.last().map(|b| b.name.clone()),
            None => None,
        };

        (page, next)
    }
}

#[async_trait]
impl VideoStorage for InMemoryVideoStorage {
    async fn upload(
        &self,
        data: Vec<u8>,
        name: &str,
        title: &str,
        description: &str,
    ) -> StorageResult<BlobRef> {
        let mut blob = self.get_ref(name).await?;
        blob.set_title_and_description(title, description);
        check_metadata_values(&blob.metadata)?;

        let etag = self.next_etag();
        let size = data.len();
        self.containers
            .write()
            .await
            .entry(self.video_container.clone())
            .or_default()
            .insert(
                name.to_string(),
                StoredBlob {
                    data,
                    etag: etag.clone(),
                    metadata: blob.metadata.clone(),
                },
            );

        debug!("Stored blob '{}' ({} bytes) in memory", name, size);
        blob.etag = Some(etag);
        blob.attributes_loaded = true;
        Ok(blob)
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let containers = self.containers.read().await;
        Ok(containers
            .get(&self.video_container)
            .is_some_and(|c| c.contains_key(name)))
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<BlobRef>> {
        let prefix = prefix.unwrap_or("");
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let (page, next) = self.list_page(prefix, marker.as_deref()).await;
            blobs.extend(page);
            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(blobs)
    }

    async fn get_ref(&self, name: &str) -> StorageResult<BlobRef> {
        self.containers
            .write()
            .await
            .entry(self.video_container.clone())
            .or_default();
        Ok(BlobRef::new(
            self.video_container.clone(),
            name,
            Self::uri(&self.video_container, name),
        ))
    }

    async fn download(
        &self,
        blob: &BlobRef,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StorageResult<()> {
        let data = {
            let containers = self.containers.read().await;
            containers
                .get(&blob.container)
                .and_then(|c| c.get(&blob.name))
                .map(|stored| stored.data.clone())
                .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?
        };

        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(())
    }

    async fn overwrite(&self, blob: &mut BlobRef, data: Vec<u8>) -> StorageResult<()> {
        check_metadata_values(&blob.metadata)?;

        let mut containers = self.containers.write().await;
        let container = containers.entry(blob.container.clone()).or_default();

        match container.get(&blob.name) {
            Some(stored) => Self::check_precondition(&blob.name, stored, blob.etag.as_deref())?,
            None if blob.etag.is_some() => {
                return Err(StorageError::Conflict(format!(
                    "'{}' no longer exists",
                    blob.name
                )))
            }
            None => {}
        }

        let etag = self.next_etag();
        container.insert(
            blob.name.clone(),
            StoredBlob {
                data,
                etag: etag.clone(),
                metadata: blob.metadata.clone(),
            },
        );
        blob.etag = Some(etag);
        Ok(())
    }

    async fn delete(&self, blob: &BlobRef) -> StorageResult<()> {
        let mut containers = self.containers.write().await;
        let container = containers
            .get_mut(&blob.container)
            .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?;
        let stored = container
            .get(&blob.name)
            .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?;
        Self::check_precondition(&blob.name, stored, blob.etag.as_deref())?;

        container.remove(&blob.name);
        Ok(())
    }

    async fn update_metadata(
        &self,
        blob: &mut BlobRef,
        title: &str,
        description: &str,
    ) -> StorageResult<()> {
        let mut updated = blob.clone();
        updated.set_title_and_description(title, description);
        check_metadata_values(&updated.metadata)?;

        let mut containers = self.containers.write().await;
        let stored = containers
            .get_mut(&blob.container)
            .and_then(|c| c.get_mut(&blob.name))
            .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?;
        Self::check_precondition(&blob.name, stored, blob.etag.as_deref())?;

        let etag = self.next_etag();
        stored.metadata = updated.metadata.clone();
        stored.etag = etag.clone();

        updated.etag = Some(etag);
        *blob = updated;
        Ok(())
    }

    async fn reload_metadata(&self, blob: &mut BlobRef) -> StorageResult<()> {
        let containers = self.containers.read().await;
        let stored = containers
            .get(&blob.container)
            .and_then(|c| c.get(&blob.name))
            .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?;

        blob.etag = Some(stored.etag.clone());
        blob.metadata = stored.metadata.clone();
        blob.attributes_loaded = true;
        Ok(())
    }

    fn uri_with_temporary_access(&self, blob: &BlobRef) -> StorageResult<String> {
        let expiry = sas_expiry_from_now(self.sas_expiry)?;
        let sas = self
            .signer
            .blob_read_sas(&blob.container, &blob.name, expiry)?;
        Ok(format!("{}?{}", blob.uri, sas))
    }

    async fn archive(&self, blob: &BlobRef) -> StorageResult<()> {
        let mut containers = self.containers.write().await;
        let source = containers
            .get(&blob.container)
            .and_then(|c| c.get(&blob.name))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(blob.name.clone()))?;

        let copy = StoredBlob {
            etag: self.next_etag(),
            ..source
        };
        containers
            .entry(self.archive_container.clone())
            .or_default()
            .insert(blob.name.clone(), copy);

        debug!(
            "Archived blob '{}' into '{}'",
            blob.name, self.archive_container
        );
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
impl InMemoryVideoStorage {
    /// Raw content of a blob in any container
    pub async fn content_of(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|c| c.get(name))
            .map(|stored| stored.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(page_size: u32) -> InMemoryVideoStorage {
        InMemoryVideoStorage::new(&StorageConfig {
            list_page_size: Some(page_size),
            ..StorageConfig::default()
        })
    }

    #[tokio::test]
    async fn test_blank_metadata_is_not_stored() {
        let storage = storage(10);
        let blob = storage.upload(b"v".to_vec(), "lecture1", "", " \t").await.unwrap();
        assert!(blob.metadata.is_empty());

        let mut fresh = storage.get_ref("lecture1").await.unwrap();
        storage.reload_metadata(&mut fresh).await.unwrap();
        assert!(fresh.metadata.is_empty());
        assert_eq!(storage.get_metadata(&fresh), (String::new(), String::new()));
    }

    #[tokio::test]
    async fn test_update_then_reload_round_trips() {
        let storage = storage(10);
        let mut blob = storage.upload(b"v".to_vec(), "lecture1", "Intro", "").await.unwrap();

        storage
            .update_metadata(&mut blob, "Ownership", "Borrowing basics")
            .await
            .unwrap();
        storage
            .update_metadata(&mut blob, "Lifetimes", "")
            .await
            .unwrap();

        let mut fresh = storage.get_ref("lecture1").await.unwrap();
        storage.reload_metadata(&mut fresh).await.unwrap();
        assert_eq!(
            storage.get_metadata(&fresh),
            ("Lifetimes".to_string(), String::new())
        );
    }

    #[tokio::test]
    async fn test_stale_etag_conflicts_fresh_etag_succeeds() {
        let storage = storage(10);
        storage.upload(b"v1".to_vec(), "lecture1", "", "").await.unwrap();

        let mut stale = storage.get_ref("lecture1").await.unwrap();
        storage.reload_metadata(&mut stale).await.unwrap();
        let mut writer = stale.clone();

        storage.overwrite(&mut writer, b"v2".to_vec()).await.unwrap();

        let err = storage.overwrite(&mut stale, b"v3".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        let err = storage.delete(&stale).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // The writer's reference picked up the new etag
        storage.overwrite(&mut writer, b"v3".to_vec()).await.unwrap();
        storage.delete(&writer).await.unwrap();
        assert!(!storage.exists("lecture1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_prefix_across_pages() {
        let storage = storage(2);
        for name in ["a1", "lec1", "lec2", "lec3", "lec4", "lec5", "lez", "z"] {
            storage.upload(b"v".to_vec(), name, "", "").await.unwrap();
        }

        let names: Vec<String> = storage
            .list(Some("lec"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["lec1", "lec2", "lec3", "lec4", "lec5"]);

        assert_eq!(storage.list(None).await.unwrap().len(), 8);
        assert!(storage.list(Some("nothing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_copies_and_keeps_source() {
        let storage = storage(10);
        let blob = storage
            .upload(b"lecture-bytes".to_vec(), "lecture1", "Intro", "")
            .await
            .unwrap();

        storage.archive(&blob).await.unwrap();

        assert!(storage.exists("lecture1").await.unwrap());
        assert_eq!(
            storage.content_of("videos-archive", "lecture1").await,
            Some(b"lecture-bytes".to_vec())
        );
    }

    #[tokio::test]
    async fn test_download_into_sink() {
        let storage = storage(10);
        let blob = storage
            .upload(b"lecture-bytes".to_vec(), "lecture1", "", "")
            .await
            .unwrap();

        let mut sink: Vec<u8> = Vec::new();
        storage.download(&blob, &mut sink).await.unwrap();
        assert_eq!(sink, b"lecture-bytes");

        let missing = storage.get_ref("ghost").await.unwrap();
        let err = storage.download(&missing, &mut sink).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_download_writes_exact_content() {
        let storage = storage(10);
        let blob = storage
            .upload(b"chunk-one".to_vec(), "lecture1", "", "")
            .await
            .unwrap();

        let mut sink = tokio_test::io::Builder::new().write(b"chunk-one").build();
        storage.download(&blob, &mut sink).await.unwrap();
    }

    #[tokio::test]
    async fn test_example_lecture_listing() {
        let storage = storage(10);
        storage
            .upload(b"v".to_vec(), "lecture1", "Intro", "")
            .await
            .unwrap();

        let blobs = storage.list(None).await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "lecture1");
        assert_eq!(blobs[0].title(), "Intro");
        assert_eq!(blobs[0].description(), "");
    }

    #[tokio::test]
    async fn test_out_of_range_sas_expiry_is_config_error() {
        let storage = InMemoryVideoStorage::new(&StorageConfig {
            sas_expiry_secs: 10_000_000_000_000,
            ..StorageConfig::default()
        });
        let blob = storage.upload(b"v".to_vec(), "lecture1", "", "").await.unwrap();

        let err = storage.uri_with_temporary_access(&blob).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
