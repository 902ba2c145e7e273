//! Storage abstraction trait
//!
//! Every blob backend (Azure, in-memory) implements [`VideoStorage`] so the
//! videos feature never depends on a concrete service client.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use super::blob_ref::BlobRef;
use super::error::StorageResult;

/// Which storage backend serves the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Azure,
    Memory,
}

/// Blob operations over the primary video container and its archive
///
/// Mutating operations (`overwrite`, `delete`, `update_metadata`) send the
/// reference's etag as a precondition when it has one and fail with
/// `StorageError::Conflict` if the live blob no longer matches. The etag is
/// taken from the reference as-is; it is never re-fetched before the call.
#[async_trait]
pub trait VideoStorage: Send + Sync {
    /// Create or replace `name` with `data` and the given title/description
    async fn upload(
        &self,
        data: Vec<u8>,
        name: &str,
        title: &str,
        description: &str,
    ) -> StorageResult<BlobRef>;

    /// Check whether `name` exists without transferring content
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// List all blobs whose name starts with `prefix`, metadata included
    ///
    /// Pages through the whole listing before returning.
    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<BlobRef>>;

    /// Resolve a name to a reference without checking existence
    async fn get_ref(&self, name: &str) -> StorageResult<BlobRef>;

    /// Write the full blob content into `sink`
    async fn download(
        &self,
        blob: &BlobRef,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StorageResult<()>;

    /// Replace the blob content, guarded by the reference's etag
    async fn overwrite(&self, blob: &mut BlobRef, data: Vec<u8>) -> StorageResult<()>;

    /// Remove the blob, guarded by the reference's etag
    async fn delete(&self, blob: &BlobRef) -> StorageResult<()>;

    /// Rewrite title and description, guarded by the reference's etag
    async fn update_metadata(
        &self,
        blob: &mut BlobRef,
        title: &str,
        description: &str,
    ) -> StorageResult<()>;

    /// Refresh etag and metadata on `blob` from the live blob
    async fn reload_metadata(&self, blob: &mut BlobRef) -> StorageResult<()>;

    /// Read title and description from the already fetched attributes
    fn get_metadata(&self, blob: &BlobRef) -> (String, String) {
        (blob.title().to_string(), blob.description().to_string())
    }

    /// Blob URI with a read-only signature valid for the configured window
    fn uri_with_temporary_access(&self, blob: &BlobRef) -> StorageResult<String>;

    /// Copy the blob into the archive container under the same name
    ///
    /// The source blob is left in place.
    async fn archive(&self, blob: &BlobRef) -> StorageResult<()>;

    /// Backend serving this storage
    fn backend_type(&self) -> StorageBackend;
}
