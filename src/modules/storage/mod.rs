//! Storage module for video blobs
//!
//! Provides the [`VideoStorage`] abstraction with an Azure Blob Storage
//! client and an in-memory backend, plus the backend factory.

mod azure_client;
mod blob_ref;
mod connection_string;
mod error;
mod factory;
mod list_response;
mod memory;
mod signing;
mod traits;

pub use blob_ref::BlobRef;
pub use error::StorageError;
pub use factory::create_storage;
pub use memory::InMemoryVideoStorage;
pub use signing::sas_expiry_from_now;
pub use traits::{StorageBackend, VideoStorage};
