use std::sync::Arc;

use super::azure_client::AzureBlobClient;
use super::error::StorageResult;
use super::memory::InMemoryVideoStorage;
use super::traits::{StorageBackend, VideoStorage};
use crate::core::config::StorageConfig;

/// Create the storage backend selected by configuration
pub fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn VideoStorage>> {
    match config.backend {
        StorageBackend::Azure => {
            let client = AzureBlobClient::new(config.clone())?;
            Ok(Arc::new(client))
        }
        StorageBackend::Memory => Ok(Arc::new(InMemoryVideoStorage::new(config))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::StorageError;

    #[test]
    fn test_memory_backend_selected() {
        let storage = create_storage(&StorageConfig::default()).unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[test]
    fn test_azure_backend_requires_connection_string() {
        let config = StorageConfig {
            backend: StorageBackend::Azure,
            connection_string: None,
            ..StorageConfig::default()
        };
        assert!(matches!(
            create_storage(&config),
            Err(StorageError::Config(_))
        ));
    }

    #[test]
    fn test_azure_backend_from_connection_string() {
        let config = StorageConfig {
            backend: StorageBackend::Azure,
            connection_string: Some("UseDevelopmentStorage=true".to_string()),
            ..StorageConfig::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Azure);
    }
}
