#[cfg(test)]
use axum_test::TestServer;

#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::core::config::StorageConfig;

#[cfg(test)]
use crate::features::videos::{routes, VideoService};

#[cfg(test)]
use crate::modules::storage::InMemoryVideoStorage;

#[cfg(test)]
const TEST_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Test server over the video routes backed by in-memory storage
///
/// The storage handle is returned so tests can inspect containers directly.
#[cfg(test)]
pub fn video_test_server(config: StorageConfig) -> (TestServer, Arc<InMemoryVideoStorage>) {
    let storage = Arc::new(InMemoryVideoStorage::new(&config));
    let service = Arc::new(VideoService::new(storage.clone(), &config));
    let server = TestServer::new(routes(service, TEST_MAX_BODY_SIZE)).unwrap();
    (server, storage)
}
