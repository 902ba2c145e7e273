use std::collections::BTreeMap;

use super::error::{StorageError, StorageResult};
use crate::shared::constants::{METADATA_KEY_DESCRIPTION, METADATA_KEY_TITLE};

/// Handle to a blob in a container
///
/// A reference obtained through `get_ref` carries only the name and URI.
/// Attributes (etag, metadata) are filled in by `reload_metadata`, `upload`,
/// `list` and by successful mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub container: String,
    pub name: String,
    pub uri: String,
    /// Concurrency token sent as `If-Match` on mutations
    pub etag: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub attributes_loaded: bool,
}

impl BlobRef {
    /// Create a bare reference with no attributes
    pub fn new(container: impl Into<String>, name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
            uri: uri.into(),
            etag: None,
            metadata: BTreeMap::new(),
            attributes_loaded: false,
        }
    }

    /// Title stored on the blob, empty if absent
    pub fn title(&self) -> &str {
        self.metadata
            .get(METADATA_KEY_TITLE)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Description stored on the blob, empty if absent
    pub fn description(&self) -> &str {
        self.metadata
            .get(METADATA_KEY_DESCRIPTION)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set title and description on the cached metadata
    ///
    /// Blank values remove the key instead of storing an empty string.
    pub fn set_title_and_description(&mut self, title: &str, description: &str) {
        set_metadata_value(&mut self.metadata, METADATA_KEY_TITLE, title);
        set_metadata_value(&mut self.metadata, METADATA_KEY_DESCRIPTION, description);
    }
}

/// Insert a trimmed metadata value, or drop the key when the value is blank
pub fn set_metadata_value(metadata: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        metadata.remove(key);
    } else {
        metadata.insert(key.to_string(), value.to_string());
    }
}

/// Metadata values travel as HTTP headers and must be printable ASCII
pub fn check_metadata_values(metadata: &BTreeMap<String, String>) -> StorageResult<()> {
    match metadata
        .iter()
        .find(|(_, v)| !v.chars().all(|c| c.is_ascii() && !c.is_ascii_control()))
    {
        Some((key, _)) => Err(StorageError::InvalidInput(format!(
            "Metadata '{}' must contain printable ASCII only",
            key
        ))),
        None => Ok(()),
    }
}
