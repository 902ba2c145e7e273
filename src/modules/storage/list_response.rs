//! List Blobs response body
//!
//! Only the fields the adapter needs are mapped; everything else in the
//! `EnumerationResults` document is ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::{StorageError, StorageResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumerationResults {
    #[serde(default)]
    pub blobs: BlobList,
    #[serde(default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlobList {
    #[serde(rename = "Blob", default)]
    pub items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlobItem {
    pub name: String,
    #[serde(default)]
    pub properties: BlobProperties,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlobProperties {
    #[serde(rename = "Etag", default)]
    pub etag: Option<String>,
    #[serde(rename = "BlobType", default)]
    pub blob_type: Option<String>,
}

impl BlobItem {
    /// Only block blobs are videos; page and append blobs are skipped
    pub fn is_block_blob(&self) -> bool {
        self.properties
            .blob_type
            .as_deref()
            .map(|t| t == "BlockBlob")
            .unwrap_or(true)
    }
}

impl EnumerationResults {
    pub fn parse(xml: &str) -> StorageResult<Self> {
        // The service prefixes the body with a UTF-8 BOM
        let xml = xml.trim_start_matches('\u{feff}');
        quick_xml::de::from_str(xml)
            .map_err(|e| StorageError::Io(format!("Malformed List Blobs response: {}", e)))
    }

    /// Continuation marker, `None` once the listing is exhausted
    pub fn continuation(&self) -> Option<&str> {
        self.next_marker
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://learning.blob.core.windows.net/" ContainerName="videos">
  <Prefix>lec</Prefix>
  <MaxResults>2</MaxResults>
  <Blobs>
    <Blob>
      <Name>lecture1</Name>
      <Properties>
        <Creation-Time>Mon, 05 Feb 2024 10:00:00 GMT</Creation-Time>
        <Etag>0x8DC1</Etag>
        <Content-Length>1024</Content-Length>
        <BlobType>BlockBlob</BlobType>
      </Properties>
      <Metadata>
        <title>Intro</title>
      </Metadata>
    </Blob>
    <Blob>
      <Name>lecture2</Name>
      <Properties>
        <Etag>0x8DC2</Etag>
        <BlobType>PageBlob</BlobType>
      </Properties>
      <Metadata />
    </Blob>
  </Blobs>
  <NextMarker>2!72!MDAwMDE</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn test_parse_page_with_marker() {
        let page = EnumerationResults::parse(PAGE).unwrap();
        assert_eq!(page.blobs.items.len(), 2);

        let first = &page.blobs.items[0];
        assert_eq!(first.name, "lecture1");
        assert_eq!(first.properties.etag.as_deref(), Some("0x8DC1"));
        assert_eq!(first.metadata.get("title").map(String::as_str), Some("Intro"));
        assert!(first.is_block_blob());

        let second = &page.blobs.items[1];
        assert!(second.metadata.is_empty());
        assert!(!second.is_block_blob());

        assert_eq!(page.continuation(), Some("2!72!MDAwMDE"));
    }

    #[test]
    fn test_last_page_has_no_continuation() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ContainerName=\"videos\"><Blobs /><NextMarker /></EnumerationResults>";
        let page = EnumerationResults::parse(xml).unwrap();
        assert!(page.blobs.items.is_empty());
        assert_eq!(page.continuation(), None);
    }

    #[test]
    fn test_blob_without_name_is_io_error() {
        let xml = "<EnumerationResults><Blobs><Blob><Properties /></Blob></Blobs></EnumerationResults>";
        let err = EnumerationResults::parse(xml).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
