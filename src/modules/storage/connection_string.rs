//! Azure Storage connection string parsing
//!
//! Accepts the `Key=Value;Key=Value` form issued by the Azure portal, an
//! explicit `BlobEndpoint` (emulators, private endpoints) and the
//! `UseDevelopmentStorage=true` shortcut for the local emulator.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use super::error::{StorageError, StorageResult};

/// Well-known emulator account
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

/// Account credentials and blob endpoint resolved from a connection string
#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    /// Decoded account key used for HMAC signing
    pub key: Vec<u8>,
    /// Blob service endpoint without trailing slash
    pub blob_endpoint: String,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"***")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl StorageAccount {
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let mut protocol = None;
        let mut name = None;
        let mut key = None;
        let mut suffix = None;
        let mut blob_endpoint = None;
        let mut development = false;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Account keys end in '=' padding, so only split on the first one
            let (k, v) = part.split_once('=').ok_or_else(|| {
                StorageError::Config(format!("Malformed connection string segment '{}'", k_only(part)))
            })?;
            match k.trim() {
                "DefaultEndpointsProtocol" => protocol = Some(v.trim().to_string()),
                "AccountName" => name = Some(v.trim().to_string()),
                "AccountKey" => key = Some(v.trim().to_string()),
                "EndpointSuffix" => suffix = Some(v.trim().to_string()),
                "BlobEndpoint" => blob_endpoint = Some(v.trim().to_string()),
                "UseDevelopmentStorage" => development = v.trim().eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Self::new(
                name.unwrap_or_else(|| DEV_ACCOUNT_NAME.to_string()),
                key.as_deref().unwrap_or(DEV_ACCOUNT_KEY),
                blob_endpoint.unwrap_or_else(|| DEV_BLOB_ENDPOINT.to_string()),
            );
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StorageError::Config("Connection string has no AccountName".to_string()))?;
        let key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StorageError::Config("Connection string has no AccountKey".to_string()))?;

        let blob_endpoint = blob_endpoint.unwrap_or_else(|| {
            format!(
                "{}://{}.blob.{}",
                protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL),
                name,
                suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX)
            )
        });

        Self::new(name, &key, blob_endpoint)
    }

    fn new(name: String, encoded_key: &str, blob_endpoint: String) -> StorageResult<Self> {
        let key = BASE64_STANDARD
            .decode(encoded_key)
            .map_err(|e| StorageError::Config(format!("AccountKey is not valid base64: {}", e)))?;

        Ok(Self {
            name,
            key,
            blob_endpoint: blob_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// Key part of a segment, so error messages never echo secrets
fn k_only(segment: &str) -> &str {
    segment.split('=').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "c2VjcmV0LWtleS1ieXRlcw==";

    #[test]
    fn test_parse_portal_connection_string() {
        let cs = format!(
            "DefaultEndpointsProtocol=https;AccountName=learning;AccountKey={};EndpointSuffix=core.windows.net",
            KEY
        );
        let account = StorageAccount::from_connection_string(&cs).unwrap();
        assert_eq!(account.name, "learning");
        assert_eq!(account.key, b"secret-key-bytes".to_vec());
        assert_eq!(account.blob_endpoint, "https://learning.blob.core.windows.net");
    }

    #[test]
    fn test_explicit_blob_endpoint_wins() {
        let cs = format!(
            "AccountName=learning;AccountKey={};BlobEndpoint=http://localhost:9999/learning/;",
            KEY
        );
        let account = StorageAccount::from_connection_string(&cs).unwrap();
        assert_eq!(account.blob_endpoint, "http://localhost:9999/learning");
    }

    #[test]
    fn test_development_storage() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.name, "devstoreaccount1");
        assert_eq!(account.blob_endpoint, "http://127.0.0.1:10000/devstoreaccount1");
        assert!(!account.key.is_empty());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = StorageAccount::from_connection_string("AccountName=learning").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_invalid_base64_key() {
        let err =
            StorageAccount::from_connection_string("AccountName=learning;AccountKey=not base64!")
                .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let cs = format!("AccountName=learning;AccountKey={}", KEY);
        let account = StorageAccount::from_connection_string(&cs).unwrap();
        let printed = format!("{:?}", account);
        assert!(!printed.contains(KEY));
        assert!(printed.contains("***"));
    }
}
