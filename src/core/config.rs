use std::env;
use std::path::PathBuf;

use crate::modules::storage::StorageBackend;
use crate::shared::constants::{DEFAULT_ARCHIVE_CONTAINER, DEFAULT_VIDEO_CONTAINER};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub swagger: SwaggerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// Blob storage configuration for the video containers
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Azure connection string, required for the Azure backend
    pub connection_string: Option<String>,
    pub video_container: String,
    pub archive_container: String,
    /// Validity window of temporary read URLs
    pub sas_expiry_secs: u64,
    /// `maxresults` per List Blobs call, service default when unset
    pub list_page_size: Option<u32>,
    /// Poll the archive copy until it leaves `pending`
    pub archive_wait_for_copy: bool,
    pub archive_copy_poll_interval_ms: u64,
    /// File uploaded when an upload request carries an empty body
    pub upload_source_path: Option<PathBuf>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("video_container", &self.video_container)
            .field("archive_container", &self.archive_container)
            .field("sas_expiry_secs", &self.sas_expiry_secs)
            .field("list_page_size", &self.list_page_size)
            .field("archive_wait_for_copy", &self.archive_wait_for_copy)
            .field(
                "archive_copy_poll_interval_ms",
                &self.archive_copy_poll_interval_ms,
            )
            .field("upload_source_path", &self.upload_source_path)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 256 * 1024 * 1024; // 256MB, videos

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Video Blob API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Learning video storage over Azure Blob Storage".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "azure" => Ok(StorageBackend::Azure),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!(
                "STORAGE_BACKEND must be 'azure' or 'memory', got '{}'",
                other
            )),
        }
    }
}

impl StorageConfig {
    const DEFAULT_SAS_EXPIRY_SECS: u64 = 24 * 60 * 60; // 1 day
    const MAX_SAS_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60; // 7 days
    const DEFAULT_ARCHIVE_COPY_POLL_INTERVAL_MS: u64 = 500;

    pub fn from_env() -> Result<Self, String> {
        let backend = StorageBackend::parse(
            &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "azure".to_string()),
        )?;

        let connection_string = env::var("AZURE_STORAGE_CONNECTION_STRING")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if backend == StorageBackend::Azure && connection_string.is_none() {
            return Err(
                "AZURE_STORAGE_CONNECTION_STRING is required when STORAGE_BACKEND=azure"
                    .to_string(),
            );
        }

        let video_container =
            env::var("VIDEO_CONTAINER").unwrap_or_else(|_| DEFAULT_VIDEO_CONTAINER.to_string());
        let archive_container = env::var("VIDEO_ARCHIVE_CONTAINER")
            .unwrap_or_else(|_| DEFAULT_ARCHIVE_CONTAINER.to_string());

        let sas_expiry_secs = Self::parse_sas_expiry(
            &env::var("SAS_EXPIRY_SECS")
                .unwrap_or_else(|_| Self::DEFAULT_SAS_EXPIRY_SECS.to_string()),
        )?;

        let list_page_size = match env::var("LIST_PAGE_SIZE") {
            Ok(value) => Some(
                value
                    .parse::<u32>()
                    .ok()
                    .filter(|n| (1..=5000).contains(n))
                    .ok_or_else(|| "LIST_PAGE_SIZE must be between 1 and 5000".to_string())?,
            ),
            Err(_) => None,
        };

        let archive_wait_for_copy = env::var("ARCHIVE_WAIT_FOR_COPY")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let archive_copy_poll_interval_ms = env::var("ARCHIVE_COPY_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| Self::DEFAULT_ARCHIVE_COPY_POLL_INTERVAL_MS.to_string())
            .parse::<u64>()
            .map_err(|_| "ARCHIVE_COPY_POLL_INTERVAL_MS must be a valid number".to_string())?;

        let upload_source_path = env::var("UPLOAD_SOURCE_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            backend,
            connection_string,
            video_container,
            archive_container,
            sas_expiry_secs,
            list_page_size,
            archive_wait_for_copy,
            archive_copy_poll_interval_ms,
            upload_source_path,
        })
    }

    fn parse_sas_expiry(value: &str) -> Result<u64, String> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| (1..=Self::MAX_SAS_EXPIRY_SECS).contains(secs))
            .ok_or_else(|| {
                format!(
                    "SAS_EXPIRY_SECS must be between 1 and {}",
                    Self::MAX_SAS_EXPIRY_SECS
                )
            })
    }
}

/// In-memory backend with the default containers and timings
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            connection_string: None,
            video_container: DEFAULT_VIDEO_CONTAINER.to_string(),
            archive_container: DEFAULT_ARCHIVE_CONTAINER.to_string(),
            sas_expiry_secs: Self::DEFAULT_SAS_EXPIRY_SECS,
            list_page_size: None,
            archive_wait_for_copy: false,
            archive_copy_poll_interval_ms: Self::DEFAULT_ARCHIVE_COPY_POLL_INTERVAL_MS,
            upload_source_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!(StorageBackend::parse("azure").unwrap(), StorageBackend::Azure);
        assert_eq!(StorageBackend::parse(" Memory ").unwrap(), StorageBackend::Memory);
        assert!(StorageBackend::parse("s3").is_err());
    }

    #[test]
    fn test_storage_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.video_container, "videos");
        assert_eq!(config.archive_container, "videos-archive");
        assert_eq!(config.sas_expiry_secs, 86_400);
        assert!(!config.archive_wait_for_copy);
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let config = StorageConfig {
            connection_string: Some("AccountKey=very-secret".to_string()),
            ..StorageConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_sas_expiry_is_bounded() {
        assert_eq!(StorageConfig::parse_sas_expiry("3600").unwrap(), 3600);
        assert_eq!(StorageConfig::parse_sas_expiry("604800").unwrap(), 604_800);
        assert!(StorageConfig::parse_sas_expiry("604801").is_err());
        assert!(StorageConfig::parse_sas_expiry("10000000000000").is_err());
        assert!(StorageConfig::parse_sas_expiry("0").is_err());
        assert!(StorageConfig::parse_sas_expiry("soon").is_err());
    }
}
