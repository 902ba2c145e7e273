//! Azure Blob Storage client
//!
//! Talks to the Blob service REST API directly with `reqwest`, signing every
//! request with Shared Key. Containers are created on demand, so every
//! operation starts with a create-if-not-exists for the container it touches.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::blob_ref::{check_metadata_values, BlobRef};
use super::connection_string::StorageAccount;
use super::error::{StorageError, StorageResult};
use super::list_response::EnumerationResults;
use super::signing::{sas_expiry_from_now, SharedKeySigner, SignableRequest, AZURE_API_VERSION};
use super::traits::{StorageBackend, VideoStorage};
use crate::core::config::StorageConfig;

const METADATA_HEADER_PREFIX: &str = "x-ms-meta-";
const COPY_STATUS_HEADER: &str = "x-ms-copy-status";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Optional parts of a signed request
#[derive(Default)]
struct RequestOptions<'a> {
    /// Extra `x-ms-*` headers (date and version are always added)
    headers: Vec<(String, String)>,
    query: Vec<(&'a str, String)>,
    if_match: Option<&'a str>,
    content_type: Option<&'a str>,
    body: Vec<u8>,
}

/// Azure Blob Storage client for the video and archive containers
pub struct AzureBlobClient {
    account: StorageAccount,
    signer: SharedKeySigner,
    video_container: String,
    archive_container: String,
    sas_expiry: Duration,
    list_page_size: Option<u32>,
    archive_wait_for_copy: bool,
    copy_poll_interval: Duration,
    http_client: Client,
}

impl AzureBlobClient {
    /// Create a client from configuration
    ///
    /// No request is made here; containers are created lazily by each
    /// operation.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let connection_string = config.connection_string.as_deref().ok_or_else(|| {
            StorageError::Config("AZURE_STORAGE_CONNECTION_STRING is not set".to_string())
        })?;
        let account = StorageAccount::from_connection_string(connection_string)?;
        let signer = SharedKeySigner::new(account.name.clone(), account.key.clone());

        let http_client = Client::builder()
            .build()
            .map_err(|e| StorageError::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Azure blob client initialized for endpoint: {}, containers: {} / {}",
            account.blob_endpoint, config.video_container, config.archive_container
        );

        Ok(Self {
            account,
            signer,
            video_container: config.video_container,
            archive_container: config.archive_container,
            sas_expiry: Duration::from_secs(config.sas_expiry_secs),
            list_page_size: config.list_page_size,
            archive_wait_for_copy: config.archive_wait_for_copy,
            copy_poll_interval: Duration::from_millis(config.archive_copy_poll_interval_ms),
            http_client,
        })
    }

    fn container_url(&self, container: &str) -> StorageResult<Url> {
        Url::parse(&format!(
            "{}/{}",
            self.account.blob_endpoint,
            urlencoding::encode(container)
        ))
        .map_err(|e| StorageError::Config(format!("Invalid blob endpoint: {}", e)))
    }

    /// Canonical blob URI; each path segment of the name is encoded, `/` is kept
    fn blob_url(&self, container: &str, name: &str) -> StorageResult<Url> {
        let encoded_name = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Url::parse(&format!(
            "{}/{}/{}",
            self.account.blob_endpoint,
            urlencoding::encode(container),
            encoded_name
        ))
        .map_err(|e| StorageError::InvalidInput(format!("Invalid blob name '{}': {}", name, e)))
    }

    /// Current UTC time in RFC 1123 format for `x-ms-date`
    fn rfc1123_date() -> String {
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    /// Sign and send one request
    async fn send(
        &self,
        method: Method,
        mut url: Url,
        options: RequestOptions<'_>,
    ) -> StorageResult<Response> {
        if !options.query.is_empty() {
            // Encode by hand: form encoding would turn spaces into '+'
            let query = options
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }

        let mut ms_headers = vec![
            ("x-ms-date".to_string(), Self::rfc1123_date()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        ms_headers.extend(options.headers);

        let content_type = options.content_type.unwrap_or("");
        let authorization = self.signer.authorization(&SignableRequest {
            method: method.as_str(),
            url: &url,
            content_length: options.body.len(),
            content_type,
            if_match: options.if_match,
            ms_headers: &ms_headers,
        })?;

        let is_put = method == Method::PUT;
        let mut req = self
            .http_client
            .request(method, url.clone())
            .header("Authorization", authorization);
        for (k, v) in &ms_headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if !content_type.is_empty() {
            req = req.header(CONTENT_TYPE, content_type);
        }
        if let Some(etag) = options.if_match {
            req = req.header(IF_MATCH, etag);
        }
        if is_put {
            // PUT requires Content-Length, even when zero
            req = req.body(options.body);
        }

        req.send()
            .await
            .map_err(|e| StorageError::Io(format!("Request to {} failed: {}", url.path(), e)))
    }

    /// Turn a non-success response into a storage error
    async fn error_from(context: &str, name: &str, response: Response) -> StorageError {
        let status = response.status();
        let code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();
        Self::map_status(context, name, status, &code, &body)
    }

    fn map_status(
        context: &str,
        name: &str,
        status: StatusCode,
        code: &str,
        body: &str,
    ) -> StorageError {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(name.to_string()),
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => StorageError::Conflict(
                format!("{} '{}' rejected: HTTP {} {}", context, name, status, code),
            ),
            _ => StorageError::Io(format!(
                "{} '{}' failed: HTTP {} {} - {}",
                context, name, status, code, body
            )),
        }
    }

    /// Create the container with public blob read access if it does not exist
    async fn ensure_container(&self, container: &str) -> StorageResult<()> {
        let url = self.container_url(container)?;
        let response = self
            .send(
                Method::PUT,
                url,
                RequestOptions {
                    headers: vec![("x-ms-blob-public-access".to_string(), "blob".to_string())],
                    query: vec![("restype", "container".to_string())],
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| StorageError::Fatal(format!("Container '{}': {}", container, e)))?;

        match response.status() {
            StatusCode::CREATED => {
                info!("Container '{}' created", container);
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!("Container '{}' already exists", container);
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::Fatal(format!(
                    "Could not create container '{}': HTTP {} - {}",
                    container, status, body
                )))
            }
        }
    }

    /// Metadata values travel as HTTP headers and must be visible ASCII
    fn metadata_headers(metadata: &BTreeMap<String, String>) -> StorageResult<Vec<(String, String)>> {
        check_metadata_values(metadata)?;
        Ok(metadata
            .iter()
            .map(|(k, v)| (format!("{}{}", METADATA_HEADER_PREFIX, k), v.clone()))
            .collect())
    }

    fn metadata_from(headers: &HeaderMap) -> BTreeMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(METADATA_HEADER_PREFIX)?;
                let value = value.to_str().ok()?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }

    fn etag_from(headers: &HeaderMap) -> Option<String> {
        headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Put Blob; returns the new etag
    async fn put_blob(
        &self,
        blob: &BlobRef,
        data: Vec<u8>,
        metadata: &BTreeMap<String, String>,
        if_match: Option<&str>,
    ) -> StorageResult<Option<String>> {
        let mut headers = vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())];
        headers.extend(Self::metadata_headers(metadata)?);
        let size = data.len();

        let response = self
            .send(
                Method::PUT,
                self.blob_url(&blob.container, &blob.name)?,
                RequestOptions {
                    headers,
                    if_match,
                    content_type: Some("application/octet-stream"),
                    body: data,
                    ..Default::default()
                },
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from("Upload", &blob.name, response).await);
        }

        debug!(
            "Uploaded blob '{}' ({} bytes) to container '{}'",
            blob.name, size, blob.container
        );
        Ok(Self::etag_from(response.headers()))
    }

    /// Get Blob Properties
    async fn head_blob(&self, container: &str, name: &str) -> StorageResult<Response> {
        self.send(
            Method::HEAD,
            self.blob_url(container, name)?,
            RequestOptions::default(),
        )
        .await
    }

    /// Poll the destination until a pending copy finishes
    async fn wait_for_copy(&self, container: &str, name: &str) -> StorageResult<()> {
        loop {
            tokio::time::sleep(self.copy_poll_interval).await;

            let response = self.head_blob(container, name).await?;
            if !response.status().is_success() {
                return Err(Self::error_from("Copy status", name, response).await);
            }
            let status = response
                .headers()
                .get(COPY_STATUS_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("success")
                .to_string();

            match status.as_str() {
                "pending" => continue,
                "success" => return Ok(()),
                other => {
                    return Err(StorageError::Io(format!(
                        "Archive copy of '{}' ended with status '{}'",
                        name, other
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl VideoStorage for AzureBlobClient {
    async fn upload(
        &self,
        data: Vec<u8>,
        name: &str,
        title: &str,
        description: &str,
    ) -> StorageResult<BlobRef> {
        let mut blob = self.get_ref(name).await?;
        blob.set_title_and_description(title, description);

        let metadata = blob.metadata.clone();
        blob.etag = self.put_blob(&blob, data, &metadata, None).await?;
        blob.attributes_loaded = true;

        Ok(blob)
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        self.ensure_container(&self.video_container).await?;

        let response = self.head_blob(&self.video_container, name).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from("Exists check", name, response).await),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<BlobRef>> {
        self.ensure_container(&self.video_container).await?;

        let container_url = self.container_url(&self.video_container)?;
        let mut blobs: HashMap<String, BlobRef> = HashMap::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query = vec![
                ("restype", "container".to_string()),
                ("comp", "list".to_string()),
                ("include", "metadata".to_string()),
            ];
            if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                query.push(("prefix", prefix.to_string()));
            }
            if let Some(marker) = &marker {
                query.push(("marker", marker.clone()));
            }
            if let Some(size) = self.list_page_size {
                query.push(("maxresults", size.to_string()));
            }

            let response = self
                .send(
                    Method::GET,
                    container_url.clone(),
                    RequestOptions {
                        query,
                        ..Default::default()
                    },
                )
                .await?;
            if !response.status().is_success() {
                return Err(Self::error_from("List", &self.video_container, response).await);
            }
            let body = response
                .text()
                .await
                .map_err(|e| StorageError::Io(format!("Failed to read List Blobs body: {}", e)))?;

            let page = EnumerationResults::parse(&body)?;
            pages += 1;
            let next = page.continuation().map(str::to_string);

            for item in page.blobs.items {
                if !item.is_block_blob() {
                    continue;
                }
                let uri = self.blob_url(&self.video_container, &item.name)?.to_string();
                let mut blob = BlobRef::new(self.video_container.clone(), item.name, uri);
                blob.etag = item.properties.etag;
                blob.metadata = item.metadata;
                blob.attributes_loaded = true;
                blobs.insert(blob.name.clone(), blob);
            }

            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        let mut blobs: Vec<BlobRef> = blobs.into_values().collect();
        blobs.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            "Listed {} blobs in '{}' across {} page(s)",
            blobs.len(),
            self.video_container,
            pages
        );
        Ok(blobs)
    }

    async fn get_ref(&self, name: &str) -> StorageResult<BlobRef> {
        self.ensure_container(&self.video_container).await?;

        let uri = self.blob_url(&self.video_container, name)?.to_string();
        Ok(BlobRef::new(self.video_container.clone(), name, uri))
    }

    async fn download(
        &self,
        blob: &BlobRef,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StorageResult<()> {
        let mut response = self
            .send(
                Method::GET,
                self.blob_url(&blob.container, &blob.name)?,
                RequestOptions::default(),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from("Download", &blob.name, response).await);
        }

        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StorageError::Io(format!("Download of '{}' interrupted: {}", blob.name, e)))?
        {
            sink.write_all(&chunk).await?;
            written += chunk.len();
        }
        sink.flush().await?;

        debug!("Downloaded blob '{}' ({} bytes)", blob.name, written);
        Ok(())
    }

    async fn overwrite(&self, blob: &mut BlobRef, data: Vec<u8>) -> StorageResult<()> {
        // Put Blob replaces metadata too, so resend what the reference holds
        let metadata = blob.metadata.clone();
        let etag = self
            .put_blob(blob, data, &metadata, blob.etag.as_deref())
            .await?;
        blob.etag = etag;
        Ok(())
    }

    async fn delete(&self, blob: &BlobRef) -> StorageResult<()> {
        let response = self
            .send(
                Method::DELETE,
                self.blob_url(&blob.container, &blob.name)?,
                RequestOptions {
                    if_match: blob.etag.as_deref(),
                    ..Default::default()
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from("Delete", &blob.name, response).await);
        }

        debug!("Deleted blob '{}' from '{}'", blob.name, blob.container);
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

        let response = self
            .send(
                Method::PUT,
                self.blob_url(&blob.container, &blob.name)?,
                RequestOptions {
                    headers: Self::metadata_headers(&updated.metadata)?,
                    query: vec![("comp", "metadata".to_string())],
                    if_match: blob.etag.as_deref(),
                    ..Default::default()
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from("Set metadata", &blob.name, response).await);
        }

        updated.etag = Self::etag_from(response.headers()).or(updated.etag);
        *blob = updated;

        debug!("Updated metadata of blob '{}'", blob.name);
        Ok(())
    }

    async fn reload_metadata(&self, blob: &mut BlobRef) -> StorageResult<()> {
        let response = self.head_blob(&blob.container, &blob.name).await?;
        if !response.status().is_success() {
            return Err(Self::error_from("Fetch attributes", &blob.name, response).await);
        }

        blob.etag = Self::etag_from(response.headers());
        blob.metadata = Self::metadata_from(response.headers());
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
        self.ensure_container(&self.archive_container).await?;

        let response = self
            .send(
                Method::PUT,
                self.blob_url(&self.archive_container, &blob.name)?,
                RequestOptions {
                    headers: vec![("x-ms-copy-source".to_string(), blob.uri.clone())],
                    ..Default::default()
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from("Archive copy", &blob.name, response).await);
        }

        let copy_status = response
            .headers()
            .get(COPY_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("pending")
            .to_string();
        info!(
            "Archive copy of '{}' into '{}' started (status: {})",
            blob.name, self.archive_container, copy_status
        );

        if copy_status == "pending" && self.archive_wait_for_copy {
            self.wait_for_copy(&self.archive_container, &blob.name)
                .await
                .inspect_err(|e| warn!("Archive copy of '{}' did not complete: {}", blob.name, e))?;
        }

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Azure
    }
}
