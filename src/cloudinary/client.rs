use std::time::Duration;

use reqwest::Client;
use sha1::{Digest, Sha1};

use super::error::ApiError;
use super::types::{Resource, ResourcePage, UploadReceipt};
use crate::config::Credentials;

/// Maximum listing entries per admin-API request (provider limit).
pub const PAGE_SIZE: u32 = 500;

/// Async seam over the provider's list/download/upload operations.
///
/// The orchestrator holds one `Arc<dyn MediaApi>` per account — source and
/// destination — and passes the right handle into each call explicitly.
/// Object-safe so tests can substitute in-memory stores.
#[async_trait::async_trait]
pub trait MediaApi: Send + Sync {
    /// Fetch one page of the resource listing under a path prefix.
    async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
    ) -> Result<ResourcePage, ApiError>;

    /// Download raw bytes from a delivery URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError>;

    /// Create a folder. Idempotent on the provider side; callers treat
    /// failures as best-effort.
    async fn create_folder(&self, folder: &str) -> Result<(), ApiError>;

    /// Upload bytes under the given public_id with overwrite disabled and
    /// filename-derived naming off.
    async fn upload(&self, public_id: &str, data: Vec<u8>) -> Result<UploadReceipt, ApiError>;
}

/// REST client bound to a single account's credentials.
pub struct CloudinaryClient {
    http: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl CloudinaryClient {
    /// Build a client with a per-request timeout covering connect and body.
    pub fn new(credentials: Credentials, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            cloud_name: credentials.cloud_name,
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
        })
    }

    fn api_base(&self) -> String {
        format!("https://api.cloudinary.com/v1_1/{}", self.cloud_name)
    }

    /// Read a non-success response into a `Status` error, keeping whatever
    /// body text the provider sent (admin-API errors carry a JSON message).
    async fn status_error(endpoint: &str, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        ApiError::Status {
            status,
            endpoint: endpoint.to_string(),
            detail,
        }
    }
}

/// Canonical query string the upload signature is computed over: non-empty
/// params (minus `file`, `api_key`, `resource_type`) sorted by name and
/// joined with `&`.
fn string_to_sign(params: &[(&str, String)]) -> String {
    let mut signable: Vec<&(&str, String)> =
        params.iter().filter(|(_, v)| !v.is_empty()).collect();
    signable.sort_by_key(|(k, _)| *k);
    signable
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `signature = SHA1(canonical_params + api_secret)`, hex-encoded.
fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait::async_trait]
impl MediaApi for CloudinaryClient {
    async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
    ) -> Result<ResourcePage, ApiError> {
        let endpoint = "resources/image/upload";
        let url = format!("{}/{}", self.api_base(), endpoint);

        let mut query: Vec<(&str, String)> = vec![
            ("prefix", prefix.to_string()),
            ("max_results", PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&query)
            .send()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(endpoint, response).await);
        }

        response
            .json::<ResourcePage>()
            .await
            .map_err(|e| ApiError::http(endpoint, e))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        // Delivery URLs are public CDN endpoints; no auth header.
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::http(url, e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(url, response).await);
        }

        let bytes = response.bytes().await.map_err(|e| ApiError::http(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn create_folder(&self, folder: &str) -> Result<(), ApiError> {
        let endpoint = format!("folders/{}", folder);
        let url = format!("{}/{}", self.api_base(), endpoint);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(|e| ApiError::http(&endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(&endpoint, response).await);
        }
        Ok(())
    }

    async fn upload(&self, public_id: &str, data: Vec<u8>) -> Result<UploadReceipt, ApiError> {
        let endpoint = "auto/upload";
        let url = format!("{}/{}", self.api_base(), endpoint);

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params: Vec<(&str, String)> = vec![
            ("overwrite", "false".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("unique_filename", "false".to_string()),
            ("use_filename", "false".to_string()),
        ];
        let signature = sign(&params, &self.api_secret);

        let mut form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(data).file_name("file"));
        for (name, value) in &params {
            form = form.text(*name, value.clone());
        }
        form = form
            .text("api_key", self.api_key.clone())
            .text("signature", signature);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(endpoint, response).await);
        }

        response
            .json::<UploadReceipt>()
            .await
            .map_err(|e| ApiError::http(endpoint, e))
    }
}
