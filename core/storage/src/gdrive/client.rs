//! Google Drive API client.

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use cloudlink_auth::AuthorizedClient;
use cloudlink_common::{Error, Result};

use crate::provider::FOLDER_MIME_TYPE;

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested on every create call.
const FILE_FIELDS: &str = "id,name,mimeType,size,parents";

/// Prefix of the separator for multipart/related upload bodies.
const BOUNDARY_PREFIX: &str = "CloudLinkBoundary";

/// Base URLs of the Drive API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEndpoints {
    /// Metadata API base.
    pub api_base: String,
    /// Media upload API base.
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes (only for files, not folders).
    #[serde(default)]
    pub size: Option<String>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Create a new Drive client.
    ///
    /// # Errors
    /// - `InvalidInput` if the HTTP client cannot be built
    pub fn new(endpoints: DriveEndpoints) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("CloudLink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, endpoints })
    }

    /// Create a folder.
    pub async fn create_folder(
        &self,
        auth: &AuthorizedClient,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files", self.endpoints.api_base);

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth.authorization_header())
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("Failed to create folder: {}", e)))?;

        self.handle_response(response).await
    }

    /// Upload a file with metadata in one multipart request.
    pub async fn upload_multipart(
        &self,
        auth: &AuthorizedClient,
        name: &str,
        parent_id: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files", self.endpoints.upload_base);

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
            "mimeType": content_type
        });

        let (boundary, body) = multipart_related_body(&metadata, content_type, &data)?;

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth.authorization_header())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Handle API response with error checking.
    async fn handle_response(&self, response: reqwest::Response) -> Result<DriveFile> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!("API error: {} - {}", status, body)));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| Error::Remote(format!("Failed to parse response: {}", e)))?;

        if file.id.is_empty() {
            return Err(Error::Remote("Server returned an empty id".to_string()));
        }

        Ok(file)
    }
}

/// Build a `multipart/related` body: JSON metadata part, then the payload.
///
/// Returns the boundary with the body; it never occurs inside either part.
fn multipart_related_body(
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Result<(String, Vec<u8>)> {
    let metadata_json = serde_json::to_string(metadata)?;
    let boundary = (0u32..)
        .map(|n| {
            if n == 0 {
                BOUNDARY_PREFIX.to_string()
            } else {
                format!("{}{:08x}", BOUNDARY_PREFIX, n)
            }
        })
        .find(|b| !contains(data, b.as_bytes()) && !metadata_json.contains(b.as_str()))
        .ok_or_else(|| Error::InvalidInput("No usable multipart boundary".to_string()))?;

    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--", boundary).as_bytes());

    Ok((boundary, body))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
