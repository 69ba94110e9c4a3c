//! Remote storage trait definition.

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::io::ReaderStream;

use cloudlink_auth::AuthorizedClient;
use cloudlink_common::{Error, Result};

/// MIME type marking a resource as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Kind of resource created on the storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Folder-like grouping resource.
    Folder,
    /// Plain file.
    File,
}

impl ResourceKind {
    /// Type marker sent with create requests, if the kind has one.
    pub fn type_marker(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Folder => Some(FOLDER_MIME_TYPE),
            ResourceKind::File => None,
        }
    }
}

/// A folder acknowledged by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Server-assigned identifier; never empty.
    pub id: String,
    /// Display name.
    pub name: String,
    pub kind: ResourceKind,
}

/// A file stored inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Server-assigned identifier; never empty.
    pub id: String,
    pub name: String,
    /// Identifier of the parent container.
    pub parent_id: String,
    pub content_type: String,
    /// Size in bytes as reported by the server, or as sent.
    pub size: u64,
}

/// Byte stream type for upload operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Stream the contents of a local file.
///
/// The file is opened on first poll, so a missing or unreadable source
/// surfaces as an `Io` item rather than at construction.
pub fn file_stream(path: impl Into<PathBuf>) -> ByteStream {
    let path = path.into();
    let opened = stream::once(async move { tokio::fs::File::open(path).await });

    let content = opened
        .map(|file| match file {
            Ok(file) => ReaderStream::new(file)
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from))
                .left_stream(),
            Err(e) => stream::once(async move { Err(Error::Io(e)) }).right_stream(),
        })
        .flatten();

    Box::pin(content)
}

/// Stream an in-memory buffer.
pub fn bytes_stream(data: Vec<u8>) -> ByteStream {
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Drain a byte stream into one buffer, stopping at the first error.
pub async fn read_all(mut content: ByteStream) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = content.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}

/// Storage service the workflow writes to.
///
/// Calls are awaited one at a time; implementations never retry.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Get the backend name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Create a folder named `name`.
    ///
    /// # Postconditions
    /// - The returned container has a non-empty server id
    ///
    /// # Errors
    /// - `Remote` on transport, quota or server failure
    async fn create_container(&self, client: &AuthorizedClient, name: &str) -> Result<Container>;

    /// Upload `content` into `parent`.
    ///
    /// The content is read in full before anything is sent. Either an object
    /// with a server id is returned or nothing was created.
    ///
    /// # Errors
    /// - `Io` if the local source cannot be read; no request is made
    /// - `Remote` on transport or server failure
    async fn upload_object(
        &self,
        client: &AuthorizedClient,
        parent: &Container,
        name: &str,
        content: ByteStream,
        content_type: &str,
    ) -> Result<UploadedObject>;
}

/// Validate arguments shared by every backend.
pub(crate) fn check_upload_args(parent: &Container, name: &str, content_type: &str) -> Result<()> {
    if parent.id.is_empty() {
        return Err(Error::InvalidInput(
            "Parent container has no id".to_string(),
        ));
    }
    if name.is_empty() {
        return Err(Error::InvalidInput("Object name cannot be empty".to_string()));
    }
    if content_type.is_empty() {
        return Err(Error::InvalidInput("Content type cannot be empty".to_string()));
    }
    // Content type is written verbatim into part headers.
    if content_type.chars().any(char::is_control) {
        return Err(Error::InvalidInput(format!(
            "Content type contains control characters: {:?}",
            content_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_folder_type_marker() {
        assert_eq!(ResourceKind::Folder.type_marker(), Some(FOLDER_MIME_TYPE));
        assert_eq!(ResourceKind::File.type_marker(), None);
    }

    #[tokio::test]
    async fn test_file_stream_reads_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"jpeg bytes").unwrap();

        let data = read_all(file_stream(file.path())).await.unwrap();
        assert_eq!(data, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_file_stream_missing_source_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_all(file_stream(dir.path().join("missing.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_upload_args_require_parent_id() {
        let parent = Container {
            id: String::new(),
            name: "Backup Folder".to_string(),
            kind: ResourceKind::Folder,
        };
        assert!(check_upload_args(&parent, "photo.jpg", "image/jpg").is_err());
    }

    #[test]
    fn test_upload_args_reject_header_injection() {
        let parent = Container {
            id: "F1".to_string(),
            name: "Backup Folder".to_string(),
            kind: ResourceKind::Folder,
        };
        assert!(check_upload_args(&parent, "photo.jpg", "image/jpg").is_ok());

        let err = check_upload_args(&parent, "photo.jpg", "image/jpg\r\nX-Injected: 1").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
