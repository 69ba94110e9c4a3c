//! Google Drive remote storage implementation.

use async_trait::async_trait;

use cloudlink_auth::AuthorizedClient;
use cloudlink_common::{Error, Result};

use crate::provider::{
    check_upload_args, read_all, ByteStream, Container, RemoteStorage, ResourceKind,
    UploadedObject,
};

use super::client::{DriveClient, DriveEndpoints, DriveFile};

/// Google Drive storage backend.
pub struct DriveStorage {
    client: DriveClient,
}

impl DriveStorage {
    /// Create a Drive backend against `endpoints`.
    pub fn new(endpoints: DriveEndpoints) -> Result<Self> {
        Ok(Self {
            client: DriveClient::new(endpoints)?,
        })
    }

    fn to_container(file: DriveFile) -> Result<Container> {
        if !file.is_folder() {
            return Err(Error::Remote(format!(
                "Created resource {} is not a folder ({})",
                file.id, file.mime_type
            )));
        }
        Ok(Container {
            id: file.id,
            name: file.name,
            kind: ResourceKind::Folder,
        })
    }
}

#[async_trait]
impl RemoteStorage for DriveStorage {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn create_container(&self, client: &AuthorizedClient, name: &str) -> Result<Container> {
        if name.is_empty() {
            return Err(Error::InvalidInput("Folder name cannot be empty".to_string()));
        }

        tracing::info!(folder = name, "Creating folder");
        let folder = self.client.create_folder(client, name, None).await?;
        let container = Self::to_container(folder)?;
        tracing::info!(folder_id = %container.id, "Folder created");

        Ok(container)
    }

    async fn upload_object(
        &self,
        client: &AuthorizedClient,
        parent: &Container,
        name: &str,
        content: ByteStream,
        content_type: &str,
    ) -> Result<UploadedObject> {
        check_upload_args(parent, name, content_type)?;

        let data = read_all(content).await?;
        let sent = data.len() as u64;

        tracing::info!(file = name, parent_id = %parent.id, bytes = sent, "Uploading file");
        let file = self
            .client
            .upload_multipart(client, name, &parent.id, content_type, data)
            .await?;
        tracing::info!(file_id = %file.id, "Upload complete");

        Ok(UploadedObject {
            size: file.size_bytes().unwrap_or(sent),
            id: file.id,
            name: file.name,
            parent_id: parent.id.clone(),
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{bytes_stream, file_stream, FOLDER_MIME_TYPE};
    use chrono::Utc;
    use cloudlink_auth::{AuthorizationScope, SessionCredential};
    use cloudlink_common::{AccountId, Secret};
    use httpmock::prelude::*;

    fn auth() -> AuthorizedClient {
        let credential = SessionCredential {
            access_token: Secret::new("access"),
            account: AccountId::parse("a@example.com").unwrap(),
            granted_scopes: vec![AuthorizationScope::FileAccess.as_uri().to_string()],
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        AuthorizedClient::new(credential, "a@example.com", AuthorizationScope::FileAccess).unwrap()
    }

    fn storage(server: &MockServer) -> DriveStorage {
        DriveStorage::new(DriveEndpoints {
            api_base: server.url("/drive/v3"),
            upload_base: server.url("/upload/drive/v3"),
        })
        .unwrap()
    }

    fn folder() -> Container {
        Container {
            id: "F1".to_string(),
            name: "Backup Folder".to_string(),
            kind: ResourceKind::Folder,
        }
    }

    #[tokio::test]
    async fn test_create_container() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/drive/v3/files");
                then.status(200).json_body(serde_json::json!({
                    "id": "F1",
                    "name": "Backup Folder",
                    "mimeType": FOLDER_MIME_TYPE
                }));
            })
            .await;

        let container = storage(&server)
            .create_container(&auth(), "Backup Folder")
            .await
            .unwrap();
        assert_eq!(container, folder());
    }

    #[tokio::test]
    async fn test_create_container_rejects_non_folder() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/drive/v3/files");
                then.status(200).json_body(serde_json::json!({
                    "id": "X1",
                    "name": "Backup Folder",
                    "mimeType": "text/plain"
                }));
            })
            .await;

        let err = storage(&server)
            .create_container(&auth(), "Backup Folder")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[tokio::test]
    async fn test_upload_object_reports_server_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload/drive/v3/files");
                then.status(200).json_body(serde_json::json!({
                    "id": "U1",
                    "name": "photo.jpg",
                    "mimeType": "image/jpg",
                    "parents": ["F1"]
                }));
            })
            .await;

        let object = storage(&server)
            .upload_object(
                &auth(),
                &folder(),
                "photo.jpg",
                bytes_stream(b"DATA".to_vec()),
                "image/jpg",
            )
            .await
            .unwrap();

        assert_eq!(object.id, "U1");
        assert_eq!(object.parent_id, "F1");
        assert_eq!(object.size, 4);
    }

    #[tokio::test]
    async fn test_unreadable_source_makes_no_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = storage(&server)
            .upload_object(
                &auth(),
                &folder(),
                "photo.jpg",
                file_stream(dir.path().join("missing.jpg")),
                "image/jpg",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_control_characters_in_content_type_make_no_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let err = storage(&server)
            .upload_object(
                &auth(),
                &folder(),
                "photo.jpg",
                bytes_stream(b"DATA".to_vec()),
                "image/jpg\r\nContent-Type: text/html",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        mock.assert_hits_async(0).await;
    }
}
