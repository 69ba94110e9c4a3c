//! In-memory storage backend for testing and dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use cloudlink_auth::AuthorizedClient;
use cloudlink_common::{Error, Result};

use crate::provider::{
    check_upload_args, read_all, ByteStream, Container, RemoteStorage, ResourceKind,
    UploadedObject,
};

/// A request the memory backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    CreateContainer {
        name: String,
        kind: ResourceKind,
    },
    UploadObject {
        parent_id: String,
        name: String,
        content_type: String,
    },
}

#[derive(Debug, Default)]
struct State {
    containers: HashMap<String, Container>,
    objects: HashMap<String, (UploadedObject, Vec<u8>)>,
    calls: Vec<StorageCall>,
    next_container: u64,
    next_object: u64,
}

/// In-memory storage backend.
///
/// Ids are deterministic: folders are `F1, F2, …` and objects `U1, U2, …`.
/// Every request that reaches the "server" is recorded; uploads whose local
/// source fails are not.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    fail_containers: Option<String>,
    fail_uploads: Option<String>,
}

impl MemoryStorage {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every container creation fail with a remote error.
    pub fn failing_containers(mut self, reason: impl Into<String>) -> Self {
        self.fail_containers = Some(reason.into());
        self
    }

    /// Make every upload fail with a remote error.
    pub fn failing_uploads(mut self, reason: impl Into<String>) -> Self {
        self.fail_uploads = Some(reason.into());
        self
    }

    /// Requests received so far, in order.
    pub async fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().await.calls.clone()
    }

    /// Stored content of an object.
    pub async fn object_data(&self, id: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .objects
            .get(id)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl RemoteStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_container(&self, _client: &AuthorizedClient, name: &str) -> Result<Container> {
        if name.is_empty() {
            return Err(Error::InvalidInput("Folder name cannot be empty".to_string()));
        }

        let mut state = self.state.lock().await;
        state.calls.push(StorageCall::CreateContainer {
            name: name.to_string(),
            kind: ResourceKind::Folder,
        });

        if let Some(reason) = &self.fail_containers {
            return Err(Error::Remote(reason.clone()));
        }

        state.next_container += 1;
        let container = Container {
            id: format!("F{}", state.next_container),
            name: name.to_string(),
            kind: ResourceKind::Folder,
        };
        state
            .containers
            .insert(container.id.clone(), container.clone());

        Ok(container)
    }

    async fn upload_object(
        &self,
        _client: &AuthorizedClient,
        parent: &Container,
        name: &str,
        content: ByteStream,
        content_type: &str,
    ) -> Result<UploadedObject> {
        check_upload_args(parent, name, content_type)?;

        let data = read_all(content).await?;

        let mut state = self.state.lock().await;
        state.calls.push(StorageCall::UploadObject {
            parent_id: parent.id.clone(),
            name: name.to_string(),
            content_type: content_type.to_string(),
        });

        if let Some(reason) = &self.fail_uploads {
            return Err(Error::Remote(reason.clone()));
        }
        if !state.containers.contains_key(&parent.id) {
            return Err(Error::Remote(format!("Parent not found: {}", parent.id)));
        }

        state.next_object += 1;
        let object = UploadedObject {
            id: format!("U{}", state.next_object),
            name: name.to_string(),
            parent_id: parent.id.clone(),
            content_type: content_type.to_string(),
            size: data.len() as u64,
        };
        state
            .objects
            .insert(object.id.clone(), (object.clone(), data));

        Ok(object)
    }
}
