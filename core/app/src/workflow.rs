//! The sign-in, create-folder, upload workflow.
//!
//! One run moves strictly forward through
//! `Idle → AwaitingIdentity → Authenticating → CreatingContainer → Uploading → Done`.
//! Any error moves it to `Failed` and ends the run; nothing loops back.

use std::path::Path;
use std::sync::Arc;

use cloudlink_auth::{AuthorizationScope, CredentialExchanger, IdentityProvider};
use cloudlink_common::{AccountId, Error, ErrorKind, Result};
use cloudlink_storage::{file_stream, ByteStream, Container, RemoteStorage, UploadedObject};

use crate::config::DEFAULT_FOLDER_NAME;

/// Content type used when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stage of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    AwaitingIdentity,
    Authenticating,
    CreatingContainer,
    Uploading,
    Done,
    Failed(ErrorKind),
}

impl WorkflowState {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed(_))
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;

        match (*self, next) {
            (Idle, AwaitingIdentity)
            | (AwaitingIdentity, Authenticating)
            | (Authenticating, CreatingContainer)
            | (CreatingContainer, Uploading)
            | (Uploading, Done) => true,
            (current, Failed(_)) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// State of one run plus the path it took.
#[derive(Debug, Clone)]
pub struct Progress {
    state: WorkflowState,
    transitions: Vec<WorkflowState>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            transitions: vec![WorkflowState::Idle],
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn transitions(&self) -> &[WorkflowState] {
        &self.transitions
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// - `InvalidInput` if the transition table does not allow the move
    pub fn advance(&mut self, next: WorkflowState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::InvalidInput(format!(
                "Illegal workflow transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "Workflow transition");
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// What to upload and where.
pub struct UploadRequest {
    /// Display name of the folder to create.
    pub folder_name: String,
    /// Name the uploaded file gets.
    pub object_name: String,
    pub content_type: String,
    pub content: ByteStream,
}

impl UploadRequest {
    /// Upload the file at `path` under its own file name.
    ///
    /// The file is not opened until the upload stage.
    ///
    /// # Errors
    /// - `InvalidInput` if `path` has no usable file name
    pub fn from_file(path: &Path) -> Result<Self> {
        let object_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("No file name in {}", path.display())))?
            .to_string();

        Ok(Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            object_name,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            content: file_stream(path),
        })
    }

    pub fn with_folder(mut self, folder_name: impl Into<String>) -> Self {
        self.folder_name = folder_name.into();
        self
    }

    pub fn with_name(mut self, object_name: impl Into<String>) -> Self {
        self.object_name = object_name.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Server-side result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub account: AccountId,
    pub container: Container,
    pub object: UploadedObject,
}

impl UploadReceipt {
    pub fn container_id(&self) -> &str {
        &self.container.id
    }

    pub fn object_id(&self) -> &str {
        &self.object.id
    }
}

/// Outcome of one run.
#[derive(Debug)]
pub struct WorkflowRun {
    pub final_state: WorkflowState,
    pub transitions: Vec<WorkflowState>,
    pub result: Result<UploadReceipt>,
}

/// Wires the identity broker, credential exchanger and storage client together.
///
/// Holds no per-run state; each call to [`Workflow::run`] owns its own
/// assertion, credential and container.
pub struct Workflow {
    identity: Arc<dyn IdentityProvider>,
    exchanger: Arc<dyn CredentialExchanger>,
    storage: Arc<dyn RemoteStorage>,
    scope: AuthorizationScope,
}

impl Workflow {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        exchanger: Arc<dyn CredentialExchanger>,
        storage: Arc<dyn RemoteStorage>,
        scope: AuthorizationScope,
    ) -> Self {
        Self {
            identity,
            exchanger,
            storage,
            scope,
        }
    }

    /// Run the workflow once.
    ///
    /// Failures are logged and reported in the returned run; none are retried.
    pub async fn run(&self, request: UploadRequest) -> WorkflowRun {
        let mut progress = Progress::new();
        let result = self.drive(&mut progress, request).await;

        match &result {
            Ok(receipt) => tracing::info!(
                container_id = receipt.container_id(),
                object_id = receipt.object_id(),
                "Workflow complete"
            ),
            Err(e) => {
                tracing::error!(stage = ?progress.state(), "Workflow failed: {}", e);
                if let Err(illegal) = progress.advance(WorkflowState::Failed(e.kind())) {
                    tracing::error!("{}", illegal);
                }
            }
        }

        WorkflowRun {
            final_state: progress.state(),
            transitions: progress.transitions().to_vec(),
            result,
        }
    }

    async fn drive(&self, progress: &mut Progress, request: UploadRequest) -> Result<UploadReceipt> {
        progress.advance(WorkflowState::AwaitingIdentity)?;
        let assertion = self.identity.request_identity().await?;
        let hint = assertion.account.clone();

        progress.advance(WorkflowState::Authenticating)?;
        let credential = self.exchanger.exchange(assertion).await?;
        // A hinted account must be the one the provider actually signed in.
        let requested = hint.unwrap_or_else(|| credential.account.to_string());
        let client = self
            .exchanger
            .authorize(credential, &requested, self.scope)?;
        let account = client.account().clone();

        progress.advance(WorkflowState::CreatingContainer)?;
        let container = self
            .storage
            .create_container(&client, &request.folder_name)
            .await?;
        if container.id.is_empty() {
            return Err(Error::Remote(
                "Folder was created without an id".to_string(),
            ));
        }

        progress.advance(WorkflowState::Uploading)?;
        let object = self
            .storage
            .upload_object(
                &client,
                &container,
                &request.object_name,
                request.content,
                &request.content_type,
            )
            .await?;

        progress.advance(WorkflowState::Done)?;

        Ok(UploadReceipt {
            account,
            container,
            object,
        })
    }
}
