//! CloudLink application layer.
//!
//! Ties sign-in, credential exchange and remote storage into a single
//! upload workflow, and owns the on-disk configuration.

pub mod config;
pub mod workflow;

pub use config::AppConfig;
pub use workflow::{
    Progress, UploadReceipt, UploadRequest, Workflow, WorkflowRun, WorkflowState,
    DEFAULT_CONTENT_TYPE,
};
