//! Google Drive storage backend for CloudLink.
//!
//! This module provides:
//! - Folder creation tagged with the Drive folder MIME type
//! - Single-request multipart uploads carrying parent and content type
//! - Bearer authentication from an [`AuthorizedClient`](cloudlink_auth::AuthorizedClient)

pub mod client;
pub mod provider;

pub use client::{DriveClient, DriveEndpoints, DriveFile};
pub use provider::DriveStorage;
