//! Remote storage abstraction for CloudLink.
//!
//! This module provides a trait-based interface for the storage service the
//! workflow writes to, a Google Drive backend, and an in-memory backend.
//!
//! # Design Principles
//! - Folder first: an upload always names a container the server acknowledged
//! - Atomic uploads: content is read fully before the request is sent
//! - No retries: every failure is returned to the caller as-is

pub mod gdrive;
pub mod memory;
pub mod provider;

pub use gdrive::{DriveEndpoints, DriveStorage};
pub use memory::{MemoryStorage, StorageCall};
pub use provider::{
    bytes_stream, file_stream, read_all, ByteStream, Container, RemoteStorage, ResourceKind,
    UploadedObject, FOLDER_MIME_TYPE,
};
