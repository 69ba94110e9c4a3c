//! Common utilities and types shared across CloudLink modules.
//!
//! This module provides the error taxonomy used by every stage of the
//! sign-in and upload workflow, along with validated identity types.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{AccountId, Secret};
