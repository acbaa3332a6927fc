//! Capability interface for persisting a single file.
//!
//! Handles are owned by the host (file pickers, directory walks) and lent to
//! file records through [`crate::registry::Backing`]. The core never opens
//! files on its own.

use std::{
  borrow::Cow,
  fmt,
  io,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("{name}: {source}")]
  Io {
    name:   String,
    #[source]
    source: io::Error,
  },
  #[error("{0}: permission denied")]
  PermissionDenied(String),
  #[error("{0}: not found")]
  NotFound(String),
}

impl StorageError {
  /// Classifies an IO error raised while touching `name`.
  pub fn io(name: impl Into<String>, source: io::Error) -> Self {
    let name = name.into();
    match source.kind() {
      io::ErrorKind::NotFound => Self::NotFound(name),
      io::ErrorKind::PermissionDenied => Self::PermissionDenied(name),
      _ => Self::Io { name, source },
    }
  }
}

#[async_trait]
pub trait StorageHandle: Send + Sync + fmt::Debug {
  /// Leaf name suggested for the file (used for display and save dialogs).
  fn name(&self) -> Cow<'_, str>;

  async fn read(&self) -> Result<Vec<u8>, StorageError>;

  async fn write(&self, bytes: &[u8]) -> Result<(), StorageError>;
}
