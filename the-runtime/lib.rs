//! Asynchronous side of the workspace: filesystem storage, directory walks,
//! remote clones, saves, pushes and reloads.

pub mod reload;
pub mod storage;
pub mod sync;

pub use storage::{
  DirEntry,
  DirectorySource,
  EntryKind,
  FsDirectory,
  FsHandle,
  WalkOptions,
};
pub use sync::{
  BulkReport,
  OperationState,
  ReloadOutcome,
  SyncController,
  SyncError,
  SyncOptions,
  Truncated,
};
