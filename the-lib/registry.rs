//! Authoritative map of open files.
//!
//! The registry owns file identity, the last saved snapshot of every file,
//! its dirty flag and the stores it persists to. Live text lives in the
//! editor handle, see [`crate::binding`].
//!
//! Iteration follows registration order. Closing the active file picks the
//! first remaining record in that order as replacement.

use std::{
  borrow::Cow,
  collections::HashMap,
  num::NonZeroUsize,
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      Ordering,
    },
  },
};

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
  Tendril,
  language,
  path_tree::{
    self,
    TreeError,
  },
  storage::StorageHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(NonZeroUsize);

impl FileId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for FileId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("`{path}` is already open as file {existing:?}")]
  DuplicatePath { path: String, existing: FileId },
  #[error("unknown file {0:?}")]
  UnknownFile(FileId),
  #[error("{name} has unsaved changes")]
  NeedsConfirmation { id: FileId, name: String },
  #[error(transparent)]
  Path(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Shared dirty bit of one file.
///
/// The editor change callback and the registry both hold a clone, so the
/// callback can latch the flag without going through the registry.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
  pub fn get(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }

  /// Stores `dirty` and returns the previous value.
  pub(crate) fn replace(&self, dirty: bool) -> bool {
    self.0.swap(dirty, Ordering::AcqRel)
  }
}

/// Where a file was last persisted on the hosting side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBinding {
  pub path:           String,
  pub last_known_sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
  None,
  Local,
  Remote,
  /// Saved locally and pushed to the remote.
  Mirrored,
}

/// Persistence targets of a file.
///
/// A file starts with at most one target. Pushing a locally saved file keeps
/// its handle and adds the remote half, so both may be present.
#[derive(Debug, Clone, Default)]
pub struct Backing {
  local:  Option<Arc<dyn StorageHandle>>,
  remote: Option<RemoteBinding>,
}

impl Backing {
  pub fn none() -> Self {
    Self::default()
  }

  pub fn local(handle: Arc<dyn StorageHandle>) -> Self {
    Self {
      local:  Some(handle),
      remote: None,
    }
  }

  pub fn remote(path: impl Into<String>, last_known_sha: Option<String>) -> Self {
    Self {
      local:  None,
      remote: Some(RemoteBinding {
        path: path.into(),
        last_known_sha,
      }),
    }
  }

  pub fn kind(&self) -> BackingKind {
    match (&self.local, &self.remote) {
      (None, None) => BackingKind::None,
      (Some(_), None) => BackingKind::Local,
      (None, Some(_)) => BackingKind::Remote,
      (Some(_), Some(_)) => BackingKind::Mirrored,
    }
  }

  pub fn local_handle(&self) -> Option<&Arc<dyn StorageHandle>> {
    self.local.as_ref()
  }

  pub fn remote_binding(&self) -> Option<&RemoteBinding> {
    self.remote.as_ref()
  }
}

/// Input of [`FileRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct FileSpec {
  pub name:     String,
  pub content:  String,
  pub language: Option<String>,
  pub backing:  Backing,
  /// Logical path, defaults to `name`.
  pub path:     Option<String>,
}

impl FileSpec {
  pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      content: content.into(),
      ..Self::default()
    }
  }

  pub fn with_path(mut self, path: impl Into<String>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn with_language(mut self, language: impl Into<String>) -> Self {
    self.language = Some(language.into());
    self
  }

  pub fn with_backing(mut self, backing: Backing) -> Self {
    self.backing = backing;
    self
  }

  /// Normalized logical path of the spec.
  pub fn logical_path(&self) -> std::result::Result<String, TreeError> {
    path_tree::normalize_path(self.path.as_deref().unwrap_or(&self.name))
  }
}

#[derive(Debug)]
pub struct FileRecord {
  id:             FileId,
  display_name:   Tendril,
  path:           String,
  language:       String,
  cached_content: String,
  dirty:          DirtyFlag,
  backing:        Backing,
}

impl FileRecord {
  pub fn id(&self) -> FileId {
    self.id
  }

  pub fn display_name(&self) -> Cow<'_, str> {
    if self.display_name.is_empty() {
      Cow::Borrowed(path_tree::leaf_name(&self.path))
    } else {
      Cow::Borrowed(self.display_name.as_str())
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn language(&self) -> &str {
    &self.language
  }

  /// Content as of the last successful save or push.
  pub fn cached_content(&self) -> &str {
    &self.cached_content
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty.get()
  }

  pub fn dirty_flag(&self) -> &DirtyFlag {
    &self.dirty
  }

  pub fn backing(&self) -> &Backing {
    &self.backing
  }
}

#[derive(Debug)]
pub struct FileRegistry {
  records: IndexMap<FileId, FileRecord>,
  paths:   HashMap<String, FileId>,
  next_id: NonZeroUsize,
}

impl Default for FileRegistry {
  fn default() -> Self {
    Self {
      records: IndexMap::new(),
      paths:   HashMap::new(),
      next_id: NonZeroUsize::MIN,
    }
  }
}

impl FileRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn register(&mut self, spec: FileSpec) -> Result<FileId> {
    let path = spec.logical_path()?;
    if let Some(existing) = self.paths.get(&path) {
      return Err(RegistryError::DuplicatePath {
        path,
        existing: *existing,
      });
    }

    let id = FileId::new(self.next_id);
    self.next_id = self.next_id.saturating_add(1);

    let language = spec
      .language
      .unwrap_or_else(|| language::detect_language(&spec.name).to_string());
    let record = FileRecord {
      id,
      display_name: spec.name.into(),
      path: path.clone(),
      language,
      cached_content: spec.content,
      dirty: DirtyFlag::default(),
      backing: spec.backing,
    };

    self.paths.insert(path, id);
    self.records.insert(id, record);
    Ok(id)
  }

  pub fn get(&self, id: FileId) -> Option<&FileRecord> {
    self.records.get(&id)
  }

  pub fn get_by_path(&self, path: &str) -> Option<&FileRecord> {
    let path = path_tree::normalize_path(path).ok()?;
    self.paths.get(&path).and_then(|id| self.records.get(id))
  }

  pub fn contains(&self, id: FileId) -> bool {
    self.records.contains_key(&id)
  }

  /// Records in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
    self.records.values()
  }

  pub fn ids(&self) -> Vec<FileId> {
    self.records.keys().copied().collect()
  }

  pub fn first(&self) -> Option<FileId> {
    self.records.keys().next().copied()
  }

  fn record_mut(&mut self, id: FileId) -> Result<&mut FileRecord> {
    self
      .records
      .get_mut(&id)
      .ok_or(RegistryError::UnknownFile(id))
  }

  /// Returns whether the flag changed.
  pub fn mark_dirty(&mut self, id: FileId) -> Result<bool> {
    Ok(!self.record_mut(id)?.dirty.replace(true))
  }

  /// Returns whether the flag changed. Only call after a confirmed persist.
  pub fn clear_dirty(&mut self, id: FileId) -> Result<bool> {
    Ok(self.record_mut(id)?.dirty.replace(false))
  }

  /// Stores `content` as the saved snapshot and clears the dirty flag.
  pub fn mark_persisted(&mut self, id: FileId, content: String) -> Result<()> {
    let record = self.record_mut(id)?;
    record.cached_content = content;
    record.dirty.replace(false);
    Ok(())
  }

  /// Replaces the saved snapshot without touching the dirty flag.
  pub fn store_snapshot(&mut self, id: FileId, content: String) -> Result<()> {
    self.record_mut(id)?.cached_content = content;
    Ok(())
  }

  pub fn set_language(&mut self, id: FileId, language: impl Into<String>) -> Result<()> {
    self.record_mut(id)?.language = language.into();
    Ok(())
  }

  pub fn set_local_backing(&mut self, id: FileId, handle: Arc<dyn StorageHandle>) -> Result<()> {
    self.record_mut(id)?.backing.local = Some(handle);
    Ok(())
  }

  pub fn set_remote_backing(
    &mut self,
    id: FileId,
    path: impl Into<String>,
    sha: Option<String>,
  ) -> Result<()> {
    self.record_mut(id)?.backing.remote = Some(RemoteBinding {
      path:           path.into(),
      last_known_sha: sha,
    });
    Ok(())
  }

  /// Removes a clean file. Dirty files are left untouched and reported as
  /// [`RegistryError::NeedsConfirmation`].
  pub fn close(&mut self, id: FileId) -> Result<FileRecord> {
    let record = self.records.get(&id).ok_or(RegistryError::UnknownFile(id))?;
    if record.is_dirty() {
      return Err(RegistryError::NeedsConfirmation {
        id,
        name: record.display_name().into_owned(),
      });
    }
    self.force_close(id)
  }

  /// Removes a file regardless of unsaved changes.
  pub fn force_close(&mut self, id: FileId) -> Result<FileRecord> {
    let record = self
      .records
      .shift_remove(&id)
      .ok_or(RegistryError::UnknownFile(id))?;
    self.paths.remove(&record.path);
    Ok(record)
  }

  /// Removes every record, returning them in registration order.
  pub fn drain(&mut self) -> Vec<FileRecord> {
    self.paths.clear();
    self.records.drain(..).map(|(_, record)| record).collect()
  }
}
