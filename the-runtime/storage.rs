//! Filesystem backed storage handles and directory sources.

use std::{
  borrow::Cow,
  cmp::Ordering,
  fmt,
  path::{
    Path,
    PathBuf,
  },
  sync::Arc,
};

use async_trait::async_trait;
use globset::{
  Glob,
  GlobSet,
  GlobSetBuilder,
};
use the_lib::storage::{
  StorageError,
  StorageHandle,
};

/// A single file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsHandle {
  path: PathBuf,
}

impl FsHandle {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl StorageHandle for FsHandle {
  fn name(&self) -> Cow<'_, str> {
    match self.path.file_name() {
      Some(name) => name.to_string_lossy(),
      None => self.path.to_string_lossy(),
    }
  }

  async fn read(&self) -> Result<Vec<u8>, StorageError> {
    tokio::fs::read(&self.path)
      .await
      .map_err(|err| StorageError::io(self.path.display().to_string(), err))
  }

  async fn write(&self, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|err| StorageError::io(parent.display().to_string(), err))?;
    }
    tokio::fs::write(&self.path, bytes)
      .await
      .map_err(|err| StorageError::io(self.path.display().to_string(), err))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  Directory,
  File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
  pub name: String,
  pub kind: EntryKind,
}

impl DirEntry {
  pub fn file(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: EntryKind::File,
    }
  }

  pub fn directory(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: EntryKind::Directory,
    }
  }

  pub fn is_dir(&self) -> bool {
    self.kind == EntryKind::Directory
  }
}

/// Walk order: directories first, then case-insensitive name.
pub fn entry_cmp(a: &DirEntry, b: &DirEntry) -> Ordering {
  match (a.is_dir(), b.is_dir()) {
    (true, false) => Ordering::Less,
    (false, true) => Ordering::Greater,
    _ => {
      a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
    },
  }
}

/// A directory tree the host granted access to.
///
/// Paths are logical, `/` separated and relative to the root; the empty
/// path is the root itself.
#[async_trait]
pub trait DirectorySource: Send + Sync + fmt::Debug {
  /// Display name of the root.
  fn name(&self) -> Cow<'_, str>;

  async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StorageError>;

  fn file(&self, path: &str) -> Arc<dyn StorageHandle>;
}

#[derive(Debug, Clone)]
pub struct FsDirectory {
  root: PathBuf,
}

impl FsDirectory {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn resolve(&self, path: &str) -> PathBuf {
    path
      .split('/')
      .filter(|segment| !segment.is_empty())
      .fold(self.root.clone(), |acc, segment| acc.join(segment))
  }
}

#[async_trait]
impl DirectorySource for FsDirectory {
  fn name(&self) -> Cow<'_, str> {
    match self.root.file_name() {
      Some(name) => name.to_string_lossy(),
      None => self.root.to_string_lossy(),
    }
  }

  async fn list(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
    let dir = self.resolve(path);
    let io_err = |err| StorageError::io(dir.display().to_string(), err);

    let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(io_err)? {
      let name = entry.file_name().to_string_lossy().into_owned();
      let Ok(file_type) = entry.file_type().await else {
        log::debug!("skipping unreadable entry {}", entry.path().display());
        continue;
      };
      let kind = if file_type.is_symlink() {
        // Only linked files are followed; a linked directory may point at
        // an ancestor and never end.
        match tokio::fs::metadata(entry.path()).await {
          Ok(metadata) if metadata.is_file() => EntryKind::File,
          Ok(metadata) if metadata.is_dir() => {
            log::debug!("skipping linked directory {}", entry.path().display());
            continue;
          },
          _ => {
            log::debug!("skipping broken link {}", entry.path().display());
            continue;
          },
        }
      } else if file_type.is_dir() {
        EntryKind::Directory
      } else if file_type.is_file() {
        EntryKind::File
      } else {
        continue;
      };
      entries.push(DirEntry { name, kind });
    }
    Ok(entries)
  }

  fn file(&self, path: &str) -> Arc<dyn StorageHandle> {
    Arc::new(FsHandle::new(self.resolve(path)))
  }
}

/// Which entries a directory import skips.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
  include_hidden: bool,
  ignore:         Option<GlobSet>,
}

impl WalkOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn include_hidden(mut self, include: bool) -> Self {
    self.include_hidden = include;
    self
  }

  /// Skips entries whose logical path or name matches one of `patterns`.
  pub fn ignore<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, globset::Error> {
    if patterns.is_empty() {
      self.ignore = None;
      return Ok(self);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
      builder.add(Glob::new(pattern.as_ref())?);
    }
    self.ignore = Some(builder.build()?);
    Ok(self)
  }

  pub fn skips(&self, path: &str, name: &str) -> bool {
    if !self.include_hidden && name.starts_with('.') {
      return true;
    }
    self
      .ignore
      .as_ref()
      .is_some_and(|set| set.is_match(path) || set.is_match(name))
  }
}
