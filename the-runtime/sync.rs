//! Moves files between the workspace and the stores backing them.
//!
//! The controller never holds the workspace lock across an await: every
//! step reads what it needs under a short lock, performs IO unlocked and
//! then applies the result under a new lock. A bulk import captures the
//! workspace [`Generation`] it created and drops its remaining work as soon
//! as a newer import resets the workspace.

use std::{
  ops::ControlFlow,
  sync::Arc,
};

use futures_util::{
  FutureExt,
  future::BoxFuture,
};
use parking_lot::Mutex;
use thiserror::Error;
use the_lib::{
  FileId,
  Generation,
  SharedWorkspace,
  binding::ContentOrigin,
  path_tree,
  registry::{
    Backing,
    FileSpec,
  },
  storage::{
    StorageError,
    StorageHandle,
  },
  workspace::WorkspaceError,
};
use the_shell_vcs::{
  PutResult,
  RemoteError,
  RemoteRepository,
  RepoRef,
};

use crate::{
  reload::{
    ReloadDecision,
    ReloadTracker,
  },
  storage::{
    DirEntry,
    DirectorySource,
    EntryKind,
    WalkOptions,
    entry_cmp,
  },
};

/// Files fetched per clone unless configured otherwise.
pub const DEFAULT_CLONE_LIMIT: usize = 50;

pub const DEFAULT_COMMIT_MESSAGE: &str = "Update {path}";

#[derive(Debug, Error)]
pub enum SyncError {
  #[error(transparent)]
  Workspace(#[from] WorkspaceError),
  #[error(transparent)]
  Storage(#[from] StorageError),
  #[error(transparent)]
  Remote(RemoteError),
  #[error("{path}: remote changed since last sync ({message})")]
  Conflict { path: String, message: String },
  #[error("file {0:?} has no storage yet, a destination is required")]
  NeedsDestination(FileId),
  #[error("file {0:?} has no local storage to reload from")]
  NotReloadable(FileId),
  #[error("{path} is not valid UTF-8")]
  InvalidUtf8 { path: String },
}

impl From<RemoteError> for SyncError {
  fn from(err: RemoteError) -> Self {
    match err {
      RemoteError::Conflict { path, message } => Self::Conflict { path, message },
      other => Self::Remote(other),
    }
  }
}

impl SyncError {
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::Conflict { .. })
  }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
  #[default]
  InProgress,
  Completed,
  /// A newer bulk import reset the workspace before this one finished.
  Aborted,
}

/// The remote listing had more files than a clone fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
  pub total: usize,
  pub limit: usize,
}

#[derive(Debug)]
pub struct ItemFailure {
  pub path:  String,
  pub error: SyncError,
}

/// Outcome of a bulk operation that ran to its end or was superseded.
///
/// An operation that could not start at all returns an error instead.
#[derive(Debug, Default)]
pub struct BulkReport {
  pub generation: Generation,
  pub state:      OperationState,
  /// Files processed successfully, in processing order.
  pub files:      Vec<FileId>,
  pub failures:   Vec<ItemFailure>,
  pub truncated:  Option<Truncated>,
}

impl BulkReport {
  fn started(generation: Generation) -> Self {
    Self {
      generation,
      ..Self::default()
    }
  }

  fn fail(&mut self, path: impl Into<String>, error: SyncError) {
    let path = path.into();
    log::warn!("{path}: {error}");
    self.failures.push(ItemFailure { path, error });
  }

  fn finish(mut self, flow: ControlFlow<()>) -> Self {
    self.state = match flow {
      ControlFlow::Continue(()) => OperationState::Completed,
      ControlFlow::Break(()) => OperationState::Aborted,
    };
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
  Unchanged,
  Reloaded,
  /// The store changed while the file has unsaved edits.
  ConflictEntered,
  ConflictOngoing,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
  pub clone_limit:    usize,
  pub walk:           WalkOptions,
  /// Commit message for pushes, `{path}` is replaced by the file path.
  pub commit_message: String,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      clone_limit:    DEFAULT_CLONE_LIMIT,
      walk:           WalkOptions::default(),
      commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
    }
  }
}

impl SyncOptions {
  pub fn commit_message_for(&self, path: &str) -> String {
    self.commit_message.replace("{path}", path)
  }
}

fn decode(path: &str, bytes: Vec<u8>) -> Result<String> {
  String::from_utf8(bytes).map_err(|_| {
    SyncError::InvalidUtf8 {
      path: path.to_string(),
    }
  })
}

fn child_path(dir: &str, name: &str) -> String {
  if dir.is_empty() {
    name.to_string()
  } else {
    format!("{dir}/{name}")
  }
}

pub struct SyncController {
  workspace: SharedWorkspace,
  options:   SyncOptions,
  reloads:   Mutex<ReloadTracker>,
}

impl SyncController {
  pub fn new(workspace: SharedWorkspace, options: SyncOptions) -> Self {
    Self {
      workspace,
      options,
      reloads: Mutex::new(ReloadTracker::new()),
    }
  }

  pub fn workspace(&self) -> &SharedWorkspace {
    &self.workspace
  }

  pub fn options(&self) -> &SyncOptions {
    &self.options
  }

  /// Resets the workspace; reload state of the closed files goes with it.
  fn begin_bulk(&self) -> Generation {
    let generation = self.workspace.lock().begin_bulk();
    self.reloads.lock().clear();
    generation
  }

  /// Files in reload conflict that are still open.
  pub fn conflicts(&self) -> Vec<FileId> {
    let workspace = self.workspace.lock();
    let mut reloads = self.reloads.lock();
    reloads.retain(|id| workspace.file(id).is_some());
    reloads.in_conflict().collect()
  }

  fn is_current(&self, generation: Generation) -> bool {
    self.workspace.lock().generation() == generation
  }

  /// Registers one file under `generation`. `Break` means the generation
  /// was superseded.
  fn import_one(
    &self,
    generation: Generation,
    spec: FileSpec,
    report: &mut BulkReport,
  ) -> ControlFlow<()> {
    let path = spec.path.clone().unwrap_or_else(|| spec.name.clone());
    let opened = self.workspace.lock().open_in_generation(generation, spec);
    match opened {
      Ok(id) => {
        log::debug!("imported {path}");
        report.files.push(id);
        ControlFlow::Continue(())
      },
      Err(WorkspaceError::Stale { current, .. }) => {
        log::info!("import {generation} superseded by {current}, stopping at {path}");
        ControlFlow::Break(())
      },
      Err(err) => {
        report.fail(path, err.into());
        ControlFlow::Continue(())
      },
    }
  }

  /// Replaces the workspace with every file below `source`.
  ///
  /// The root is listed before the workspace is touched, so an unreadable
  /// root leaves the current files open. Files that cannot be read or are
  /// not UTF-8 are reported and skipped.
  pub async fn import_directory(&self, source: &dyn DirectorySource) -> Result<BulkReport> {
    let root = source.list("").await?;
    let generation = self.begin_bulk();
    log::info!("importing {} as {generation}", source.name());

    let mut report = BulkReport::started(generation);
    let flow = self
      .walk(source, String::new(), root, generation, &mut report)
      .await;
    let report = report.finish(flow);
    log::info!(
      "imported {} files from {} ({} failed, {:?})",
      report.files.len(),
      source.name(),
      report.failures.len(),
      report.state
    );
    Ok(report)
  }

  fn walk<'a>(
    &'a self,
    source: &'a dyn DirectorySource,
    dir: String,
    mut entries: Vec<DirEntry>,
    generation: Generation,
    report: &'a mut BulkReport,
  ) -> BoxFuture<'a, ControlFlow<()>> {
    async move {
      if !self.is_current(generation) {
        return ControlFlow::Break(());
      }
      entries.sort_by(entry_cmp);

      for entry in entries {
        let path = child_path(&dir, &entry.name);
        if self.options.walk.skips(&path, &entry.name) {
          log::trace!("skipping {path}");
          continue;
        }

        match entry.kind {
          EntryKind::Directory => {
            let children = match source.list(&path).await {
              Ok(children) => children,
              Err(err) => {
                report.fail(path, err.into());
                continue;
              },
            };
            self
              .walk(source, path, children, generation, report)
              .await?;
          },
          EntryKind::File => {
            let handle = source.file(&path);
            let content = match handle.read().await {
              Ok(bytes) => decode(&path, bytes),
              Err(err) => Err(err.into()),
            };
            let content = match content {
              Ok(content) => content,
              Err(err) => {
                report.fail(path, err);
                continue;
              },
            };
            let spec = FileSpec::new(entry.name, content)
              .with_path(path)
              .with_backing(Backing::local(handle));
            self.import_one(generation, spec, report)?;
          },
        }
      }
      ControlFlow::Continue(())
    }
    .boxed()
  }

  /// Replaces the workspace with the files of `repo`, up to the configured
  /// clone limit. Blobs that fail to download are reported and skipped.
  pub async fn clone_repository(
    &self,
    remote: &dyn RemoteRepository,
    repo: &RepoRef,
  ) -> Result<BulkReport> {
    let entries = remote.list_files(repo).await?;
    let total = entries.len();
    let limit = self.options.clone_limit;

    let generation = self.begin_bulk();
    log::info!("cloning {repo} as {generation} ({total} files, limit {limit})");

    let mut report = BulkReport::started(generation);
    if total > limit {
      log::warn!("{repo} has {total} files, only the first {limit} are cloned");
      report.truncated = Some(Truncated { total, limit });
    }

    let mut flow = ControlFlow::Continue(());
    for entry in entries.into_iter().take(limit) {
      if !self.is_current(generation) {
        flow = ControlFlow::Break(());
        break;
      }

      let content = match remote.get_blob(repo, &entry.blob).await {
        Ok(bytes) => decode(&entry.path, bytes),
        Err(err) => Err(err.into()),
      };
      let content = match content {
        Ok(content) => content,
        Err(err) => {
          report.fail(entry.path, err);
          continue;
        },
      };

      let spec = FileSpec::new(path_tree::leaf_name(&entry.path), content)
        .with_path(entry.path.as_str())
        .with_backing(Backing::remote(entry.path.as_str(), Some(entry.blob.sha)));
      flow = self.import_one(generation, spec, &mut report);
      if flow.is_break() {
        break;
      }
    }

    let report = report.finish(flow);
    log::info!(
      "cloned {} files from {repo} ({} failed, {:?})",
      report.files.len(),
      report.failures.len(),
      report.state
    );
    Ok(report)
  }

  /// Opens a single remote file next to the current ones and activates it.
  pub async fn load_remote_file(
    &self,
    remote: &dyn RemoteRepository,
    repo: &RepoRef,
    path: &str,
  ) -> Result<FileId> {
    let file = remote.get_file(repo, path).await?;
    let content = decode(&file.path, file.content)?;
    let spec = FileSpec::new(path_tree::leaf_name(&file.path), content)
      .with_path(file.path.as_str())
      .with_backing(Backing::remote(file.path.as_str(), Some(file.sha)));

    let mut workspace = self.workspace.lock();
    let id = workspace.open(spec)?;
    workspace.switch_to(id)?;
    Ok(id)
  }

  /// Opens a local file next to the current ones and activates it. `path`
  /// defaults to the handle's name.
  pub async fn open_local(&self, handle: Arc<dyn StorageHandle>, path: Option<&str>) -> Result<FileId> {
    let name = handle.name().into_owned();
    let path = path.unwrap_or(name.as_str()).to_string();
    let content = decode(&path, handle.read().await?)?;
    let spec = FileSpec::new(path_tree::leaf_name(&path), content)
      .with_path(path)
      .with_backing(Backing::local(handle));

    let mut workspace = self.workspace.lock();
    let id = workspace.open(spec)?;
    workspace.switch_to(id)?;
    Ok(id)
  }

  /// Writes the live content of `id` to its local storage.
  ///
  /// Files without local storage are written to `destination`, which then
  /// becomes their storage. Without either the save fails with
  /// [`SyncError::NeedsDestination`].
  pub async fn save(&self, id: FileId, destination: Option<Arc<dyn StorageHandle>>) -> Result<()> {
    let existing = {
      let workspace = self.workspace.lock();
      workspace
        .require_file(id)?
        .backing()
        .local_handle()
        .cloned()
    };
    match (existing, destination) {
      (Some(handle), _) => self.write_local(id, handle, false).await,
      (None, Some(destination)) => self.write_local(id, destination, true).await,
      (None, None) => Err(SyncError::NeedsDestination(id)),
    }
  }

  /// Writes the live content of `id` to `destination` and makes it the
  /// file's local storage.
  pub async fn save_as(&self, id: FileId, destination: Arc<dyn StorageHandle>) -> Result<()> {
    self.write_local(id, destination, true).await
  }

  async fn write_local(&self, id: FileId, handle: Arc<dyn StorageHandle>, attach: bool) -> Result<()> {
    let content = self.workspace.lock().read_content(id)?;
    handle.write(content.as_bytes()).await?;

    let clean = {
      let mut workspace = self.workspace.lock();
      if attach {
        workspace.set_local_backing(id, handle.clone())?;
      }
      workspace.mark_persisted(id, content)?
    };
    self.reloads.lock().settle(id);

    if clean {
      log::info!("saved {id:?} to {}", handle.name());
    } else {
      log::info!("saved {id:?} to {}, edits made during the write are kept", handle.name());
    }
    Ok(())
  }

  /// Saves every dirty file that has local storage. Files without storage
  /// are skipped.
  pub async fn save_all(&self) -> BulkReport {
    let (generation, dirty) = {
      let workspace = self.workspace.lock();
      let dirty: Vec<_> = workspace
        .files()
        .filter(|record| record.is_dirty() && record.backing().local_handle().is_some())
        .map(|record| (record.id(), record.path().to_string()))
        .collect();
      (workspace.generation(), dirty)
    };

    let mut report = BulkReport::started(generation);
    for (id, path) in dirty {
      match self.save(id, None).await {
        Ok(()) => report.files.push(id),
        Err(err) => report.fail(path, err),
      }
    }
    report.finish(ControlFlow::Continue(()))
  }

  /// Pushes the live content of `id` to `repo`.
  ///
  /// `remote_path` defaults to the path the file was cloned from, then to
  /// its workspace path. The write is guarded by the last SHA seen for the
  /// file, or by the current remote SHA for files never synced. A stale
  /// guard fails with [`SyncError::Conflict`] and leaves the file dirty.
  pub async fn push(
    &self,
    remote: &dyn RemoteRepository,
    repo: &RepoRef,
    id: FileId,
    remote_path: Option<&str>,
  ) -> Result<PutResult> {
    let (content, path, known_sha) = {
      let workspace = self.workspace.lock();
      let content = workspace.read_content(id)?;
      let record = workspace.require_file(id)?;
      let binding = record.backing().remote_binding();
      let path = match remote_path {
        Some(path) => path_tree::normalize_path(path).map_err(WorkspaceError::from)?,
        None => {
          binding
            .map(|binding| binding.path.clone())
            .unwrap_or_else(|| record.path().to_string())
        },
      };
      let known_sha = binding
        .filter(|binding| binding.path == path)
        .and_then(|binding| binding.last_known_sha.clone());
      (content, path, known_sha)
    };

    let current_sha = match remote.get_file_sha(repo, &path).await {
      Ok(sha) => Some(sha),
      Err(err) => {
        log::debug!("{path} treated as new on {repo}: {err}");
        None
      },
    };
    if let (Some(known), Some(current)) = (&known_sha, &current_sha) {
      if known != current {
        log::debug!("{path}: last synced at {known}, remote is at {current}");
      }
    }
    let base_sha = known_sha.or(current_sha);

    let message = self.options.commit_message_for(&path);
    let put = remote
      .put_blob(repo, &path, content.as_bytes(), &message, base_sha.as_deref())
      .await?;

    {
      let mut workspace = self.workspace.lock();
      if workspace.file(id).is_none() {
        log::info!("{path} pushed as {} after it was closed", put.sha);
        return Ok(put);
      }
      workspace.set_remote_backing(id, &path, Some(put.sha.clone()))?;
      workspace.mark_persisted(id, content)?;
    }
    Ok(put)
  }

  /// Re-reads the local storage of `id` and reconciles it with the buffer.
  ///
  /// A clean file takes the stored content. A dirty file whose store
  /// changed is left alone and reported as a conflict.
  pub async fn reload(&self, id: FileId) -> Result<ReloadOutcome> {
    let (handle, path) = {
      let workspace = self.workspace.lock();
      let record = workspace.require_file(id)?;
      let handle = record
        .backing()
        .local_handle()
        .cloned()
        .ok_or(SyncError::NotReloadable(id))?;
      (handle, record.path().to_string())
    };

    let stored = decode(&path, handle.read().await?)?;

    let decision = {
      let workspace = self.workspace.lock();
      let record = workspace.require_file(id)?;
      let (dirty, changed) = (record.is_dirty(), record.cached_content() != stored);
      let mut reloads = self.reloads.lock();
      reloads.retain(|file| workspace.file(file).is_some());
      reloads.observe(id, dirty, changed)
    };
    match decision {
      ReloadDecision::Noop => Ok(ReloadOutcome::Unchanged),
      ReloadDecision::Reload => {
        {
          let mut workspace = self.workspace.lock();
          workspace.replace_content(id, &stored, ContentOrigin::Load)?;
          workspace.mark_persisted(id, stored)?;
        }
        self.reloads.lock().settle(id);
        log::info!("reloaded {path}");
        Ok(ReloadOutcome::Reloaded)
      },
      ReloadDecision::ConflictEntered => {
        log::warn!("{path} changed on disk while it has unsaved edits");
        Ok(ReloadOutcome::ConflictEntered)
      },
      ReloadDecision::ConflictOngoing => Ok(ReloadOutcome::ConflictOngoing),
    }
  }
}
