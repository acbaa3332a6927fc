//! The workspace context object.
//!
//! A [`Workspace`] owns the file registry, the path tree, the editor bindings
//! and the active selection, and keeps them consistent: every open file has
//! exactly one record, one tree leaf and one editor handle. Hosts share it as
//! a [`SharedWorkspace`] and only lock it for synchronous steps.

use std::{
  fmt,
  sync::Arc,
};

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
  binding::{
    BindingError,
    ContentOrigin,
    EditorBindings,
    EditorEngine,
    EditorHandle,
  },
  event::{
    EventBus,
    WorkspaceEvent,
  },
  file_icons::{
    self,
    FileIcon,
  },
  format::{
    self,
    FormatError,
  },
  path_tree::{
    PathTree,
    TreeError,
  },
  registry::{
    FileId,
    FileRecord,
    FileRegistry,
    FileSpec,
    RegistryError,
  },
  storage::StorageHandle,
};

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

/// Epoch of the workspace contents. Bumped every time a bulk import resets
/// the workspace, so imports still in flight can tell they were superseded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
  pub const fn get(self) -> u64 {
    self.0
  }

  fn next(self) -> Self {
    Self(self.0 + 1)
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error(transparent)]
  Tree(#[from] TreeError),
  #[error(transparent)]
  Registry(#[from] RegistryError),
  #[error(transparent)]
  Binding(#[from] BindingError),
  #[error(transparent)]
  Format(#[from] FormatError),
  #[error("workspace generation {stale} was superseded by {current}")]
  Stale {
    stale:   Generation,
    current: Generation,
  },
}

impl WorkspaceError {
  pub fn needs_confirmation(&self) -> bool {
    matches!(self, Self::Registry(RegistryError::NeedsConfirmation { .. }))
  }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Snapshot of one tab, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
  pub id:     FileId,
  pub name:   String,
  pub path:   String,
  pub icon:   FileIcon,
  pub dirty:  bool,
  pub active: bool,
}

pub struct Workspace {
  registry:   FileRegistry,
  tree:       PathTree,
  bindings:   EditorBindings,
  active:     Option<FileId>,
  generation: Generation,
  events:     EventBus,
}

impl fmt::Debug for Workspace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Workspace")
      .field("files", &self.registry.len())
      .field("tree_nodes", &self.tree.len())
      .field("active", &self.active)
      .field("generation", &self.generation)
      .finish()
  }
}

impl Workspace {
  pub fn new(engine: Box<dyn EditorEngine>) -> Self {
    let events = EventBus::new();
    Self {
      registry: FileRegistry::new(),
      tree: PathTree::new(),
      bindings: EditorBindings::new(engine, events.clone()),
      active: None,
      generation: Generation::default(),
      events,
    }
  }

  pub fn into_shared(self) -> SharedWorkspace {
    Arc::new(Mutex::new(self))
  }

  pub fn registry(&self) -> &FileRegistry {
    &self.registry
  }

  pub fn tree(&self) -> &PathTree {
    &self.tree
  }

  /// Tree access for presentation state (expanded folders).
  pub fn tree_mut(&mut self) -> &mut PathTree {
    &mut self.tree
  }

  pub fn file(&self, id: FileId) -> Option<&FileRecord> {
    self.registry.get(id)
  }

  pub fn file_by_path(&self, path: &str) -> Option<&FileRecord> {
    self.registry.get_by_path(path)
  }

  pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
    self.registry.iter()
  }

  pub fn len(&self) -> usize {
    self.registry.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registry.is_empty()
  }

  pub fn subscribe(&self) -> Receiver<WorkspaceEvent> {
    self.events.subscribe()
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn generation(&self) -> Generation {
    self.generation
  }

  /// The record of `id`, or [`RegistryError::UnknownFile`].
  pub fn require_file(&self, id: FileId) -> Result<&FileRecord> {
    self
      .registry
      .get(id)
      .ok_or(WorkspaceError::Registry(RegistryError::UnknownFile(id)))
  }

  /// Registers a file, links it into the tree and binds an editor to it.
  ///
  /// Either all three steps succeed or none of them is left behind.
  pub fn open(&mut self, spec: FileSpec) -> Result<FileId> {
    let id = self.registry.register(spec)?;
    let (path, content, language, dirty) = {
      let record = self.require_file(id)?;
      (
        record.path().to_string(),
        record.cached_content().to_string(),
        record.language().to_string(),
        record.dirty_flag().clone(),
      )
    };

    if let Err(err) = self.tree.insert(&path, id) {
      self.registry.force_close(id)?;
      return Err(err.into());
    }

    if let Err(err) = self.bindings.bind(id, &content, &language, dirty) {
      self.tree.remove(&path)?;
      self.registry.force_close(id)?;
      return Err(err.into());
    }

    log::debug!("opened {path} as {id:?} ({language})");
    self.events.emit(WorkspaceEvent::Opened { id, path });
    Ok(id)
  }

  /// Like [`Workspace::open`], unless a bulk reset happened since
  /// `generation` was captured.
  pub fn open_in_generation(&mut self, generation: Generation, spec: FileSpec) -> Result<FileId> {
    if generation != self.generation {
      return Err(WorkspaceError::Stale {
        stale:   generation,
        current: self.generation,
      });
    }
    self.open(spec)
  }

  /// Opens an empty, unbacked file and makes it active.
  pub fn new_file(&mut self, name: &str) -> Result<FileId> {
    let id = self.open(FileSpec::new(name, ""))?;
    self.switch_to(id)?;
    Ok(id)
  }

  /// Closes a clean file. Dirty files are reported through
  /// [`RegistryError::NeedsConfirmation`] and left untouched.
  pub fn close(&mut self, id: FileId) -> Result<()> {
    let record = self.registry.close(id)?;
    self.finish_close(record);
    Ok(())
  }

  /// Closes a file, discarding unsaved changes.
  pub fn force_close(&mut self, id: FileId) -> Result<()> {
    let record = self.registry.force_close(id)?;
    self.finish_close(record);
    Ok(())
  }

  fn finish_close(&mut self, record: FileRecord) {
    let id = record.id();
    if let Err(err) = self.bindings.unbind(id) {
      log::warn!("closing {}: {err}", record.path());
    }
    if let Err(err) = self.tree.remove(record.path()) {
      log::warn!("closing {}: {err}", record.path());
    }
    self.events.emit(WorkspaceEvent::Closed {
      id,
      path: record.path().to_string(),
    });

    if self.active == Some(id) {
      self.set_active(self.registry.first());
    }
  }

  /// Closes every file, clears the tree and starts a new generation.
  ///
  /// Dirty files are discarded: starting a bulk import is the confirmation
  /// point for the caller.
  pub fn begin_bulk(&mut self) -> Generation {
    self.bindings.unbind_all();
    let closed = self.registry.drain();
    self.tree.clear();
    self.generation = self.generation.next();

    log::info!(
      "workspace reset to generation {} ({} files closed)",
      self.generation,
      closed.len()
    );
    for record in closed {
      self.events.emit(WorkspaceEvent::Closed {
        id:   record.id(),
        path: record.path().to_string(),
      });
    }
    self.events.emit(WorkspaceEvent::Reset {
      generation: self.generation,
    });
    self.set_active(None);
    self.generation
  }

  pub fn active(&self) -> Option<FileId> {
    self.active
  }

  pub fn active_file(&self) -> Option<&FileRecord> {
    self.active.and_then(|id| self.registry.get(id))
  }

  pub fn switch_to(&mut self, id: FileId) -> Result<()> {
    self.require_file(id)?;
    self.set_active(Some(id));
    Ok(())
  }

  fn set_active(&mut self, id: Option<FileId>) {
    if self.active != id {
      self.active = id;
      self.events.emit(WorkspaceEvent::ActiveChanged { id });
    }
  }

  pub fn read_content(&self, id: FileId) -> Result<String> {
    Ok(self.bindings.read_current_content(id)?)
  }

  pub fn replace_content(&mut self, id: FileId, content: &str, origin: ContentOrigin) -> Result<()> {
    Ok(self.bindings.replace_content(id, content, origin)?)
  }

  pub fn handle_mut(&mut self, id: FileId) -> Result<&mut dyn EditorHandle> {
    Ok(self.bindings.handle_mut(id)?)
  }

  /// Records that `content` was persisted for `id`.
  ///
  /// The snapshot is always updated. The dirty flag is only cleared when the
  /// live text still equals `content`, so edits made while the write was in
  /// flight keep the file dirty. Returns whether the file is clean now.
  pub fn mark_persisted(&mut self, id: FileId, content: String) -> Result<bool> {
    let live = self.bindings.read_current_content(id)?;
    let clean = live == content;
    if clean {
      let was_dirty = self.require_file(id)?.is_dirty();
      self.registry.mark_persisted(id, content)?;
      if was_dirty {
        self
          .events
          .emit(WorkspaceEvent::DirtyChanged { id, dirty: false });
      }
    } else {
      self.registry.store_snapshot(id, content)?;
    }
    self.events.emit(WorkspaceEvent::Persisted { id });
    Ok(clean)
  }

  pub fn set_language(&mut self, id: FileId, language: &str) -> Result<()> {
    Ok(self.registry.set_language(id, language)?)
  }

  pub fn set_local_backing(&mut self, id: FileId, handle: Arc<dyn StorageHandle>) -> Result<()> {
    Ok(self.registry.set_local_backing(id, handle)?)
  }

  pub fn set_remote_backing(&mut self, id: FileId, path: &str, sha: Option<String>) -> Result<()> {
    Ok(self.registry.set_remote_backing(id, path, sha)?)
  }

  /// Minifies the file in place. Returns whether the text changed.
  pub fn minify(&mut self, id: FileId) -> Result<bool> {
    let language = self.require_file(id)?.language().to_string();
    let current = self.read_content(id)?;
    let minified = format::minify(&language, &current)?;
    self.apply_rewrite(id, &current, &minified)
  }

  /// Pretty prints the file in place. Returns whether the text changed.
  pub fn format(&mut self, id: FileId) -> Result<bool> {
    let language = self.require_file(id)?.language().to_string();
    let current = self.read_content(id)?;
    let formatted = format::pretty(&language, &current)?;
    self.apply_rewrite(id, &current, &formatted)
  }

  fn apply_rewrite(&mut self, id: FileId, current: &str, rewritten: &str) -> Result<bool> {
    if current == rewritten {
      return Ok(false);
    }
    self.replace_content(id, rewritten, ContentOrigin::Edit)?;
    Ok(true)
  }

  pub fn tabs(&self) -> Vec<TabInfo> {
    self
      .registry
      .iter()
      .map(|record| {
        let name = record.display_name().into_owned();
        TabInfo {
          id: record.id(),
          icon: file_icons::icon_for_file(&name),
          path: record.path().to_string(),
          dirty: record.is_dirty(),
          active: self.active == Some(record.id()),
          name,
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    buffer::RopeEngine,
    registry::BackingKind,
  };

  fn workspace() -> (Workspace, RopeEngine) {
    let engine = RopeEngine::new();
    (Workspace::new(Box::new(engine.clone())), engine)
  }

  fn open(workspace: &mut Workspace, path: &str, content: &str) -> FileId {
    let name = crate::path_tree::leaf_name(path).to_string();
    workspace
      .open(FileSpec::new(name, content).with_path(path))
      .unwrap()
  }

  #[test]
  fn open_links_record_tree_and_binding() {
    let (mut workspace, _) = workspace();
    let id = open(&mut workspace, "a.py", "x=1");

    assert_eq!(workspace.read_content(id).unwrap(), "x=1");
    assert!(!workspace.file(id).unwrap().is_dirty());
    assert_eq!(workspace.tree().get("a.py").unwrap().file_id(), Some(id));
    assert_eq!(workspace.file(id).unwrap().language(), "python");
  }

  #[test]
  fn tree_conflict_rolls_back_registration() {
    let (mut workspace, engine) = workspace();
    open(&mut workspace, "src", "");

    let err = workspace
      .open(FileSpec::new("main.rs", "").with_path("src/main.rs"))
      .unwrap_err();
    assert!(matches!(err, WorkspaceError::Tree(TreeError::PathConflict { .. })));
    assert_eq!(workspace.len(), 1);
    assert!(workspace.file_by_path("src/main.rs").is_none());
    assert_eq!(engine.live_handles(), 1);
  }

  #[test]
  fn duplicate_path_leaves_workspace_untouched() {
    let (mut workspace, _) = workspace();
    open(&mut workspace, "a.js", "1");
    let err = workspace.open(FileSpec::new("a.js", "2")).unwrap_err();
    assert!(matches!(
      err,
      WorkspaceError::Registry(RegistryError::DuplicatePath { .. })
    ));
    assert_eq!(workspace.tree().leaf_count(), 1);
  }

  #[test]
  fn dirty_close_needs_confirmation() {
    let (mut workspace, engine) = workspace();
    let id = open(&mut workspace, "a.js", "let a;");
    engine.find("let a;").unwrap().insert(0, "x");

    let err = workspace.close(id).unwrap_err();
    assert!(err.needs_confirmation());
    assert!(workspace.file(id).is_some());
    assert!(workspace.tree().get("a.js").is_some());

    workspace.force_close(id).unwrap();
    assert!(workspace.is_empty());
    assert!(workspace.tree().is_empty());
  }

  #[test]
  fn closing_active_selects_first_remaining() {
    let (mut workspace, _) = workspace();
    let a = open(&mut workspace, "a", "");
    let b = open(&mut workspace, "b", "");
    let c = open(&mut workspace, "c", "");

    workspace.switch_to(b).unwrap();
    workspace.close(b).unwrap();
    assert_eq!(workspace.active(), Some(a));

    workspace.close(a).unwrap();
    assert_eq!(workspace.active(), Some(c));
    workspace.close(c).unwrap();
    assert_eq!(workspace.active(), None);
  }

  #[test]
  fn closing_prunes_empty_folders() {
    let (mut workspace, _) = workspace();
    let a = open(&mut workspace, "src/lib/a.rs", "");
    open(&mut workspace, "src/b.rs", "");

    workspace.close(a).unwrap();
    assert!(workspace.tree().get("src/lib").is_none());
    assert!(workspace.tree().get("src").is_some());
  }

  #[test]
  fn stale_generation_is_rejected() {
    let (mut workspace, _) = workspace();
    let old = workspace.generation();
    open(&mut workspace, "a", "");

    let current = workspace.begin_bulk();
    assert!(workspace.is_empty());
    assert!(workspace.tree().is_empty());

    let err = workspace
      .open_in_generation(old, FileSpec::new("b", ""))
      .unwrap_err();
    assert!(matches!(err, WorkspaceError::Stale { .. }));
    workspace
      .open_in_generation(current, FileSpec::new("b", ""))
      .unwrap();
  }

  #[test]
  fn persist_during_concurrent_edit_keeps_dirty() {
    let (mut workspace, engine) = workspace();
    let id = open(&mut workspace, "a.md", "one");
    let handle = engine.find("one").unwrap();
    handle.insert(3, " two");
    let written = workspace.read_content(id).unwrap();

    handle.insert(7, " three");
    assert!(!workspace.mark_persisted(id, written.clone()).unwrap());
    assert!(workspace.file(id).unwrap().is_dirty());
    assert_eq!(workspace.file(id).unwrap().cached_content(), written);

    let written = workspace.read_content(id).unwrap();
    assert!(workspace.mark_persisted(id, written).unwrap());
    assert!(!workspace.file(id).unwrap().is_dirty());
  }

  #[test]
  fn minify_marks_dirty_only_on_change() {
    let (mut workspace, _) = workspace();
    let id = open(&mut workspace, "data.json", "{\n  \"a\": 1\n}");

    assert!(workspace.minify(id).unwrap());
    assert_eq!(workspace.read_content(id).unwrap(), r#"{"a":1}"#);
    assert!(workspace.file(id).unwrap().is_dirty());

    let written = workspace.read_content(id).unwrap();
    workspace.mark_persisted(id, written).unwrap();
    assert!(!workspace.minify(id).unwrap());
    assert!(!workspace.file(id).unwrap().is_dirty());
  }

  #[test]
  fn events_follow_the_lifecycle() {
    let (mut workspace, _) = workspace();
    let rx = workspace.subscribe();
    let id = workspace.new_file("untitled.txt").unwrap();
    workspace
      .replace_content(id, "hi", ContentOrigin::Edit)
      .unwrap();
    workspace.mark_persisted(id, "hi".into()).unwrap();
    workspace.close(id).unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events, [
      WorkspaceEvent::Opened {
        id,
        path: "untitled.txt".into(),
      },
      WorkspaceEvent::ActiveChanged { id: Some(id) },
      WorkspaceEvent::DirtyChanged { id, dirty: true },
      WorkspaceEvent::DirtyChanged { id, dirty: false },
      WorkspaceEvent::Persisted { id },
      WorkspaceEvent::Closed {
        id,
        path: "untitled.txt".into(),
      },
      WorkspaceEvent::ActiveChanged { id: None },
    ]);
  }

  #[test]
  fn tabs_reflect_state() {
    let (mut workspace, _) = workspace();
    let a = open(&mut workspace, "src/main.rs", "");
    open(&mut workspace, "README.md", "");
    workspace.switch_to(a).unwrap();

    let tabs = workspace.tabs();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0].name, "main.rs");
    assert!(tabs[0].active);
    assert!(!tabs[1].active);
    assert_eq!(
      workspace.file(a).unwrap().backing().kind(),
      BackingKind::None
    );
  }
}
