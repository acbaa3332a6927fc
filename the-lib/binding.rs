//! Links file records to live editor handles.
//!
//! Each open file owns exactly one handle created through an
//! [`EditorEngine`]. The handle's change callback is a one-way latch on the
//! file's [`DirtyFlag`]: the first edit after a persist marks the file dirty
//! and announces it, later edits are no-ops. Only a confirmed persist clears
//! the flag again, see [`crate::registry::FileRegistry::mark_persisted`].

use std::{
  collections::HashMap,
  fmt,
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      Ordering,
    },
  },
};

use thiserror::Error;

use crate::{
  event::{
    EventBus,
    WorkspaceEvent,
  },
  registry::{
    DirtyFlag,
    FileId,
  },
};

pub type ChangeCallback = Box<dyn FnMut() + Send>;

/// A live text model owned by the host editor.
pub trait EditorHandle: Send {
  fn value(&self) -> String;

  /// Replaces the whole text. Engines may report this through the change
  /// callback like any other edit.
  fn set_value(&mut self, content: &str);

  /// Installs the change callback, replacing a previous one.
  fn on_change(&mut self, callback: ChangeCallback);

  /// Releases the model. The handle is not used afterwards.
  fn dispose(&mut self);
}

pub trait EditorEngine: Send {
  fn create(&mut self, content: &str, language: &str) -> Box<dyn EditorHandle>;
}

/// Why content is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
  /// User-visible edit, marks the file dirty.
  Edit,
  /// Content read back from a store, leaves the dirty flag alone.
  Load,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
  #[error("no editor binding for file {0:?}")]
  InvalidBinding(FileId),
  #[error("file {0:?} is already bound to an editor")]
  AlreadyBound(FileId),
}

pub type Result<T> = std::result::Result<T, BindingError>;

struct Binding {
  handle:   Box<dyn EditorHandle>,
  latch:    Arc<dyn Fn() + Send + Sync>,
  suppress: Arc<AtomicBool>,
}

pub struct EditorBindings {
  engine:   Box<dyn EditorEngine>,
  bindings: HashMap<FileId, Binding>,
  events:   EventBus,
}

impl fmt::Debug for EditorBindings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EditorBindings")
      .field("bound", &self.bindings.len())
      .finish_non_exhaustive()
  }
}

impl EditorBindings {
  pub fn new(engine: Box<dyn EditorEngine>, events: EventBus) -> Self {
    Self {
      engine,
      bindings: HashMap::new(),
      events,
    }
  }

  pub fn is_bound(&self, id: FileId) -> bool {
    self.bindings.contains_key(&id)
  }

  pub fn len(&self) -> usize {
    self.bindings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bindings.is_empty()
  }

  pub fn bind(&mut self, id: FileId, content: &str, language: &str, dirty: DirtyFlag) -> Result<()> {
    if self.bindings.contains_key(&id) {
      return Err(BindingError::AlreadyBound(id));
    }

    let suppress = Arc::new(AtomicBool::new(false));
    let latch: Arc<dyn Fn() + Send + Sync> = {
      let suppress = suppress.clone();
      let events = self.events.clone();
      Arc::new(move || {
        if suppress.load(Ordering::Acquire) || dirty.get() {
          return;
        }
        if !dirty.replace(true) {
          events.emit(WorkspaceEvent::DirtyChanged { id, dirty: true });
        }
      })
    };

    let mut handle = self.engine.create(content, language);
    let callback = latch.clone();
    handle.on_change(Box::new(move || callback()));

    self.bindings.insert(id, Binding {
      handle,
      latch,
      suppress,
    });
    Ok(())
  }

  pub fn unbind(&mut self, id: FileId) -> Result<()> {
    let mut binding = self
      .bindings
      .remove(&id)
      .ok_or(BindingError::InvalidBinding(id))?;
    binding.handle.dispose();
    Ok(())
  }

  /// Disposes every handle.
  pub fn unbind_all(&mut self) {
    for (_, mut binding) in self.bindings.drain() {
      binding.handle.dispose();
    }
  }

  pub fn read_current_content(&self, id: FileId) -> Result<String> {
    self
      .bindings
      .get(&id)
      .map(|binding| binding.handle.value())
      .ok_or(BindingError::InvalidBinding(id))
  }

  pub fn replace_content(&mut self, id: FileId, content: &str, origin: ContentOrigin) -> Result<()> {
    let binding = self
      .bindings
      .get_mut(&id)
      .ok_or(BindingError::InvalidBinding(id))?;

    match origin {
      ContentOrigin::Load => {
        binding.suppress.store(true, Ordering::Release);
        binding.handle.set_value(content);
        binding.suppress.store(false, Ordering::Release);
      },
      ContentOrigin::Edit => {
        binding.handle.set_value(content);
        // Engines are not required to report programmatic replacement.
        (binding.latch)();
      },
    }
    Ok(())
  }

  /// Mutable access to the handle, for routing host input.
  pub fn handle_mut(&mut self, id: FileId) -> Result<&mut dyn EditorHandle> {
    match self.bindings.get_mut(&id) {
      Some(binding) => Ok(binding.handle.as_mut()),
      None => Err(BindingError::InvalidBinding(id)),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::num::NonZeroUsize;

  use super::*;
  use crate::buffer::RopeEngine;

  fn id(n: usize) -> FileId {
    FileId::new(NonZeroUsize::new(n).unwrap())
  }

  fn bindings() -> (EditorBindings, RopeEngine, EventBus) {
    let engine = RopeEngine::new();
    let events = EventBus::new();
    (
      EditorBindings::new(Box::new(engine.clone()), events.clone()),
      engine,
      events,
    )
  }

  #[test]
  fn bound_content_round_trips() {
    let (mut bindings, _, _) = bindings();
    bindings.bind(id(1), "fn main() {}\n", "rust", DirtyFlag::default()).unwrap();
    assert_eq!(bindings.read_current_content(id(1)).unwrap(), "fn main() {}\n");
  }

  #[test]
  fn first_edit_latches_dirty_once() {
    let (mut bindings, engine, events) = bindings();
    let rx = events.subscribe();
    let dirty = DirtyFlag::default();
    bindings.bind(id(1), "a", "plaintext", dirty.clone()).unwrap();

    let handle = engine.handle(0).unwrap();
    handle.insert(1, "b");
    handle.insert(2, "c");

    assert!(dirty.get());
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), [WorkspaceEvent::DirtyChanged {
      id:    id(1),
      dirty: true,
    }]);
  }

  #[test]
  fn load_does_not_mark_dirty_but_edit_does() {
    let (mut bindings, _, _) = bindings();
    let dirty = DirtyFlag::default();
    bindings.bind(id(1), "old", "plaintext", dirty.clone()).unwrap();

    bindings.replace_content(id(1), "disk", ContentOrigin::Load).unwrap();
    assert!(!dirty.get());
    assert_eq!(bindings.read_current_content(id(1)).unwrap(), "disk");

    bindings.replace_content(id(1), "typed", ContentOrigin::Edit).unwrap();
    assert!(dirty.get());
  }

  #[test]
  fn double_unbind_is_rejected() {
    let (mut bindings, engine, _) = bindings();
    bindings.bind(id(1), "", "plaintext", DirtyFlag::default()).unwrap();
    assert_eq!(
      bindings.bind(id(1), "", "plaintext", DirtyFlag::default()),
      Err(BindingError::AlreadyBound(id(1)))
    );

    bindings.unbind(id(1)).unwrap();
    assert!(engine.handle(0).unwrap().is_disposed());
    assert_eq!(bindings.unbind(id(1)), Err(BindingError::InvalidBinding(id(1))));
    assert_eq!(
      bindings.read_current_content(id(1)),
      Err(BindingError::InvalidBinding(id(1)))
    );
  }
}
