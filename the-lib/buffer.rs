//! Reference [`EditorEngine`] backed by a [`Rope`].
//!
//! Headless hosts and tests use it in place of a real editor widget. Handles
//! are shared: the engine keeps a clone of every live handle it created so
//! the host can type into a file without going through the workspace.
//! Disposed handles are dropped on the next `create`.

use std::{
  fmt,
  ops::Range,
  sync::Arc,
};

use parking_lot::Mutex;
use ropey::Rope;

use crate::binding::{
  ChangeCallback,
  EditorEngine,
  EditorHandle,
};

struct RopeState {
  text:     Rope,
  language: String,
  on_edit:  Option<ChangeCallback>,
  disposed: bool,
}

impl RopeState {
  fn changed(&mut self) {
    if let Some(callback) = self.on_edit.as_mut() {
      callback();
    }
  }
}

#[derive(Clone)]
pub struct RopeHandle {
  state: Arc<Mutex<RopeState>>,
}

impl fmt::Debug for RopeHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("RopeHandle")
      .field("language", &state.language)
      .field("len_chars", &state.text.len_chars())
      .field("disposed", &state.disposed)
      .finish()
  }
}

impl RopeHandle {
  fn new(content: &str, language: &str) -> Self {
    Self {
      state: Arc::new(Mutex::new(RopeState {
        text:     Rope::from_str(content),
        language: language.to_string(),
        on_edit:  None,
        disposed: false,
      })),
    }
  }

  pub fn text(&self) -> String {
    self.state.lock().text.to_string()
  }

  pub fn len_chars(&self) -> usize {
    self.state.lock().text.len_chars()
  }

  pub fn language(&self) -> String {
    self.state.lock().language.clone()
  }

  pub fn is_disposed(&self) -> bool {
    self.state.lock().disposed
  }

  /// Inserts `text` at a char index, clamped to the end of the buffer.
  pub fn insert(&self, char_idx: usize, text: &str) {
    let mut state = self.state.lock();
    if state.disposed || text.is_empty() {
      return;
    }
    let at = char_idx.min(state.text.len_chars());
    state.text.insert(at, text);
    state.changed();
  }

  /// Removes a char range, clamped to the buffer.
  pub fn remove(&self, range: Range<usize>) {
    let mut state = self.state.lock();
    if state.disposed {
      return;
    }
    let len = state.text.len_chars();
    let end = range.end.min(len);
    let start = range.start.min(end);
    if start == end {
      return;
    }
    state.text.remove(start..end);
    state.changed();
  }
}

impl EditorHandle for RopeHandle {
  fn value(&self) -> String {
    self.text()
  }

  fn set_value(&mut self, content: &str) {
    let mut state = self.state.lock();
    if state.disposed {
      return;
    }
    state.text = Rope::from_str(content);
    state.changed();
  }

  fn on_change(&mut self, callback: ChangeCallback) {
    self.state.lock().on_edit = Some(callback);
  }

  fn dispose(&mut self) {
    let mut state = self.state.lock();
    state.disposed = true;
    state.on_edit = None;
  }
}

#[derive(Debug, Clone, Default)]
pub struct RopeEngine {
  created: Arc<Mutex<Vec<RopeHandle>>>,
}

impl RopeEngine {
  pub fn new() -> Self {
    Self::default()
  }

  /// `index`-th handle still tracked by this engine, in creation order.
  pub fn handle(&self, index: usize) -> Option<RopeHandle> {
    self.created.lock().get(index).cloned()
  }

  /// Most recently created handle whose text equals `content`.
  pub fn find(&self, content: &str) -> Option<RopeHandle> {
    self
      .created
      .lock()
      .iter()
      .rev()
      .find(|handle| !handle.is_disposed() && handle.text() == content)
      .cloned()
  }

  pub fn live_handles(&self) -> usize {
    self
      .created
      .lock()
      .iter()
      .filter(|handle| !handle.is_disposed())
      .count()
  }
}

impl EditorEngine for RopeEngine {
  fn create(&mut self, content: &str, language: &str) -> Box<dyn EditorHandle> {
    let handle = RopeHandle::new(content, language);
    let mut created = self.created.lock();
    created.retain(|existing| !existing.is_disposed());
    created.push(handle.clone());
    Box::new(handle)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{
    AtomicUsize,
    Ordering,
  };

  use super::*;

  #[test]
  fn edits_fire_the_change_callback() {
    let mut engine = RopeEngine::new();
    let mut handle = engine.create("hello", "plaintext");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    handle.on_change(Box::new(move || {
      counter.fetch_add(1, Ordering::Relaxed);
    }));

    let shared = engine.handle(0).unwrap();
    shared.insert(5, " world");
    shared.remove(0..1);
    shared.remove(3..3);
    assert_eq!(handle.value(), "ello world");
    assert_eq!(hits.load(Ordering::Relaxed), 2);
  }

  #[test]
  fn out_of_range_edits_are_clamped() {
    let mut engine = RopeEngine::new();
    engine.create("ab", "plaintext");
    let handle = engine.handle(0).unwrap();
    handle.insert(99, "c");
    handle.remove(1..99);
    assert_eq!(handle.text(), "a");
  }

  #[test]
  fn disposed_handles_ignore_edits() {
    let mut engine = RopeEngine::new();
    let mut handle = engine.create("x", "plaintext");
    handle.dispose();
    engine.handle(0).unwrap().insert(0, "y");
    assert_eq!(handle.value(), "x");
    assert_eq!(engine.live_handles(), 0);
  }

  #[test]
  fn disposed_handles_are_released_on_create() {
    let mut engine = RopeEngine::new();
    let mut first = engine.create("a", "plaintext");
    engine.create("b", "plaintext");
    first.dispose();
    engine.create("c", "plaintext");

    let tracked: Vec<_> = (0..)
      .map_while(|index| engine.handle(index))
      .map(|handle| handle.text())
      .collect();
    assert_eq!(tracked, ["b", "c"]);
    assert_eq!(engine.live_handles(), 2);
  }
}
