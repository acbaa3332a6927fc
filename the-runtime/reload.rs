//! Reload state machine for files whose store changed underneath them.
//!
//! Keeps the conflict bookkeeping per file so repeated reloads of a dirty
//! file report a conflict once and then keep reporting it as ongoing.

use std::collections::HashMap;

use the_lib::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadState {
  /// Store and buffer agree, or nothing is pending.
  #[default]
  Clean,
  /// Store differs and the buffer can take its content.
  ReloadNeeded,
  /// Store differs while the buffer has unsaved edits.
  Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
  Noop,
  Reload,
  ConflictEntered,
  ConflictOngoing,
}

impl ReloadState {
  /// Advances the state after comparing the store with the buffer.
  pub fn observe(&mut self, dirty: bool, changed: bool) -> ReloadDecision {
    if !changed {
      *self = Self::Clean;
      return ReloadDecision::Noop;
    }

    if !dirty {
      *self = Self::ReloadNeeded;
      return ReloadDecision::Reload;
    }

    let decision = match self {
      Self::Conflict => ReloadDecision::ConflictOngoing,
      _ => ReloadDecision::ConflictEntered,
    };
    *self = Self::Conflict;
    decision
  }

  /// A reload was applied or a save made the store match the buffer.
  pub fn settle(&mut self) {
    *self = Self::Clean;
  }
}

#[derive(Debug, Default)]
pub struct ReloadTracker {
  states: HashMap<FileId, ReloadState>,
}

impl ReloadTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self, id: FileId) -> ReloadState {
    self.states.get(&id).copied().unwrap_or_default()
  }

  pub fn observe(&mut self, id: FileId, dirty: bool, changed: bool) -> ReloadDecision {
    let state = self.states.entry(id).or_default();
    let decision = state.observe(dirty, changed);
    if *state == ReloadState::Clean {
      self.states.remove(&id);
    }
    decision
  }

  pub fn settle(&mut self, id: FileId) {
    self.states.remove(&id);
  }

  /// Drops the state of files for which `keep` is false.
  pub fn retain(&mut self, mut keep: impl FnMut(FileId) -> bool) {
    self.states.retain(|id, _| keep(*id));
  }

  pub fn clear(&mut self) {
    self.states.clear();
  }

  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }

  pub fn in_conflict(&self) -> impl Iterator<Item = FileId> + '_ {
    self
      .states
      .iter()
      .filter(|(_, state)| **state == ReloadState::Conflict)
      .map(|(id, _)| *id)
  }
}
