//! Observer notifications for workspace state changes.

use std::sync::Arc;

use crossbeam::channel::{
  self,
  Receiver,
  Sender,
};
use parking_lot::Mutex;

use crate::{
  registry::FileId,
  workspace::Generation,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
  Opened { id: FileId, path: String },
  Closed { id: FileId, path: String },
  DirtyChanged { id: FileId, dirty: bool },
  ActiveChanged { id: Option<FileId> },
  /// Every file was closed ahead of a bulk import.
  Reset { generation: Generation },
  Persisted { id: FileId },
}

/// Fan-out of [`WorkspaceEvent`]s to any number of subscribers.
///
/// Emitting never blocks: channels are unbounded and subscribers whose
/// receiver was dropped are forgotten on the next emit.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
  subscribers: Arc<Mutex<Vec<Sender<WorkspaceEvent>>>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&self) -> Receiver<WorkspaceEvent> {
    let (tx, rx) = channel::unbounded();
    self.subscribers.lock().push(tx);
    rx
  }

  pub fn emit(&self, event: WorkspaceEvent) {
    let mut subscribers = self.subscribers.lock();
    if subscribers.is_empty() {
      return;
    }
    log::trace!("workspace event: {event:?}");
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().len()
  }
}
