//! Workspace state for an editor shell: open files, their dirty state, the
//! path tree shown next to the editor, and the bindings to live editor
//! handles.

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod binding;
pub mod buffer;
pub mod event;
pub mod file_icons;
pub mod format;
pub mod language;
pub mod path_tree;
pub mod registry;
pub mod storage;
pub mod workspace;

pub type Tendril = SmartString<LazyCompact>;

pub use registry::FileId;
pub use workspace::{
  Generation,
  SharedWorkspace,
  Workspace,
};
