//! Hierarchical view over the flat set of registered file paths.
//!
//! Nodes are created lazily, one per `/` separated segment, as files are
//! inserted. A node is a folder iff some other node lives below it, so
//! removing the last file under a folder prunes the folder as well.
//!
//! Sibling order is fixed: folders before files, then case-insensitive name.
//! It is applied on read by [`PathTree::list_children`] and the row walkers,
//! never stored, so insertion order does not leak into rendering.

use std::{
  cmp::Ordering,
  collections::{
    HashMap,
    HashSet,
  },
  fmt,
};

use thiserror::Error;

use crate::registry::FileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  Folder,
  File,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
  #[error("path is empty")]
  EmptyPath,
  #[error("invalid path segment `{segment}` in `{path}`")]
  InvalidPath { path: String, segment: String },
  #[error("`{path}` already exists as a {existing}")]
  PathConflict { path: String, existing: NodeKind },
  #[error("`{path}` is already linked to file {file_id:?}")]
  Occupied { path: String, file_id: FileId },
  #[error("`{0}` is not in the tree")]
  NotFound(String),
  #[error("`{0}` is not a folder")]
  NotAFolder(String),
  #[error("`{0}` is not a file")]
  NotAFile(String),
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Folder => write!(f, "folder"),
      Self::File => write!(f, "file"),
    }
  }
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Normalizes a logical path: empty segments are dropped, `.` and `..` are
/// rejected.
pub fn normalize_path(path: &str) -> Result<String> {
  let mut normalized = String::with_capacity(path.len());
  for segment in path.split('/') {
    match segment {
      "" => continue,
      "." | ".." => {
        return Err(TreeError::InvalidPath {
          path:    path.to_string(),
          segment: segment.to_string(),
        });
      },
      _ => {},
    }
    if !normalized.is_empty() {
      normalized.push('/');
    }
    normalized.push_str(segment);
  }

  if normalized.is_empty() {
    return Err(TreeError::EmptyPath);
  }
  Ok(normalized)
}

/// Last segment of a normalized path.
pub fn leaf_name(path: &str) -> &str {
  path.rsplit('/').next().unwrap_or(path)
}

fn parent_path(path: &str) -> Option<&str> {
  path.rsplit_once('/').map(|(parent, _)| parent)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
  name:      String,
  full_path: String,
  file_id:   Option<FileId>,
  children:  Vec<String>,
}

impl PathNode {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn full_path(&self) -> &str {
    &self.full_path
  }

  pub fn is_folder(&self) -> bool {
    self.file_id.is_none()
  }

  pub fn kind(&self) -> NodeKind {
    if self.is_folder() {
      NodeKind::Folder
    } else {
      NodeKind::File
    }
  }

  pub fn file_id(&self) -> Option<FileId> {
    self.file_id
  }

  /// Immediate descendants in insertion order. Use
  /// [`PathTree::list_children`] for display order.
  pub fn children(&self) -> &[String] {
    &self.children
  }
}

fn node_cmp(a: &PathNode, b: &PathNode) -> Ordering {
  match (a.kind(), b.kind()) {
    (NodeKind::Folder, NodeKind::File) => return Ordering::Less,
    (NodeKind::File, NodeKind::Folder) => return Ordering::Greater,
    _ => {},
  }
  a.name
    .to_lowercase()
    .cmp(&b.name.to_lowercase())
    .then_with(|| a.name.cmp(&b.name))
}

/// One line of a rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow<'a> {
  pub depth:     usize,
  pub name:      &'a str,
  pub full_path: &'a str,
  pub file_id:   Option<FileId>,
  pub expanded:  bool,
}

impl TreeRow<'_> {
  pub fn is_folder(&self) -> bool {
    self.file_id.is_none()
  }
}

#[derive(Debug, Default, Clone)]
pub struct PathTree {
  nodes:    HashMap<String, PathNode>,
  roots:    Vec<String>,
  expanded: HashSet<String>,
}

impl PathTree {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn leaf_count(&self) -> usize {
    self.nodes.values().filter(|node| !node.is_folder()).count()
  }

  pub fn folder_paths(&self) -> impl Iterator<Item = &str> {
    self
      .nodes
      .values()
      .filter(|node| node.is_folder())
      .map(|node| node.full_path.as_str())
  }

  pub fn get(&self, path: &str) -> Option<&PathNode> {
    let path = normalize_path(path).ok()?;
    self.nodes.get(&path)
  }

  /// Links `path` to `file_id`, creating every missing ancestor folder.
  ///
  /// The whole path is validated before anything is created, so a failed
  /// insert leaves the tree untouched.
  pub fn insert(&mut self, path: &str, file_id: FileId) -> Result<()> {
    let path = normalize_path(path)?;
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;

    let mut prefix = String::with_capacity(path.len());
    for (i, segment) in segments.iter().enumerate() {
      if i > 0 {
        prefix.push('/');
      }
      prefix.push_str(segment);

      let Some(node) = self.nodes.get(&prefix) else {
        break;
      };
      match (i == last, node.file_id) {
        (false, Some(_)) => {
          return Err(TreeError::PathConflict {
            path:     prefix,
            existing: NodeKind::File,
          });
        },
        (true, None) => {
          return Err(TreeError::PathConflict {
            path:     prefix,
            existing: NodeKind::Folder,
          });
        },
        (true, Some(existing)) if existing == file_id => return Ok(()),
        (true, Some(existing)) => {
          return Err(TreeError::Occupied {
            path:    prefix,
            file_id: existing,
          });
        },
        (false, None) => {},
      }
    }

    let mut prefix = String::with_capacity(path.len());
    for (i, segment) in segments.iter().enumerate() {
      let parent = (i > 0).then(|| prefix.clone());
      if i > 0 {
        prefix.push('/');
      }
      prefix.push_str(segment);

      if self.nodes.contains_key(&prefix) {
        continue;
      }
      self.nodes.insert(prefix.clone(), PathNode {
        name:      segment.to_string(),
        full_path: prefix.clone(),
        file_id:   (i == last).then_some(file_id),
        children:  Vec::new(),
      });
      let siblings = match parent {
        Some(parent) => {
          match self.nodes.get_mut(&parent) {
            Some(node) => &mut node.children,
            None => continue,
          }
        },
        None => &mut self.roots,
      };
      if !siblings.contains(&prefix) {
        siblings.push(prefix.clone());
      }
    }

    Ok(())
  }

  /// Removes the file at `path` and prunes folders left without
  /// descendants.
  pub fn remove(&mut self, path: &str) -> Result<FileId> {
    let path = normalize_path(path)?;
    let file_id = match self.nodes.get(&path) {
      Some(node) => node.file_id.ok_or_else(|| TreeError::NotAFile(path.clone()))?,
      None => return Err(TreeError::NotFound(path)),
    };

    let mut current = path;
    loop {
      self.nodes.remove(&current);
      self.expanded.remove(&current);

      let Some(parent) = parent_path(&current).map(str::to_string) else {
        self.roots.retain(|root| *root != current);
        break;
      };
      let Some(node) = self.nodes.get_mut(&parent) else {
        break;
      };
      node.children.retain(|child| *child != current);
      if !node.children.is_empty() {
        break;
      }
      current = parent;
    }

    Ok(file_id)
  }

  /// Drops every node together with the expanded folder set.
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.roots.clear();
    self.expanded.clear();
  }

  /// Children of `path` in display order. The empty path lists the roots.
  pub fn list_children(&self, path: &str) -> Result<Vec<&PathNode>> {
    let children = if path.is_empty() {
      &self.roots
    } else {
      let path = normalize_path(path)?;
      &self
        .nodes
        .get(&path)
        .ok_or(TreeError::NotFound(path))?
        .children
    };

    let mut nodes: Vec<&PathNode> = children
      .iter()
      .filter_map(|child| self.nodes.get(child))
      .collect();
    nodes.sort_by(|a, b| node_cmp(a, b));
    Ok(nodes)
  }

  pub fn is_expanded(&self, path: &str) -> bool {
    normalize_path(path).is_ok_and(|path| self.expanded.contains(&path))
  }

  pub fn expand(&mut self, path: &str) -> Result<()> {
    let path = self.folder(path)?;
    self.expanded.insert(path);
    Ok(())
  }

  pub fn collapse(&mut self, path: &str) -> Result<()> {
    let path = self.folder(path)?;
    self.expanded.remove(&path);
    Ok(())
  }

  /// Flips the expansion state of a folder and returns the new state.
  pub fn toggle_folder(&mut self, path: &str) -> Result<bool> {
    let path = self.folder(path)?;
    if self.expanded.remove(&path) {
      Ok(false)
    } else {
      self.expanded.insert(path);
      Ok(true)
    }
  }

  fn folder(&self, path: &str) -> Result<String> {
    let path = normalize_path(path)?;
    match self.nodes.get(&path) {
      Some(node) if node.is_folder() => Ok(path),
      Some(_) => Err(TreeError::NotAFolder(path)),
      None => Err(TreeError::NotFound(path)),
    }
  }

  /// Visible rows: descends only into expanded folders.
  pub fn rows(&self) -> Vec<TreeRow<'_>> {
    let mut rows = Vec::new();
    self.collect_rows("", 0, true, &mut rows);
    rows
  }

  /// Every node, as if all folders were expanded.
  pub fn all_rows(&self) -> Vec<TreeRow<'_>> {
    let mut rows = Vec::new();
    self.collect_rows("", 0, false, &mut rows);
    rows
  }

  fn collect_rows<'a>(
    &'a self,
    path: &str,
    depth: usize,
    honor_expanded: bool,
    rows: &mut Vec<TreeRow<'a>>,
  ) {
    let Ok(children) = self.list_children(path) else {
      return;
    };
    for node in children {
      let expanded = self.expanded.contains(&node.full_path);
      rows.push(TreeRow {
        depth,
        name: &node.name,
        full_path: &node.full_path,
        file_id: node.file_id,
        expanded,
      });
      if node.is_folder() && (expanded || !honor_expanded) {
        self.collect_rows(&node.full_path, depth + 1, honor_expanded, rows);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
  };

  use super::*;

  fn id(n: usize) -> FileId {
    FileId::new(NonZeroUsize::new(n).unwrap())
  }

  fn names(nodes: &[&PathNode]) -> Vec<String> {
    nodes.iter().map(|node| node.name().to_string()).collect()
  }

  #[test]
  fn insert_creates_folders_for_every_prefix() {
    let mut tree = PathTree::new();
    tree.insert("src/ui/app.rs", id(1)).unwrap();

    assert!(tree.get("src").unwrap().is_folder());
    assert!(tree.get("src/ui").unwrap().is_folder());
    let leaf = tree.get("src/ui/app.rs").unwrap();
    assert_eq!(leaf.file_id(), Some(id(1)));
    assert_eq!(leaf.name(), "app.rs");
    assert_eq!(tree.get("src").unwrap().children(), ["src/ui"]);
  }

  #[test]
  fn reinserting_same_file_is_noop() {
    let mut tree = PathTree::new();
    tree.insert("a/b.txt", id(1)).unwrap();
    tree.insert("a/b.txt", id(1)).unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.get("a").unwrap().children().len(), 1);
  }

  #[test]
  fn folder_over_file_conflicts_without_mutation() {
    let mut tree = PathTree::new();
    tree.insert("docs", id(1)).unwrap();

    let err = tree.insert("docs/readme.md", id(2)).unwrap_err();
    assert_eq!(err, TreeError::PathConflict {
      path:     "docs".into(),
      existing: NodeKind::File,
    });
    assert_eq!(tree.len(), 1);
  }

  #[test]
  fn file_over_folder_conflicts() {
    let mut tree = PathTree::new();
    tree.insert("docs/readme.md", id(1)).unwrap();

    let err = tree.insert("docs", id(2)).unwrap_err();
    assert!(matches!(err, TreeError::PathConflict {
      existing: NodeKind::Folder,
      ..
    }));
  }

  #[test]
  fn different_file_on_same_path_is_occupied() {
    let mut tree = PathTree::new();
    tree.insert("a.txt", id(1)).unwrap();
    assert_eq!(tree.insert("a.txt", id(2)), Err(TreeError::Occupied {
      path:    "a.txt".into(),
      file_id: id(1),
    }));
  }

  #[test]
  fn paths_are_normalized() {
    assert_eq!(normalize_path("/src//main.rs/").unwrap(), "src/main.rs");
    assert_eq!(normalize_path("///"), Err(TreeError::EmptyPath));
    assert!(matches!(
      normalize_path("src/../etc"),
      Err(TreeError::InvalidPath { .. })
    ));
  }

  #[test]
  fn children_sort_folders_first_then_case_insensitive() {
    let mut tree = PathTree::new();
    tree.insert("README.md", id(1)).unwrap();
    tree.insert("src/a.js", id(2)).unwrap();
    tree.insert("build.rs", id(3)).unwrap();
    tree.insert("Assets/logo.svg", id(4)).unwrap();

    let roots = tree.list_children("").unwrap();
    assert_eq!(names(&roots), ["Assets", "src", "build.rs", "README.md"]);
    assert_eq!(roots, tree.list_children("").unwrap());
  }

  #[test]
  fn remove_prunes_empty_folders() {
    let mut tree = PathTree::new();
    tree.insert("src/ui/app.rs", id(1)).unwrap();
    tree.insert("src/lib.rs", id(2)).unwrap();
    tree.expand("src/ui").unwrap();

    assert_eq!(tree.remove("src/ui/app.rs").unwrap(), id(1));
    assert!(tree.get("src/ui").is_none());
    assert!(!tree.is_expanded("src/ui"));
    assert_eq!(tree.get("src").unwrap().children(), ["src/lib.rs"]);

    tree.remove("src/lib.rs").unwrap();
    assert!(tree.is_empty());
    assert!(tree.list_children("").unwrap().is_empty());
  }

  #[test]
  fn remove_rejects_folders_and_unknown_paths() {
    let mut tree = PathTree::new();
    tree.insert("src/lib.rs", id(1)).unwrap();
    assert_eq!(tree.remove("src"), Err(TreeError::NotAFile("src".into())));
    assert_eq!(tree.remove("nope"), Err(TreeError::NotFound("nope".into())));
  }

  #[test]
  fn expansion_only_applies_to_folders() {
    let mut tree = PathTree::new();
    tree.insert("src/lib.rs", id(1)).unwrap();

    assert_eq!(tree.toggle_folder("src"), Ok(true));
    assert!(tree.is_expanded("src"));
    assert_eq!(tree.toggle_folder("src"), Ok(false));
    assert_eq!(
      tree.toggle_folder("src/lib.rs"),
      Err(TreeError::NotAFolder("src/lib.rs".into()))
    );
  }

  #[test]
  fn clear_resets_expanded_folders() {
    let mut tree = PathTree::new();
    tree.insert("src/lib.rs", id(1)).unwrap();
    tree.expand("src").unwrap();
    tree.clear();

    assert!(tree.is_empty());
    tree.insert("src/lib.rs", id(1)).unwrap();
    assert!(!tree.is_expanded("src"));
  }

  #[test]
  fn rows_follow_expansion() {
    let mut tree = PathTree::new();
    tree.insert("src/lib.rs", id(1)).unwrap();
    tree.insert("Cargo.toml", id(2)).unwrap();

    let visible: Vec<_> = tree.rows().iter().map(|row| row.full_path).collect();
    assert_eq!(visible, ["src", "Cargo.toml"]);

    tree.expand("src").unwrap();
    let rows = tree.rows();
    let visible: Vec<_> = rows.iter().map(|row| (row.depth, row.full_path)).collect();
    assert_eq!(visible, [(0, "src"), (1, "src/lib.rs"), (0, "Cargo.toml")]);
    assert_eq!(tree.all_rows().len(), 3);
  }

  fn segment(byte: u8) -> &'static str {
    ["a", "B", "c", "D.rs"][byte as usize % 4]
  }

  fn property_paths(raw: Vec<Vec<u8>>) -> Vec<String> {
    raw
      .into_iter()
      .filter(|segments| !segments.is_empty())
      .map(|segments| {
        segments
          .iter()
          .take(4)
          .map(|byte| segment(*byte))
          .collect::<Vec<_>>()
          .join("/")
      })
      .collect()
  }

  quickcheck::quickcheck! {
    fn leaves_and_folders_match_registered_paths(raw: Vec<Vec<u8>>) -> bool {
      let mut tree = PathTree::new();
      let mut registered = BTreeSet::new();
      for (n, path) in property_paths(raw).into_iter().enumerate() {
        if registered.contains(&path) {
          continue;
        }
        if tree.insert(&path, id(n + 1)).is_ok() {
          registered.insert(path);
        }
      }

      let expected_folders: BTreeSet<String> = registered
        .iter()
        .flat_map(|path| {
          let segments: Vec<&str> = path.split('/').collect();
          (1..segments.len())
            .map(|len| segments[..len].join("/"))
            .collect::<Vec<_>>()
        })
        .collect();
      let folders: BTreeSet<String> = tree.folder_paths().map(str::to_string).collect();

      tree.leaf_count() == registered.len() && folders == expected_folders
    }

    fn list_children_is_deterministic(raw: Vec<Vec<u8>>) -> bool {
      let mut tree = PathTree::new();
      for (n, path) in property_paths(raw).into_iter().enumerate() {
        let _ = tree.insert(&path, id(n + 1));
      }
      let first = tree.list_children("").unwrap();
      let second = tree.list_children("").unwrap();
      let folders_first = first
        .windows(2)
        .all(|pair| node_cmp(pair[0], pair[1]) != Ordering::Greater);
      first == second && folders_first
    }
  }
}
