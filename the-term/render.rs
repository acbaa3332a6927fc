//! Plain-text rendering of the workspace for the terminal.

use std::fmt::Write as _;

use the_lib::{
  Workspace,
  file_icons::{
    icon_for_file,
    icon_for_folder,
  },
};
use the_runtime::{
  BulkReport,
  OperationState,
};

/// Tree with every folder expanded; dirty files carry a `*`.
pub fn tree(workspace: &Workspace) -> String {
  let mut out = String::new();
  for row in workspace.tree().all_rows() {
    let icon = if row.is_folder() {
      icon_for_folder(true)
    } else {
      icon_for_file(row.name)
    };
    let dirty = row
      .file_id
      .and_then(|id| workspace.file(id))
      .is_some_and(|file| file.is_dirty());
    let _ = writeln!(
      out,
      "{:indent$}{} {}{}",
      "",
      icon.glyph,
      row.name,
      if dirty { " *" } else { "" },
      indent = row.depth * 2
    );
  }
  out
}

pub fn report(report: &BulkReport) -> String {
  let mut out = String::new();
  let state = match report.state {
    OperationState::Completed => "completed",
    OperationState::Aborted => "aborted",
    OperationState::InProgress => "in progress",
  };
  let _ = writeln!(
    out,
    "{} files, {} failed, {state}",
    report.files.len(),
    report.failures.len()
  );
  if let Some(truncated) = report.truncated {
    let _ = writeln!(
      out,
      "only {} of {} files fetched",
      truncated.limit, truncated.total
    );
  }
  for failure in &report.failures {
    let _ = writeln!(out, "  {}: {}", failure.path, failure.error);
  }
  out
}
